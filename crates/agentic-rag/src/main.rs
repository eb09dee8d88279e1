use agentic_rag::{config::Config, telemetry, Orchestrator, TurnRequest};
use std::io::{self, BufRead, Write};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let config = Config::from_env()?;
    let orchestrator = Orchestrator::from_config(&config);
    let session_id = std::env::var("SESSION_ID").unwrap_or_else(|_| "local".into());

    println!("Document assistant ready (session: {}). Ctrl-D to exit.", session_id);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }

        let request = TurnRequest::new(query)
            .with_session(&session_id)
            .with_k(config.default_k)
            .with_max_context_chars(config.default_max_context_chars);

        match orchestrator.process_turn(&request).await {
            Ok(result) => {
                println!("\n{}\n", result.answer);
                for source in &result.sources {
                    println!("  [{}] {} (score {:.2})", source.id, source.document_name, source.score);
                }
                if !result.memory_enabled {
                    println!("  (session memory unavailable, turn not persisted)");
                }
            }
            Err(e) => eprintln!("turn failed: {}", e),
        }
    }

    Ok(())
}
