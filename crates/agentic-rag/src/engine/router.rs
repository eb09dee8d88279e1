//! Route classification: does this query need document retrieval?
use crate::llm::{GenerationBackend, PromptMessage};
use crate::memory::{Message, Role};
use crate::turn::Route;
use std::sync::Arc;
use tracing::{debug, warn};

const ROUTER_MAX_TOKENS: u32 = 8;

pub struct Router {
    backend: Arc<dyn GenerationBackend>,
}

impl Router {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Classifies a query with a single constrained generation call.
    ///
    /// Fallback policy: any classification failure (unrecognized token,
    /// backend error, timeout) defaults to `Retrieve`. Retrieval is the
    /// safe direction; it costs latency, while a false `Direct` risks an
    /// unsupported answer. The fallback is logged, never surfaced.
    pub async fn route(&self, query: &str, recent_messages: &[Message]) -> Route {
        let messages = build_classification_prompt(query, recent_messages);

        match self.backend.generate(&messages, 0.0, ROUTER_MAX_TOKENS).await {
            Ok(raw) => match parse_route(&raw) {
                Some(route) => {
                    debug!("Routed query as {}", route);
                    route
                }
                None => {
                    warn!(
                        "Router returned unrecognized token {:?}, defaulting to retrieve",
                        raw.trim()
                    );
                    Route::Retrieve
                }
            },
            Err(e) => {
                warn!("Router classification call failed, defaulting to retrieve: {}", e);
                Route::Retrieve
            }
        }
    }
}

fn build_classification_prompt(query: &str, recent_messages: &[Message]) -> Vec<PromptMessage> {
    let mut system = String::from(
        "You are the router for a document question-answering assistant.\n\
         Reply with exactly one token: direct or retrieve.\n\
         Use retrieve when the query needs facts from the uploaded documents.\n\
         Use direct for greetings, questions about the assistant itself, or \
         questions about the conversation so far.",
    );

    // History only disambiguates meta-questions ("what did I just ask?");
    // the transcript goes into the system message, not the user turn.
    if !recent_messages.is_empty() {
        system.push_str("\n\nRecent conversation:");
        for message in recent_messages {
            let speaker = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            system.push_str(&format!("\n{}: {}", speaker, message.content));
        }
    }

    vec![PromptMessage::system(system), PromptMessage::user(query)]
}

/// Exact enumeration of accepted tokens. The model output is untrusted;
/// anything that is not precisely one of the two labels is a
/// classification failure, never a substring match.
fn parse_route(raw: &str) -> Option<Route> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "direct" => Some(Route::Direct),
        "retrieve" => Some(Route::Retrieve),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedBackend {
        reply: anyhow::Result<String>,
    }

    impl FixedBackend {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self { reply: Ok(reply.to_string()) })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { reply: Err(anyhow::anyhow!("backend down")) })
        }
    }

    #[async_trait]
    impl GenerationBackend for FixedBackend {
        async fn generate(
            &self,
            _messages: &[PromptMessage],
            _temperature: f32,
            _max_tokens: u32,
        ) -> anyhow::Result<String> {
            match &self.reply {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }

        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![0.0])
        }
    }

    #[test]
    fn parse_accepts_only_the_two_tokens() {
        assert_eq!(parse_route("direct"), Some(Route::Direct));
        assert_eq!(parse_route("  Retrieve \n"), Some(Route::Retrieve));
        assert_eq!(parse_route("I would retrieve"), None);
        assert_eq!(parse_route("direct."), None);
        assert_eq!(parse_route(""), None);
    }

    #[tokio::test]
    async fn routes_clean_tokens() {
        let router = Router::new(FixedBackend::replying("direct"));
        assert_eq!(router.route("Hi there", &[]).await, Route::Direct);

        let router = Router::new(FixedBackend::replying("retrieve"));
        assert_eq!(router.route("What is the refund policy?", &[]).await, Route::Retrieve);
    }

    #[tokio::test]
    async fn malformed_output_defaults_to_retrieve() {
        let router = Router::new(FixedBackend::replying("hmm, probably retrieve?"));
        assert_eq!(router.route("anything", &[]).await, Route::Retrieve);
    }

    #[tokio::test]
    async fn backend_failure_defaults_to_retrieve() {
        let router = Router::new(FixedBackend::failing());
        assert_eq!(router.route("anything", &[]).await, Route::Retrieve);
    }

    #[test]
    fn prompt_includes_history_for_meta_questions() {
        let history = vec![
            Message { role: Role::User, content: "what about pricing?".into(), turn_index: 0 },
            Message { role: Role::Assistant, content: "Pricing is tiered [S1].".into(), turn_index: 0 },
        ];
        let messages = build_classification_prompt("what did I just ask?", &history);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("user: what about pricing?"));
        assert!(messages[0].content.contains("assistant: Pricing is tiered [S1]."));
        assert_eq!(messages[1].content, "what did I just ask?");
    }
}
