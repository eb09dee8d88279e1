use anyhow::Result;
use std::env;
use tracing::{info, warn};

use crate::turn::{DEFAULT_K, DEFAULT_MAX_CONTEXT_CHARS};

/// Central configuration, read from environment variables (and optionally
/// a `.env` file). Every field has a working default so a bare process can
/// start against local services.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenAI-compatible generation backend base URL.
    pub backend_url: String,
    pub llm_model: String,
    pub embed_model: String,
    /// Vector index service base URL.
    pub retriever_url: String,
    /// Checkpoint database path. `None` disables durable session memory.
    pub checkpoint_db: Option<String>,
    pub generate_timeout_seconds: u64,
    pub retrieve_timeout_seconds: u64,
    pub default_k: usize,
    pub default_max_context_chars: usize,
    /// Hits scoring below this are dropped before citation tagging.
    pub min_relevance_score: f32,
    pub temperature: f32,
    pub max_answer_tokens: u32,
    /// How many prior messages are shown to the router and answerer.
    pub history_window: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        let backend_url = env::var("LLM_BACKEND_URL").unwrap_or_else(|_| "http://127.0.0.1:8081".into());
        let retriever_url = env::var("RETRIEVER_URL").unwrap_or_else(|_| "http://127.0.0.1:8090".into());

        // Empty CHECKPOINT_DB disables durable session memory entirely.
        let checkpoint_db = match env::var("CHECKPOINT_DB") {
            Ok(path) if path.trim().is_empty() => None,
            Ok(path) => Some(path),
            Err(_) => Some("./data/checkpoints.db".into()),
        };

        let config = Self {
            backend_url,
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "local-llm".into()),
            embed_model: env::var("EMBED_MODEL").unwrap_or_else(|_| "local-embed".into()),
            retriever_url,
            checkpoint_db,
            generate_timeout_seconds: env::var("GENERATE_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "120".into())
                .parse()?,
            retrieve_timeout_seconds: env::var("RETRIEVE_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "30".into())
                .parse()?,
            default_k: env::var("DEFAULT_K")
                .unwrap_or_else(|_| DEFAULT_K.to_string())
                .parse()?,
            default_max_context_chars: env::var("MAX_CONTEXT_CHARS")
                .unwrap_or_else(|_| DEFAULT_MAX_CONTEXT_CHARS.to_string())
                .parse()?,
            min_relevance_score: env::var("MIN_RELEVANCE_SCORE")
                .unwrap_or_else(|_| "0.3".into())
                .parse()?,
            temperature: env::var("TEMPERATURE")
                .unwrap_or_else(|_| "0.0".into())
                .parse()?,
            max_answer_tokens: env::var("MAX_ANSWER_TOKENS")
                .unwrap_or_else(|_| "1024".into())
                .parse()?,
            history_window: env::var("HISTORY_WINDOW")
                .unwrap_or_else(|_| "12".into())
                .parse()?,
        };

        info!(
            "Configuration: backend={}, retriever={}, checkpoints={}, k={}, context_budget={}",
            config.backend_url,
            config.retriever_url,
            config.checkpoint_db.as_deref().unwrap_or("(disabled)"),
            config.default_k,
            config.default_max_context_chars,
        );

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8081".into(),
            llm_model: "local-llm".into(),
            embed_model: "local-embed".into(),
            retriever_url: "http://127.0.0.1:8090".into(),
            checkpoint_db: Some("./data/checkpoints.db".into()),
            generate_timeout_seconds: 120,
            retrieve_timeout_seconds: 30,
            default_k: DEFAULT_K,
            default_max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            min_relevance_score: 0.3,
            temperature: 0.0,
            max_answer_tokens: 1024,
            history_window: 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = Config::default();
        assert_eq!(config.default_k, 6);
        assert_eq!(config.default_max_context_chars, 12_000);
        assert!(config.checkpoint_db.is_some());
        assert_eq!(config.temperature, 0.0);
    }
}
