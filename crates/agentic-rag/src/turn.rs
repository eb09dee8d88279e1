//! Request/response types for a single orchestrated turn.
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_K: usize = 6;
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 12_000;

/// Routing decision for a turn. Decided once, never revised mid-turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Direct,
    Retrieve,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Direct => write!(f, "direct"),
            Route::Retrieve => write!(f, "retrieve"),
        }
    }
}

/// A citable passage produced by the retriever adapter.
///
/// `id` is the stable citation tag ("S1", "S2", ...) referenced by the
/// answer text. Consumed read-only by the answerer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub document_id: String,
    pub passage: String,
    pub score: f32,
    pub document_name: String,
}

/// Immutable input bundle for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub doc_ids: Option<Vec<String>>,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

fn default_k() -> usize {
    DEFAULT_K
}

fn default_max_context_chars() -> usize {
    DEFAULT_MAX_CONTEXT_CHARS
}

impl TurnRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            session_id: None,
            doc_ids: None,
            k: DEFAULT_K,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_doc_ids(mut self, doc_ids: Vec<String>) -> Self {
        self.doc_ids = Some(doc_ids);
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_max_context_chars(mut self, max_context_chars: usize) -> Self {
        self.max_context_chars = max_context_chars;
        self
    }
}

/// Outcome of a completed turn.
///
/// `memory_enabled` is true only when a session id was supplied and the
/// checkpoint store persisted this turn; `session_id` is echoed back only
/// in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    pub answer: String,
    pub route: Route,
    pub sources: Vec<Source>,
    pub memory_enabled: bool,
    pub session_id: Option<String>,
}
