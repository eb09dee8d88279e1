//! Checkpoint persistence for conversation state.
//!
//! The store may legitimately be absent (not configured, file unwritable,
//! SQLite unavailable). `Checkpointer` models that as an explicit
//! capability so every call site pattern-matches on availability instead
//! of null-checking, and so degraded-mode behavior lives in one place:
//! a turn without a working store still completes, it just runs stateless
//! and reports `memory_enabled = false`.
pub mod schema;
pub mod store;

pub use schema::{CheckpointRecord, SessionEntry, SCHEMA_SQL};
pub use store::CheckpointStore;

use crate::memory::ConversationState;
use std::path::Path;
use tracing::{info, warn};

pub enum Checkpointer {
    Available(CheckpointStore),
    Unavailable,
}

impl Checkpointer {
    /// Opens the store at `db_path`, degrading to `Unavailable` (with a
    /// warning, never an error) when the path is unset or the open fails.
    pub fn open(db_path: Option<&Path>) -> Self {
        match db_path {
            None => {
                info!("No checkpoint database configured, session memory disabled");
                Checkpointer::Unavailable
            }
            Some(path) => match CheckpointStore::open(path) {
                Ok(store) => Checkpointer::Available(store),
                Err(e) => {
                    warn!("Checkpoint store unavailable, running without session memory: {}", e);
                    Checkpointer::Unavailable
                }
            },
        }
    }

    pub fn from_store(store: CheckpointStore) -> Self {
        Checkpointer::Available(store)
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Checkpointer::Available(_))
    }

    /// Loads prior state for a session. Absent sessions and load failures
    /// both come back as `None`; a failed load only costs continuity.
    pub fn load(&self, session_id: &str) -> Option<ConversationState> {
        match self {
            Checkpointer::Unavailable => None,
            Checkpointer::Available(store) => match store.load(session_id) {
                Ok(state) => state,
                Err(e) => {
                    warn!("Checkpoint load failed for session {}: {}", session_id, e);
                    None
                }
            },
        }
    }

    /// Persists the post-turn state. Returns whether the commit actually
    /// happened; a failed save degrades the turn to stateless.
    pub fn save(&self, session_id: &str, state: &ConversationState) -> bool {
        match self {
            Checkpointer::Unavailable => false,
            Checkpointer::Available(store) => match store.save(session_id, state) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Checkpoint save failed for session {}: {}", session_id, e);
                    false
                }
            },
        }
    }
}
