//! Checkpoint table definitions.
use chrono::{DateTime, Utc};

use crate::memory::ConversationState;

/// One row per session. State is serialized JSON; rows are upserted on
/// every turn and only removed by an explicit delete.
pub const SCHEMA_SQL: &str = "
-- Checkpoints table
CREATE TABLE IF NOT EXISTS checkpoints (
    session_id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_checkpoints_updated ON checkpoints (updated_at);
";

#[derive(Debug, Clone)]
pub struct CheckpointRecord {
    pub session_id: String,
    pub state: ConversationState,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub session_id: String,
    pub updated_at: DateTime<Utc>,
}
