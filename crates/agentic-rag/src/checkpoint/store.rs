use crate::checkpoint::schema::{CheckpointRecord, SessionEntry, SCHEMA_SQL};
use crate::memory::ConversationState;
use chrono::{DateTime, NaiveDateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Durable key-value store for conversation state, keyed by session id.
pub struct CheckpointStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl CheckpointStore {
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        info!("Opening checkpoint database at: {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(db_path).with_flags(
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        );
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;

        {
            let conn = pool.get()?;
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )?;
        }

        let store = Self { pool: Arc::new(pool) };
        store.init_schema()?;
        info!("Checkpoint database initialized successfully");
        Ok(store)
    }

    /// In-process store for tests. Single connection so every caller sees
    /// the same in-memory database.
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        let store = Self { pool: Arc::new(pool) };
        store.init_schema()?;
        Ok(store)
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    /// Idempotent schema creation.
    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    pub fn exists_schema(&self) -> bool {
        let Ok(conn) = self.get_conn() else {
            return false;
        };
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'checkpoints'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count > 0)
        .unwrap_or(false)
    }

    pub fn load(&self, session_id: &str) -> anyhow::Result<Option<ConversationState>> {
        Ok(self.load_record(session_id)?.map(|record| record.state))
    }

    pub fn load_record(&self, session_id: &str) -> anyhow::Result<Option<CheckpointRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, state, updated_at FROM checkpoints WHERE session_id = ?1",
        )?;
        let mut rows = stmt.query([session_id])?;

        if let Some(row) = rows.next()? {
            let state_json: String = row.get(1)?;
            let state: ConversationState = serde_json::from_str(&state_json)
                .map_err(|e| anyhow::anyhow!("Checkpoint state JSON error: {}", e))?;
            let updated_at = Self::parse_datetime_safe(&row.get::<_, String>(2)?)
                .unwrap_or_else(|| {
                    warn!("Failed to parse checkpoint updated_at");
                    Utc::now()
                });
            Ok(Some(CheckpointRecord {
                session_id: row.get(0)?,
                state,
                updated_at,
            }))
        } else {
            Ok(None)
        }
    }

    /// Upserts the full state for a session. One statement, so a commit is
    /// never interleaved with a concurrent commit for the same session id.
    pub fn save(&self, session_id: &str, state: &ConversationState) -> anyhow::Result<()> {
        let state_json = serde_json::to_string(state)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO checkpoints (session_id, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id) DO UPDATE SET state = ?2, updated_at = ?3",
            params![session_id, state_json, now],
        )?;

        debug!(
            "Checkpointed session {} ({} messages)",
            session_id,
            state.messages.len()
        );
        Ok(())
    }

    /// Explicit external deletion. Never called by the orchestrator.
    pub fn delete_session(&self, session_id: &str) -> anyhow::Result<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM checkpoints WHERE session_id = ?1", [session_id])?;
        info!("Deleted checkpoint for session {}", session_id);
        Ok(deleted)
    }

    pub fn list_sessions(&self) -> anyhow::Result<Vec<SessionEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, updated_at FROM checkpoints ORDER BY updated_at DESC",
        )?;
        let mut rows = stmt.query([])?;
        let mut sessions = Vec::new();

        while let Some(row) = rows.next()? {
            let updated_at = Self::parse_datetime_safe(&row.get::<_, String>(1)?)
                .unwrap_or_else(Utc::now);
            sessions.push(SessionEntry {
                session_id: row.get(0)?,
                updated_at,
            });
        }

        Ok(sessions)
    }

    fn parse_datetime_safe(datetime_str: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(datetime_str) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S") {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::Route;

    fn sample_state() -> ConversationState {
        let mut state = ConversationState::default();
        state.push_turn(0, "what is the policy?".into(), "It is [S1].".into());
        state.last_route = Some(Route::Retrieve);
        state.last_answer = Some("It is [S1].".into());
        state
    }

    #[test]
    fn schema_init_is_idempotent() {
        let store = CheckpointStore::new_in_memory().unwrap();
        assert!(store.exists_schema());
        store.init_schema().unwrap();
        store.init_schema().unwrap();
        assert!(store.exists_schema());
    }

    #[test]
    fn load_absent_session_returns_none() {
        let store = CheckpointStore::new_in_memory().unwrap();
        assert!(store.load("sess-missing").unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips_state() {
        let store = CheckpointStore::new_in_memory().unwrap();
        let state = sample_state();
        store.save("sess-1", &state).unwrap();

        let loaded = store.load("sess-1").unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.last_route, Some(Route::Retrieve));
        assert_eq!(loaded.last_answer.as_deref(), Some("It is [S1]."));
    }

    #[test]
    fn save_upserts_instead_of_duplicating() {
        let store = CheckpointStore::new_in_memory().unwrap();
        let mut state = sample_state();
        store.save("sess-1", &state).unwrap();

        state.push_turn(1, "more?".into(), "Sure.".into());
        store.save("sess-1", &state).unwrap();

        let loaded = store.load("sess-1").unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 4);
        assert_eq!(store.list_sessions().unwrap().len(), 1);
    }

    #[test]
    fn delete_session_removes_row() {
        let store = CheckpointStore::new_in_memory().unwrap();
        store.save("sess-1", &sample_state()).unwrap();
        assert_eq!(store.delete_session("sess-1").unwrap(), 1);
        assert!(store.load("sess-1").unwrap().is_none());
    }

    #[test]
    fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("checkpoints.db");

        {
            let store = CheckpointStore::open(&db_path).unwrap();
            store.save("sess-persist", &sample_state()).unwrap();
        }

        let reopened = CheckpointStore::open(&db_path).unwrap();
        let loaded = reopened.load("sess-persist").unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 2);
    }

    #[test]
    fn list_sessions_orders_most_recent_first() {
        let store = CheckpointStore::new_in_memory().unwrap();
        store.save("sess-old", &sample_state()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.save("sess-new", &sample_state()).unwrap();

        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, "sess-new");
    }
}
