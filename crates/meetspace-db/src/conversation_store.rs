use std::path::{Path, PathBuf};
use std::time::Duration;

use meetspace_common::{ChatTurn, Error, Result, UserId};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::migrations::MIGRATIONS;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable per-identity conversation log.
///
/// Each operation opens its own connection, so the store can be shared
/// across concurrent requests without holding a lock. Writes replace the
/// whole record: two concurrent writers for the same identity resolve as
/// last-write-wins.
pub struct ConversationStore {
    db_path: PathBuf,
}

impl ConversationStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening conversation store at {}", db_path.display());

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| Error::Database(format!("failed to set busy timeout: {e}")))?;
        Ok(conn)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let current: u32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| Error::Database(format!("failed to read schema version: {e}")))?;

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            debug!(
                "applying migration {} ({})",
                migration.version, migration.name
            );
            conn.execute_batch(migration.sql)
                .map_err(|e| Error::Database(format!("migration {} failed: {e}", migration.name)))?;
            conn.pragma_update(None, "user_version", migration.version)
                .map_err(|e| Error::Database(format!("failed to record migration: {e}")))?;
        }

        Ok(())
    }

    /// Load the conversation for `user_id`, oldest turn first. Missing
    /// records yield an empty conversation.
    pub fn load(&self, user_id: &UserId) -> Result<Vec<ChatTurn>> {
        let conn = self.connect()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT history FROM chat_history WHERE user_id = ?",
                params![user_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Database(format!("failed to load history: {e}")))?;

        match raw {
            Some(json) if !json.trim().is_empty() => Ok(serde_json::from_str(&json)?),
            _ => Ok(Vec::new()),
        }
    }

    /// Replace the whole conversation for `user_id`.
    pub fn save(&self, user_id: &UserId, history: &[ChatTurn]) -> Result<()> {
        let json = serde_json::to_string(history)?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO chat_history (user_id, history, updated_at)
             VALUES (?, ?, datetime('now'))
             ON CONFLICT(user_id) DO UPDATE SET
                history = excluded.history,
                updated_at = excluded.updated_at",
            params![user_id.as_str(), json],
        )
        .map_err(|e| Error::Database(format!("failed to save history: {e}")))?;

        debug!("saved {} turns for {user_id}", history.len());
        Ok(())
    }

    /// Delete the conversation for `user_id`. Deleting a missing record is a no-op.
    pub fn clear(&self, user_id: &UserId) -> Result<()> {
        let conn = self.connect()?;
        let removed = conn
            .execute(
                "DELETE FROM chat_history WHERE user_id = ?",
                params![user_id.as_str()],
            )
            .map_err(|e| Error::Database(format!("failed to clear history: {e}")))?;

        debug!("cleared history for {user_id} (rows={removed})");
        Ok(())
    }

    /// Number of stored conversations.
    pub fn count(&self) -> Result<usize> {
        let conn = self.connect()?;
        let count: i64 = conn
            .query_row("SELECT count(*) FROM chat_history", [], |row| row.get(0))
            .map_err(|e| Error::Database(format!("failed to count conversations: {e}")))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::ConversationStore;
    use meetspace_common::{ChatRole, ChatTurn, UserId};

    fn temp_store() -> (tempfile::TempDir, ConversationStore) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let store = ConversationStore::open(&dir.path().join("chat_history.db"))
            .expect("failed to open store");
        (dir, store)
    }

    #[test]
    fn load_missing_user_returns_empty() {
        let (_dir, store) = temp_store();
        let history = store.load(&UserId::new()).expect("load should succeed");
        assert!(history.is_empty());
    }

    #[test]
    fn save_then_load_preserves_order_and_unicode() {
        let (_dir, store) = temp_store();
        let user = UserId::new();
        let turns = vec![
            ChatTurn::user("Salama! Manao ahoana? 日本語 🚀"),
            ChatTurn::assistant("Tsara be – \"quoted\" \\ back\nslash"),
            ChatTurn::user("second"),
        ];

        store.save(&user, &turns).expect("save should succeed");
        assert_eq!(store.load(&user).expect("load should succeed"), turns);
    }

    #[test]
    fn unicode_is_stored_unescaped() {
        let (_dir, store) = temp_store();
        let user = UserId::new();
        store
            .save(&user, &[ChatTurn::user("é😀")])
            .expect("save should succeed");

        let conn = rusqlite::Connection::open(store.path()).unwrap();
        let raw: String = conn
            .query_row(
                "SELECT history FROM chat_history WHERE user_id = ?",
                [user.as_str()],
                |row| row.get(0),
            )
            .unwrap();
        assert!(raw.contains("é😀"));
        assert!(!raw.contains("\\u"));
    }

    #[test]
    fn save_replaces_whole_record() {
        let (_dir, store) = temp_store();
        let user = UserId::new();

        store
            .save(&user, &[ChatTurn::user("a"), ChatTurn::assistant("b")])
            .unwrap();
        store.save(&user, &[ChatTurn::user("only")]).unwrap();

        let history = store.load(&user).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[0].content, "only");
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn clear_is_idempotent_and_scoped() {
        let (_dir, store) = temp_store();
        let alice = UserId::new();
        let bob = UserId::new();
        store.save(&alice, &[ChatTurn::user("hi")]).unwrap();
        store.save(&bob, &[ChatTurn::user("yo")]).unwrap();

        store.clear(&alice).expect("first clear should succeed");
        store.clear(&alice).expect("second clear should succeed");
        store.clear(&UserId::new()).expect("clearing unknown user should succeed");

        assert!(store.load(&alice).unwrap().is_empty());
        assert_eq!(store.load(&bob).unwrap().len(), 1);
    }

    #[test]
    fn reopening_keeps_data_and_schema_version() {
        let (dir, store) = temp_store();
        let user = UserId::new();
        store.save(&user, &[ChatTurn::user("persist")]).unwrap();
        drop(store);

        let reopened = ConversationStore::open(&dir.path().join("chat_history.db")).unwrap();
        assert_eq!(reopened.load(&user).unwrap()[0].content, "persist");

        let conn = rusqlite::Connection::open(reopened.path()).unwrap();
        let version: u32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn open_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("chat.db");
        let store = ConversationStore::open(&path).expect("open should create parents");
        assert!(path.exists());
        assert_eq!(store.count().unwrap(), 0);
    }
}
