/// A versioned schema change applied when a store is opened.
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

pub const CONVERSATION_SCHEMA_V1: Migration = Migration {
    version: 1,
    name: "chat_history",
    sql: "CREATE TABLE IF NOT EXISTS chat_history (
            user_id TEXT PRIMARY KEY,
            history TEXT NOT NULL DEFAULT '[]',
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
};

pub const MIGRATIONS: &[Migration] = &[CONVERSATION_SCHEMA_V1];
