use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Thin wrapper around a single SQLite connection guarded by a mutex.
/// Mirrors the teacher's `Db` — one process-wide connection in WAL mode —
/// which is sufficient for the repository's ACID requirements (§4.3) since
/// SQLite serializes writers itself; a Postgres-backed repository would
/// swap this for a connection pool behind the same `Repository` trait
/// (see `repository.rs`) without touching call sites.
pub struct Db {
    pub conn: Mutex<Connection>,
}

impl Db {
    pub fn new(path: &str) -> Self {
        let conn = Connection::open(path).expect("failed to open database");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .expect("failed to set pragmas");
        let db = Db { conn: Mutex::new(conn) };
        db.migrate();
        db
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) {
        let conn = self.conn();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS shares (
                id TEXT PRIMARY KEY,
                owner_user_id TEXT REFERENCES users(id),
                storage_key TEXT NOT NULL UNIQUE,
                original_name TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                password_hash TEXT,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                download_count INTEGER NOT NULL DEFAULT 0,
                state TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_shares_expiry_state ON shares(expires_at, state);
            CREATE INDEX IF NOT EXISTS idx_shares_owner_created ON shares(owner_user_id, created_at DESC);

            CREATE TABLE IF NOT EXISTS download_events (
                id TEXT PRIMARY KEY,
                share_id TEXT NOT NULL REFERENCES shares(id) ON DELETE CASCADE,
                at TEXT NOT NULL,
                requester_hash TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_download_events_share ON download_events(share_id);",
        )
        .expect("failed to run migrations");
    }
}
