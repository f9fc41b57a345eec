pub mod registry;
pub mod store;

use crate::config::TradeboardPaths;
use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use store::{StoreError, TableStore};

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;

    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        board_type TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        author TEXT NOT NULL,
        item_name TEXT,
        price TEXT,
        views INTEGER DEFAULT 0,
        is_admin INTEGER DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        deleted_at INTEGER
    );

    CREATE TABLE IF NOT EXISTS members (
        id TEXT PRIMARY KEY,
        username TEXT UNIQUE NOT NULL,
        password_hash TEXT NOT NULL,
        email TEXT,
        status TEXT DEFAULT 'active',
        is_admin INTEGER DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        deleted_at INTEGER
    );

    CREATE TABLE IF NOT EXISTS trade_requests (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        post_title TEXT NOT NULL,
        name TEXT NOT NULL,
        id_number TEXT NOT NULL,
        phone TEXT NOT NULL,
        game_id TEXT NOT NULL,
        sell_amount INTEGER DEFAULT 0,
        buy_amount INTEGER DEFAULT 0,
        status TEXT DEFAULT 'pending',
        custom_date TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        deleted_at INTEGER
    );

    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        author TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        deleted_at INTEGER
    );

    CREATE INDEX IF NOT EXISTS idx_posts_board_type ON posts(board_type);
    CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at);
    CREATE INDEX IF NOT EXISTS idx_trade_requests_status ON trade_requests(status);
    CREATE INDEX IF NOT EXISTS idx_trade_requests_created_at ON trade_requests(created_at);
    CREATE INDEX IF NOT EXISTS idx_trade_requests_custom_date ON trade_requests(custom_date);
    CREATE INDEX IF NOT EXISTS idx_members_username ON members(username);
    CREATE INDEX IF NOT EXISTS idx_members_status ON members(status);
    CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id);
"#;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn connect(paths: &TradeboardPaths) -> Result<Self> {
        let conn = Connection::open(&paths.db_path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Idempotent DDL for the four entity tables and their indexes. Runs once
    /// during bootstrap, before the HTTP listener binds.
    pub fn ensure_migrations(&self) -> Result<()> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        guard.execute_batch(MIGRATIONS)?;
        Ok(())
    }

    pub fn with_store<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(TableStore<'_>) -> Result<T, StoreError>,
    {
        let guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(TableStore::new(&guard))
    }
}
