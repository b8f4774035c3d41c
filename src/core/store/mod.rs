mod algorithms;
mod analyses;
mod automation_log;
mod problems;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::lifecycle::LifecycleComponent;
use crate::platform::{NativePlatform, Platform};

/// Handle to the automation database. Cheap to clone; every clone shares one connection.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

impl Store {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent).await?;
            NativePlatform::restrict_dir_permissions(parent);
        }

        let db = Connection::open(path)?;
        NativePlatform::restrict_file_permissions(path);
        let _mode: String = db.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;

        let store = Self::from_connection(db)?;
        info!("Opened automation store at {}", path.display());
        Ok(store)
    }

    fn from_connection(db: Connection) -> Result<Self> {
        db.busy_timeout(Duration::from_secs(5))?;
        db.execute_batch("PRAGMA foreign_keys = ON")?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS algorithms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                inspiration TEXT NOT NULL DEFAULT '',
                domain TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL,
                principle TEXT NOT NULL DEFAULT '',
                steps TEXT NOT NULL DEFAULT '[]',
                applications TEXT NOT NULL DEFAULT '[]',
                pseudo_code TEXT NOT NULL DEFAULT '',
                tags TEXT NOT NULL DEFAULT '[]',
                type TEXT NOT NULL CHECK (type IN ('generated', 'hybrid')),
                parent_ids TEXT,
                likes INTEGER NOT NULL DEFAULT 0,
                views INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS algorithm_ratings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                algorithm_id INTEGER NOT NULL REFERENCES algorithms(id) ON DELETE CASCADE,
                score REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS problems (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                domain TEXT NOT NULL,
                priority TEXT NOT NULL CHECK (priority IN ('low', 'medium', 'high', 'critical')),
                solved INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS algorithm_analyses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                algorithm_id INTEGER NOT NULL REFERENCES algorithms(id) ON DELETE CASCADE,
                analysis_type TEXT NOT NULL,
                result TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS automation_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_type TEXT NOT NULL,
                status TEXT NOT NULL,
                details TEXT NOT NULL,
                algorithm_id INTEGER,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_ratings_algorithm ON algorithm_ratings(algorithm_id)",
            [],
        )?;
        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_analyses_algorithm_created ON algorithm_analyses(algorithm_id, created_at)",
            [],
        )?;
        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_problems_open_priority ON problems(solved, priority, created_at)",
            [],
        )?;
        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_automation_logs_task_created ON automation_logs(task_type, created_at)",
            [],
        )?;

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Self {
        let db = Connection::open_in_memory().expect("open in-memory db");
        Self::from_connection(db).expect("create schema")
    }

    #[cfg(test)]
    pub fn get_db(&self) -> Arc<Mutex<Connection>> {
        self.db.clone()
    }
}

#[async_trait]
impl LifecycleComponent for Store {
    async fn on_init(&mut self) -> Result<()> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row("SELECT COUNT(*) FROM algorithms", [], |row| row.get(0))?;
        info!("Automation store ready ({} algorithms)", count);
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        let db = self.db.lock().await;
        db.execute_batch("PRAGMA optimize")?;
        info!("Automation store flushed");
        Ok(())
    }
}

/// Decode a JSON text column, rejecting shapes that do not match `T`.
pub(crate) fn json_column<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Decode an enum stored by its wire name.
pub(crate) fn enum_column<T: std::str::FromStr<Err = String>>(
    idx: usize,
    raw: &str,
) -> rusqlite::Result<T> {
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}
