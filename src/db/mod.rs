//! SQLite-backed persistence for the catalog and gallery tables.

mod schema;
pub mod catalog;
pub mod gallery;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;

pub use gallery::GalleryRecord;
pub use schema::{INDEXES, MIGRATIONS, TABLES};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Create tables, run additive column migrations, then create indexes.
    /// Idempotent. Migrations come before indexes so an index on a column
    /// an older table lacked does not fail startup.
    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(TABLES)?;
        self.run_migrations()?;
        self.conn.execute_batch(INDEXES)?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        for migration in MIGRATIONS {
            // Duplicate-column errors mean the column already exists.
            let _ = self.conn.execute(migration, []);
        }
        Ok(())
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Strip embedded NUL characters before persistence; some storage backends
/// reject them inside text values.
pub(crate) fn clean_text(value: &str) -> String {
    if value.contains('\0') {
        value.replace('\0', "")
    } else {
        value.to_string()
    }
}
