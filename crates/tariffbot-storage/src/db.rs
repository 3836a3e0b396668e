//! SQLite connection handling for the tariff catalog.
//!
//! One rusqlite Connection behind a Mutex. The catalog is written only by
//! imports; at query time every access is a short read.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use tariffbot_core::error::TariffError;

use crate::migrations;

/// Shared handle to the catalog database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the catalog at `path` and apply pending migrations.
    pub fn new(path: &Path) -> Result<Self, TariffError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|e| {
            TariffError::Storage(format!("Failed to open catalog {}: {}", path.display(), e))
        })?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| TariffError::Storage(format!("Failed to set pragmas: {}", e)))?;

        let db = Self::migrated(conn)?;
        info!(path = %path.display(), "Catalog database ready");
        Ok(db)
    }

    /// An empty catalog that lives only as long as the process.
    pub fn in_memory() -> Result<Self, TariffError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TariffError::Storage(format!("Failed to open in-memory catalog: {}", e)))?;
        Self::migrated(conn)
    }

    fn migrated(conn: Connection) -> Result<Self, TariffError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Run `f` with the connection locked for its whole duration.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, TariffError>
    where
        F: FnOnce(&Connection) -> Result<T, TariffError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| TariffError::Storage(format!("Catalog lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
