//! Catalog schema migrations.

use rusqlite::Connection;
use tracing::info;

use tariffbot_core::error::TariffError;

/// Run all pending migrations. Safe to call on every open.
pub fn run_migrations(conn: &Connection) -> Result<(), TariffError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| TariffError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| TariffError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: hts_records");
    }

    Ok(())
}

/// Version 1: the flat HTS record table.
fn apply_v1(conn: &Connection) -> Result<(), TariffError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS hts_records (
            hts_code         TEXT PRIMARY KEY NOT NULL,
            digits           TEXT NOT NULL,
            indent           INTEGER NOT NULL DEFAULT 0 CHECK (indent >= 0),
            description      TEXT NOT NULL DEFAULT '',
            unit_of_quantity TEXT NOT NULL DEFAULT '',
            general_rate     TEXT NOT NULL DEFAULT '',
            special_rate     TEXT NOT NULL DEFAULT '',
            other_rate       TEXT NOT NULL DEFAULT '',
            updated_at       INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        -- Prefix lookups run LIKE 'dddd%' against the digit form.
        CREATE INDEX IF NOT EXISTS idx_hts_records_digits
            ON hts_records (digits);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'hts_records');
        ",
    )
    .map_err(|e| TariffError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
