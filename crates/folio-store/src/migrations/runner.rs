//! Migration runner

use rusqlite::{Connection, OptionalExtension};

use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};
use crate::migrations::checksums::compute_checksum;
use crate::migrations::embedded::{get_migrations, Migration};

/// One row of `schema_version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub migration_id: String,
    pub applied_at: i64,
    pub checksum: String,
}

/// Apply all pending migrations, verifying the ones already applied
///
/// # Errors
///
/// Persistence error when a migration fails or an applied migration's
/// checksum no longer matches its embedded SQL.
pub fn apply_migrations(conn: &Connection) -> Result<()> {
    create_schema_version_table(conn)?;
    for migration in get_migrations() {
        apply_migration(conn, &migration)?;
    }
    Ok(())
}

/// Applied migrations in application order
///
/// # Errors
///
/// Persistence error when `schema_version` cannot be read.
pub fn applied_migrations(conn: &Connection) -> Result<Vec<AppliedMigration>> {
    let mut stmt = conn
        .prepare("SELECT migration_id, applied_at, checksum FROM schema_version ORDER BY id")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(AppliedMigration {
                migration_id: row.get(0)?,
                applied_at: row.get(1)?,
                checksum: row.get(2)?,
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

fn create_schema_version_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY,
            migration_id TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL,
            checksum TEXT NOT NULL
        )",
    )
    .map_err(from_rusqlite)
}

fn apply_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    let checksum = compute_checksum(migration.sql);

    let recorded: Option<String> = conn
        .query_row(
            "SELECT checksum FROM schema_version WHERE migration_id = ?",
            [migration.id],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?;

    if let Some(recorded) = recorded {
        if recorded != checksum {
            return Err(checksum_mismatch(migration.id, &recorded, &checksum));
        }
        return Ok(());
    }

    // BEGIN IMMEDIATE serializes concurrent connects on a shared file
    conn.execute_batch("BEGIN IMMEDIATE").map_err(from_rusqlite)?;
    let result = conn
        .execute_batch(migration.sql)
        .map_err(|e| migration_error(migration.id, &e.to_string()))
        .and_then(|()| {
            conn.execute(
                "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?, ?, ?)",
                rusqlite::params![migration.id, chrono::Utc::now().timestamp_millis(), checksum],
            )
            .map_err(from_rusqlite)
        });

    match result {
        Ok(_) => conn.execute_batch("COMMIT").map_err(from_rusqlite),
        Err(err) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(err)
        }
    }
}
