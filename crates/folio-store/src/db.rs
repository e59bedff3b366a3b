//! Connection opening
//!
//! Pooled connections come from the manager built here and are configured
//! by `configure` before first use

use std::time::Duration;

use r2d2::ManageConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OpenFlags};

use crate::config::DatabaseTarget;
use crate::errors::{from_rusqlite, unavailable, Result};

/// Unicode-aware lowercase used by case-insensitive filters
///
/// SQLite's built-in `LOWER` folds ASCII only.
pub const FOLD_FUNCTION: &str = "folio_lower";

/// Connection manager for `target`
pub fn manager(target: &DatabaseTarget) -> SqliteConnectionManager {
    match target {
        DatabaseTarget::Memory => SqliteConnectionManager::memory(),
        DatabaseTarget::File(path) => SqliteConnectionManager::file(path).with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI,
        ),
    }
}

/// Open and configure a standalone connection to `target`
///
/// # Errors
///
/// StoreUnavailable when the database cannot be opened.
pub fn open(target: &DatabaseTarget, busy_timeout: Duration) -> Result<Connection> {
    let conn = manager(target)
        .connect()
        .map_err(|e| unavailable(format!("cannot open {}: {}", target, e)).with_op("connect"))?;

    configure(&conn, target, busy_timeout).map_err(from_rusqlite)?;
    Ok(conn)
}

/// Apply per-connection settings
///
/// Foreign keys are enforced, LIKE is case-sensitive and `folio_lower` is
/// registered on every connection; file databases additionally run in WAL
/// mode.
///
/// # Errors
///
/// The underlying SQLite error when a pragma or registration fails.
pub fn configure(
    conn: &Connection,
    target: &DatabaseTarget,
    busy_timeout: Duration,
) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA case_sensitive_like = ON;")?;
    conn.create_scalar_function(
        FOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text = ctx.get::<Option<String>>(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )?;

    if !target.is_memory() {
        // journal_mode returns a row, which execute_batch discards
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
    }

    Ok(())
}
