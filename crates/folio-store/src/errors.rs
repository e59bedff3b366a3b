//! Error helpers for folio-store
//!
//! Maps `rusqlite` failures and store conditions onto the `ExError` facility

use folio_core::errors::{ExError, ExErrorKind};
use folio_core::model::schema::entities;
use rusqlite::ffi;
use rusqlite::ErrorCode;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// An applied migration whose SQL has changed since it ran
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

pub fn config_error(message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Configuration)
        .with_op("configure")
        .with_message(message)
}

pub fn unavailable(message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::StoreUnavailable).with_message(message)
}

pub fn timeout(message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Timeout).with_message(message)
}

pub fn internal(message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Internal).with_message(message)
}

/// Classify a `rusqlite::Error`
///
/// Constraint failures become Conflict (unique, primary key, foreign key) or
/// Validation (check, not-null). Busy, locked and unopenable databases
/// become StoreUnavailable. Everything else is Persistence.
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    let rusqlite::Error::SqliteFailure(failure, detail) = &err else {
        return ExError::new(ExErrorKind::Persistence)
            .with_op("sqlite")
            .with_message(err.to_string());
    };
    let message = detail.clone().unwrap_or_else(|| failure.to_string());

    match failure.extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
            ExError::new(ExErrorKind::Conflict)
                .with_fields(constraint_fields(&message))
                .with_message(message)
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
            ExError::new(ExErrorKind::Conflict).with_message(message)
        }
        ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => {
            ExError::new(ExErrorKind::Validation)
                .with_fields(constraint_fields(&message))
                .with_message(message)
        }
        _ => match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen => {
                unavailable(message)
            }
            _ => ExError::new(ExErrorKind::Persistence)
                .with_op("sqlite")
                .with_message(message),
        },
    }
}

/// API field names named by a constraint message
///
/// SQLite reports e.g. `UNIQUE constraint failed: users.email`; the
/// `table.column` pairs are mapped back through the entity schemas.
fn constraint_fields(message: &str) -> Vec<String> {
    let Some((_, columns)) = message.split_once("failed: ") else {
        return Vec::new();
    };
    columns
        .split(',')
        .filter_map(|qualified| {
            let (table, column) = qualified.trim().split_once('.')?;
            let schema = entities().iter().find(|s| s.table == table)?;
            let field = schema.fields.iter().find(|f| f.column == column)?;
            Some(field.name.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_fields_map_columns_to_api_names() {
        assert_eq!(
            constraint_fields("UNIQUE constraint failed: users.email"),
            vec!["email".to_string()]
        );
        assert_eq!(
            constraint_fields("NOT NULL constraint failed: content_sections.sort_order"),
            vec!["order".to_string()]
        );
        assert!(constraint_fields("FOREIGN KEY constraint failed").is_empty());
    }

    #[test]
    fn test_unique_violation_is_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE users (id TEXT PRIMARY KEY, email TEXT UNIQUE);")
            .unwrap();
        conn.execute("INSERT INTO users VALUES ('a', 'x@y.z')", []).unwrap();
        let err = conn
            .execute("INSERT INTO users VALUES ('b', 'x@y.z')", [])
            .unwrap_err();

        let ex = from_rusqlite(err);
        assert_eq!(ex.kind(), ExErrorKind::Conflict);
        assert_eq!(ex.fields(), ["email".to_string()]);
    }

    #[test]
    fn test_other_failures_are_persistence() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn.execute("SELECT * FROM missing", []).unwrap_err();
        assert_eq!(from_rusqlite(err).kind(), ExErrorKind::Persistence);
    }
}
