//! Schema migrations
//!
//! - Embedded, ordered SQL files
//! - Idempotent application recorded in `schema_version`
//! - Checksums detect edits to already-applied migrations

mod checksums;
mod embedded;
mod runner;

pub use checksums::compute_checksum;
pub use runner::{applied_migrations, apply_migrations, AppliedMigration};
