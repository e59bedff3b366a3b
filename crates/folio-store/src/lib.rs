//! Folio Store - SQLite-backed data access for the Folio content model
//!
//! Provides:
//! - `StoreConfig` loaded from TOML, the environment or `.env`
//! - A bounded connection pool and checksummed embedded migrations
//! - Compilation of the query grammar into parameterized SQL
//! - Typed repositories per entity, interactive transactions and batches
//!
//! ```no_run
//! use folio_core::model::CreateTag;
//! use folio_store::{FolioClient, Repositories, StoreConfig};
//!
//! let client = FolioClient::connect(StoreConfig::in_memory())?;
//! let tag = client.tags().create(CreateTag::new("rust"))?;
//! assert_eq!(tag.name, "rust");
//! # Ok::<(), folio_core::ExError>(())
//! ```

pub mod client;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod migrations;
pub mod pool;
pub mod repo;
pub mod sql;

// Re-export key types
pub use client::{BatchOp, FolioClient, Repositories, Transaction, TxOptions};
pub use config::{DatabaseTarget, LogLevel, StoreConfig, TransactionConfig, UserDeletePolicy};
pub use errors::Result;
pub use pool::PoolStatus;
pub use repo::Repository;
