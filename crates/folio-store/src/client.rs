//! Store entry point and interactive transactions
//!
//! `FolioClient` owns the connection pool. Repositories borrow from it (one
//! pooled connection per call) or from a `Transaction` (every call on the
//! transaction's connection, committed or rolled back together).

use std::time::{Duration, Instant};

use folio_core::errors::ExErrorKind;
use folio_core::model::{
    ContentSection, Entity, GalleryImage, Media, Post, Project, Tag, User,
};
use folio_core::{log_op_end, log_op_error, log_op_start};
use rusqlite::Connection;

use crate::config::StoreConfig;
use crate::engine::EngineContext;
use crate::errors::{from_rusqlite, timeout, Result};
use crate::migrations::apply_migrations;
use crate::pool::{ConnectionPool, PoolStatus};
use crate::repo::{Repository, Scope};

/// Access to one repository per entity
///
/// Implemented by the client (autocommit calls) and by `Transaction`.
pub trait Repositories {
    fn repository<E: Entity>(&self) -> Repository<'_, E>;

    fn users(&self) -> Repository<'_, User> {
        self.repository()
    }

    fn posts(&self) -> Repository<'_, Post> {
        self.repository()
    }

    fn projects(&self) -> Repository<'_, Project> {
        self.repository()
    }

    fn tags(&self) -> Repository<'_, Tag> {
        self.repository()
    }

    fn gallery_images(&self) -> Repository<'_, GalleryImage> {
        self.repository()
    }

    fn content_sections(&self) -> Repository<'_, ContentSection> {
        self.repository()
    }

    fn media(&self) -> Repository<'_, Media> {
        self.repository()
    }
}

/// Per-transaction limits; unset values fall back to the store config
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Longest wait for a connection
    pub max_wait: Option<Duration>,
    /// Longest the transaction body may run
    pub timeout: Option<Duration>,
}

impl TxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = Some(wait);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// One operation of a `batch`
pub type BatchOp<'a, T> = Box<dyn FnOnce(&Transaction<'_>) -> Result<T> + 'a>;

/// Connected store
pub struct FolioClient {
    config: StoreConfig,
    pool: ConnectionPool,
    ctx: EngineContext,
}

impl FolioClient {
    /// Open the store described by `config` and bring its schema up to date
    ///
    /// # Errors
    ///
    /// Configuration when `config` is invalid, StoreUnavailable when the
    /// database cannot be opened, Persistence when a migration fails.
    pub fn connect(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let target = config.target()?;
        let pool = ConnectionPool::new(
            target,
            config.max_connections,
            config.busy_timeout(),
            config.acquire_timeout(),
        );
        {
            let conn = pool.acquire(config.acquire_timeout())?;
            apply_migrations(&conn)?;
        }
        let ctx = EngineContext::from_config(&config);
        if ctx.log_info {
            tracing::info!(database = %pool.target(), max_connections = pool.status().max, "store connected");
        }
        Ok(Self { config, pool, ctx })
    }

    /// Connect using `StoreConfig::from_env`
    pub fn connect_env() -> Result<Self> {
        Self::connect(StoreConfig::from_env()?)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Close the pool; every later call fails with StoreUnavailable
    pub fn disconnect(&self) {
        self.pool.close();
        if self.ctx.log_info {
            tracing::info!(database = %self.pool.target(), "store disconnected");
        }
    }

    /// Run `body` in one transaction
    ///
    /// Commits when `body` returns `Ok` within the timeout, rolls back
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Timeout when no connection frees up within `max_wait` or the body
    /// outlives `timeout`; any error `body` returns.
    pub fn transaction<T>(
        &self,
        options: TxOptions,
        body: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let op = "transaction";
        let start = Instant::now();
        if self.ctx.log_info {
            log_op_start!(op);
        }
        let result = self.run_transaction(options, body).map_err(|e| {
            let entity = e.entity().unwrap_or("Transaction").to_string();
            e.in_context(op, &entity)
        });
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) if self.ctx.log_info => {
                log_op_end!(op, duration_ms = duration_ms);
            }
            Err(err) if self.ctx.log_error => {
                log_op_error!(op, err, duration_ms = duration_ms);
            }
            _ => {}
        }
        result
    }

    fn run_transaction<T>(
        &self,
        options: TxOptions,
        body: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let max_wait = options
            .max_wait
            .unwrap_or(Duration::from_millis(self.config.transaction.max_wait_ms));
        let limit = options
            .timeout
            .unwrap_or(Duration::from_millis(self.config.transaction.timeout_ms));

        let conn = self
            .pool
            .acquire(max_wait)
            .map_err(|e| e.into_ex_error(ExErrorKind::Timeout))?;
        let deadline = Instant::now() + limit;
        conn.execute_batch("BEGIN IMMEDIATE").map_err(from_rusqlite)?;

        let tx = Transaction {
            conn: &conn,
            ctx: &self.ctx,
            deadline,
        };
        let outcome = match body(&tx) {
            Ok(_) if Instant::now() > deadline => Err(timeout(format!(
                "transaction exceeded its {} ms timeout",
                limit.as_millis()
            ))),
            other => other,
        };
        let outcome = outcome.and_then(|value| {
            conn.execute_batch("COMMIT").map_err(from_rusqlite)?;
            Ok(value)
        });

        if outcome.is_err() && !conn.is_autocommit() {
            if let Err(err) = conn.execute_batch("ROLLBACK") {
                if self.ctx.log_warn {
                    tracing::warn!(error = %err, "transaction rollback did not complete");
                }
            } else if self.ctx.log_warn {
                tracing::warn!("transaction rolled back");
            }
        }
        outcome
    }

    /// Run `ops` in order inside one transaction and collect their results
    pub fn batch<'a, T>(&self, ops: Vec<BatchOp<'a, T>>) -> Result<Vec<T>> {
        self.transaction(TxOptions::default(), |tx| {
            ops.into_iter().map(|op| op(tx)).collect()
        })
    }
}

impl Repositories for FolioClient {
    fn repository<E: Entity>(&self) -> Repository<'_, E> {
        Repository::new(
            Scope::Pool {
                pool: &self.pool,
                wait: self.config.acquire_timeout(),
            },
            &self.ctx,
        )
    }
}

/// An open transaction; dropped with its closure
pub struct Transaction<'c> {
    conn: &'c Connection,
    ctx: &'c EngineContext,
    deadline: Instant,
}

impl Transaction<'_> {
    /// Time left before the transaction times out
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

impl Repositories for Transaction<'_> {
    fn repository<E: Entity>(&self) -> Repository<'_, E> {
        Repository::new(
            Scope::Transaction {
                conn: self.conn,
                deadline: Some(self.deadline),
            },
            self.ctx,
        )
    }
}
