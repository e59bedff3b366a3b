//! Bounded connection pool
//!
//! A thin owner around an `r2d2` pool of SQLite connections. Connections are
//! opened lazily up to the configured maximum, configured once by
//! `db::configure`, and returned when their guard drops. Closing drops the
//! pool handle; lent connections are closed as they come back.

use std::time::Duration;

use folio_core::errors::{ExError, ExErrorKind};
use parking_lot::RwLock;
use r2d2::{CustomizeConnection, HandleError, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::config::DatabaseTarget;
use crate::db;
use crate::errors::{timeout, unavailable};

/// A connection lent out by the pool
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub open: u32,
    pub idle: u32,
    pub max: u32,
    pub closed: bool,
}

/// Why an acquisition failed
#[derive(Debug)]
pub enum AcquireError {
    Closed,
    /// `cause` carries the last connection error, if one occurred
    TimedOut { waited: Duration, cause: String },
}

impl AcquireError {
    /// Convert, reporting a wait timeout as `timeout_kind`
    pub fn into_ex_error(self, timeout_kind: ExErrorKind) -> ExError {
        match self {
            AcquireError::Closed => unavailable("connection pool is disconnected"),
            AcquireError::TimedOut { waited, cause } => {
                let message = format!(
                    "no connection available after waiting {} ms ({})",
                    waited.as_millis(),
                    cause
                );
                match timeout_kind {
                    ExErrorKind::Timeout => timeout(message),
                    _ => unavailable(message),
                }
            }
        }
    }
}

impl From<AcquireError> for ExError {
    fn from(err: AcquireError) -> Self {
        err.into_ex_error(ExErrorKind::StoreUnavailable)
    }
}

/// Runs `db::configure` on every new connection
#[derive(Debug)]
struct ConnectionSettings {
    target: DatabaseTarget,
    busy_timeout: Duration,
}

impl CustomizeConnection<Connection, rusqlite::Error> for ConnectionSettings {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        db::configure(conn, &self.target, self.busy_timeout)
    }
}

#[derive(Debug)]
struct TracingErrorHandler;

impl HandleError<rusqlite::Error> for TracingErrorHandler {
    fn handle_error(&self, error: rusqlite::Error) {
        tracing::warn!(error = %error, "pooled connection failed");
    }
}

pub struct ConnectionPool {
    target: DatabaseTarget,
    max: u32,
    inner: RwLock<Option<Pool<SqliteConnectionManager>>>,
}

impl ConnectionPool {
    /// Create an empty pool; nothing is opened until the first acquisition
    ///
    /// An in-memory database is private to its connection, so it gets a
    /// single connection that is never recycled.
    pub fn new(
        target: DatabaseTarget,
        max: u32,
        busy_timeout: Duration,
        acquire_timeout: Duration,
    ) -> Self {
        let memory = target.is_memory();
        let max = if memory { 1 } else { max.max(1) };

        let mut builder = Pool::builder()
            .max_size(max)
            .min_idle(Some(0))
            .connection_timeout(acquire_timeout)
            .error_handler(Box::new(TracingErrorHandler))
            .connection_customizer(Box::new(ConnectionSettings {
                target: target.clone(),
                busy_timeout,
            }));
        if memory {
            builder = builder.idle_timeout(None).max_lifetime(None);
        }
        let pool = builder.build_unchecked(db::manager(&target));

        Self {
            target,
            max,
            inner: RwLock::new(Some(pool)),
        }
    }

    /// Borrow a connection, waiting at most `wait`
    ///
    /// # Errors
    ///
    /// `Closed` after `close`, `TimedOut` when every connection stays busy
    /// or a new connection cannot be opened in time.
    pub fn acquire(&self, wait: Duration) -> Result<PooledConnection, AcquireError> {
        let pool = self.inner.read().clone().ok_or(AcquireError::Closed)?;
        pool.get_timeout(wait)
            .map_err(|err| AcquireError::TimedOut {
                waited: wait,
                cause: err.to_string(),
            })
    }

    /// Refuse further acquisitions and release the pool
    ///
    /// Connections currently lent out are closed when returned.
    pub fn close(&self) {
        drop(self.inner.write().take());
    }

    pub fn status(&self) -> PoolStatus {
        match self.inner.read().as_ref() {
            Some(pool) => {
                let state = pool.state();
                PoolStatus {
                    open: state.connections,
                    idle: state.idle_connections,
                    max: self.max,
                    closed: false,
                }
            }
            None => PoolStatus {
                open: 0,
                idle: 0,
                max: self.max,
                closed: true,
            },
        }
    }

    pub fn target(&self) -> &DatabaseTarget {
        &self.target
    }
}
