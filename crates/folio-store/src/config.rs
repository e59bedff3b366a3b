//! Store configuration
//!
//! `StoreConfig` can be built in code, parsed from TOML, or read from the
//! environment (a `.env` file is honoured). Every value has a default, so an
//! empty configuration opens a private in-memory database.
//!
//! ```toml
//! database_url = "sqlite://data/folio.db"
//! max_connections = 8
//! log = ["query", "warn", "error"]
//! user_delete = "cascade"
//!
//! [transaction]
//! timeout_ms = 10000
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{config_error, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";

/// Log categories the store emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Operation start/end events
    Info,
    /// Every SQL statement, under target `folio_store::query`
    Query,
    Warn,
    /// Failed operations
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(LogLevel::Info),
            "query" => Ok(LogLevel::Query),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// What deleting a User does to the Posts and Projects they author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserDeletePolicy {
    /// Refuse with Conflict while the user still authors content
    #[default]
    Restrict,
    /// Delete the user's posts and projects along with the user
    Cascade,
}

impl FromStr for UserDeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restrict" => Ok(UserDeletePolicy::Restrict),
            "cascade" => Ok(UserDeletePolicy::Cascade),
            other => Err(format!("unknown user delete policy '{}'", other)),
        }
    }
}

/// Default bounds for interactive transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransactionConfig {
    /// Longest wait for a connection before the transaction starts
    pub max_wait_ms: u64,
    /// Longest the transaction body may run
    pub timeout_ms: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: 2000,
            timeout_ms: 5000,
        }
    }
}

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// Private in-memory database, gone when the client disconnects
    Memory,
    File(PathBuf),
}

impl DatabaseTarget {
    /// Parse a database URL
    ///
    /// Accepts `sqlite::memory:`, `:memory:`, `sqlite://<path>`,
    /// `sqlite:<path>`, `file:<path>` and bare paths.
    ///
    /// # Errors
    ///
    /// Configuration error for empty URLs and non-SQLite schemes.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(config_error("database_url is empty"));
        }
        if matches!(url, "sqlite::memory:" | ":memory:" | "sqlite://:memory:") {
            return Ok(DatabaseTarget::Memory);
        }

        let path = if let Some(rest) = url.strip_prefix("sqlite://") {
            rest
        } else if let Some(rest) = url.strip_prefix("sqlite:") {
            rest
        } else if let Some(rest) = url.strip_prefix("file:") {
            rest
        } else if let Some((scheme, _)) = url.split_once("://") {
            return Err(config_error(format!(
                "unsupported database scheme '{}'; expected sqlite",
                scheme
            )));
        } else {
            url
        };
        // Connection options such as `?mode=rwc` are not supported
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() {
            return Err(config_error(format!("database_url '{}' has no path", url)));
        }
        Ok(DatabaseTarget::File(PathBuf::from(path)))
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, DatabaseTarget::Memory)
    }
}

impl fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseTarget::Memory => write!(f, "{}", DEFAULT_DATABASE_URL),
            DatabaseTarget::File(path) => write!(f, "sqlite://{}", path.display()),
        }
    }
}

/// Complete store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub database_url: String,
    /// Pool size; an in-memory database always uses one connection
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    /// How long SQLite retries a locked database before reporting busy
    pub busy_timeout_ms: u64,
    pub log: Vec<LogLevel>,
    pub transaction: TransactionConfig,
    pub user_delete: UserDeletePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 4,
            acquire_timeout_ms: 5000,
            busy_timeout_ms: 5000,
            log: vec![LogLevel::Warn, LogLevel::Error],
            transaction: TransactionConfig::default(),
            user_delete: UserDeletePolicy::default(),
        }
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| config_error(format!("invalid {}='{}': {}", key, raw, e)))
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            database_url: format!("sqlite://{}", path.as_ref().display()),
            ..Self::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_log(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.log = levels.into_iter().collect();
        self
    }

    pub fn with_user_delete(mut self, policy: UserDeletePolicy) -> Self {
        self.user_delete = policy;
        self
    }

    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Configuration error on malformed TOML, unknown keys or invalid values.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(source)
            .map_err(|e| config_error(format!("invalid store configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    ///
    /// Configuration error when the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Build from process environment, loading `.env` first when present
    ///
    /// # Errors
    ///
    /// Configuration error when a variable does not parse.
    pub fn from_env() -> Result<Self> {
        // A missing .env is the normal case outside development
        let _ = dotenvy::dotenv();
        Self::from_env_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup, starting from defaults
    ///
    /// # Errors
    ///
    /// Configuration error when a variable does not parse.
    pub fn from_env_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Self::default().with_env_overrides(lookup)
    }

    /// Override fields from variables that are set
    ///
    /// # Errors
    ///
    /// Configuration error when a variable does not parse.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(raw) = lookup("FOLIO_POOL_MAX") {
            self.max_connections = parse_env("FOLIO_POOL_MAX", &raw)?;
        }
        if let Some(raw) = lookup("FOLIO_POOL_ACQUIRE_TIMEOUT_MS") {
            self.acquire_timeout_ms = parse_env("FOLIO_POOL_ACQUIRE_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("FOLIO_BUSY_TIMEOUT_MS") {
            self.busy_timeout_ms = parse_env("FOLIO_BUSY_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("FOLIO_LOG") {
            self.log = raw
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(|part| parse_env("FOLIO_LOG", part))
                .collect::<Result<Vec<_>>>()?;
        }
        if let Some(raw) = lookup("FOLIO_TX_MAX_WAIT_MS") {
            self.transaction.max_wait_ms = parse_env("FOLIO_TX_MAX_WAIT_MS", &raw)?;
        }
        if let Some(raw) = lookup("FOLIO_TX_TIMEOUT_MS") {
            self.transaction.timeout_ms = parse_env("FOLIO_TX_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("FOLIO_USER_DELETE") {
            self.user_delete = parse_env("FOLIO_USER_DELETE", &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check value ranges and the database URL
    ///
    /// # Errors
    ///
    /// Configuration error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.target()?;
        if self.max_connections == 0 {
            return Err(config_error("max_connections must be at least 1"));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(config_error("acquire_timeout_ms must be positive"));
        }
        if self.transaction.timeout_ms == 0 {
            return Err(config_error("transaction.timeout_ms must be positive"));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Configuration error when `database_url` does not parse.
    pub fn target(&self) -> Result<DatabaseTarget> {
        DatabaseTarget::parse(&self.database_url)
    }

    /// Pool size after the in-memory restriction
    pub fn effective_max_connections(&self) -> u32 {
        match self.target() {
            Ok(DatabaseTarget::Memory) => 1,
            _ => self.max_connections,
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn logs(&self, level: LogLevel) -> bool {
        self.log.contains(&level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::errors::ExErrorKind;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.target().unwrap(), DatabaseTarget::Memory);
        assert_eq!(config.effective_max_connections(), 1);
        assert!(config.logs(LogLevel::Error));
        assert!(!config.logs(LogLevel::Query));
        assert_eq!(config.user_delete, UserDeletePolicy::Restrict);
    }

    #[test]
    fn test_url_forms() {
        let file = |p: &str| DatabaseTarget::File(PathBuf::from(p));
        assert_eq!(DatabaseTarget::parse(":memory:").unwrap(), DatabaseTarget::Memory);
        assert_eq!(DatabaseTarget::parse("sqlite://data/a.db").unwrap(), file("data/a.db"));
        assert_eq!(DatabaseTarget::parse("sqlite:a.db").unwrap(), file("a.db"));
        assert_eq!(DatabaseTarget::parse("file:/tmp/a.db").unwrap(), file("/tmp/a.db"));
        assert_eq!(DatabaseTarget::parse("a.db").unwrap(), file("a.db"));
    }

    #[test]
    fn test_foreign_scheme_rejected() {
        let err = DatabaseTarget::parse("postgresql://localhost/portfolio").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Configuration);
    }

    #[test]
    fn test_toml_parsing() {
        let config = StoreConfig::from_toml_str(
            r#"
            database_url = "sqlite://folio.db"
            max_connections = 8
            log = ["query", "error"]
            user_delete = "cascade"

            [transaction]
            timeout_ms = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.max_connections, 8);
        assert!(config.logs(LogLevel::Query));
        assert_eq!(config.user_delete, UserDeletePolicy::Cascade);
        assert_eq!(config.transaction.timeout_ms, 100);
        assert_eq!(config.transaction.max_wait_ms, 2000);
    }

    #[test]
    fn test_unknown_toml_key_rejected() {
        let err = StoreConfig::from_toml_str("pool_size = 3").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Configuration);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite:env.db"),
            ("FOLIO_POOL_MAX", "2"),
            ("FOLIO_LOG", "info, query"),
            ("FOLIO_USER_DELETE", "Cascade"),
        ]
        .into_iter()
        .collect();
        let config = StoreConfig::from_env_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.target().unwrap(), DatabaseTarget::File("env.db".into()));
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.log, vec![LogLevel::Info, LogLevel::Query]);
        assert_eq!(config.user_delete, UserDeletePolicy::Cascade);
    }

    #[test]
    fn test_env_parse_failure() {
        let err = StoreConfig::from_env_vars(|k| (k == "FOLIO_POOL_MAX").then(|| "many".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Configuration);
        assert!(err.message().contains("FOLIO_POOL_MAX"));
    }

    #[test]
    fn test_zero_pool_rejected() {
        let config = StoreConfig::default().with_max_connections(0);
        assert!(config.validate().is_err());
    }
}
