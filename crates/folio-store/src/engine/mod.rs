//! Schema-driven query engine
//!
//! Records travel through the engine as JSON objects keyed by API field
//! names; typed repositories convert at the boundary. Every statement runs
//! through a `Session`, which owns deadline checks, statement tracing and
//! error mapping.

pub mod aggregate;
pub mod include;
pub mod read;
pub mod write;

use std::time::Instant;

use folio_core::model::schema::EntitySchema;
use folio_core_types::schema::EVENT_QUERY;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, Row};
use serde_json::{Map, Value};

use crate::config::{LogLevel, StoreConfig, UserDeletePolicy};
use crate::errors::{from_rusqlite, timeout, Result};
use crate::sql::value::from_sql;

/// One entity row (plus loaded relations) keyed by API field names
pub type Record = Map<String, Value>;

/// Store-wide settings the engine consults while executing
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub user_delete: UserDeletePolicy,
    pub log_info: bool,
    pub log_query: bool,
    pub log_warn: bool,
    pub log_error: bool,
}

impl EngineContext {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            user_delete: config.user_delete,
            log_info: config.logs(LogLevel::Info),
            log_query: config.logs(LogLevel::Query),
            log_warn: config.logs(LogLevel::Warn),
            log_error: config.logs(LogLevel::Error),
        }
    }
}

/// A connection plus the execution policy of the current scope
pub struct Session<'c> {
    conn: &'c Connection,
    ctx: &'c EngineContext,
    deadline: Option<Instant>,
}

impl<'c> Session<'c> {
    pub fn new(conn: &'c Connection, ctx: &'c EngineContext, deadline: Option<Instant>) -> Self {
        Self { conn, ctx, deadline }
    }

    pub fn context(&self) -> &EngineContext {
        self.ctx
    }

    /// Fail once the enclosing transaction's deadline has passed
    pub fn check_deadline(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(timeout("transaction exceeded its timeout"))
            }
            _ => Ok(()),
        }
    }

    fn trace(&self, sql: &str, params: &[SqlValue], rows: usize) {
        if self.ctx.log_query {
            tracing::debug!(
                target: "folio_store::query",
                event = EVENT_QUERY,
                sql = %sql,
                param_count = params.len(),
                row_count = rows,
            );
        }
    }

    /// Run a SELECT and map every row
    pub fn query<T>(
        &self,
        sql: &str,
        params: &[SqlValue],
        mut map: impl FnMut(&Row<'_>) -> Result<T>,
    ) -> Result<Vec<T>> {
        self.check_deadline()?;
        let mut stmt = self.conn.prepare_cached(sql).map_err(from_rusqlite)?;
        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(from_rusqlite)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(from_rusqlite)? {
            out.push(map(row)?);
        }
        self.trace(sql, params, out.len());
        Ok(out)
    }

    /// Run a write statement and return the affected row count
    pub fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize> {
        self.check_deadline()?;
        let mut stmt = self.conn.prepare_cached(sql).map_err(from_rusqlite)?;
        let affected = stmt
            .execute(params_from_iter(params.iter()))
            .map_err(from_rusqlite)?;
        self.trace(sql, params, affected);
        Ok(affected)
    }

    /// Run `f` so that all of its writes apply or none do
    ///
    /// Outside a transaction this opens one (`BEGIN IMMEDIATE`); inside, a
    /// savepoint.
    pub fn atomic<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let top_level = self.conn.is_autocommit();
        let (begin, commit, rollback) = if top_level {
            ("BEGIN IMMEDIATE", "COMMIT", "ROLLBACK")
        } else {
            (
                "SAVEPOINT folio_op",
                "RELEASE folio_op",
                "ROLLBACK TO folio_op; RELEASE folio_op",
            )
        };

        self.check_deadline()?;
        self.conn.execute_batch(begin).map_err(from_rusqlite)?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch(commit).map_err(from_rusqlite)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.conn.execute_batch(rollback) {
                    if self.ctx.log_warn {
                        tracing::warn!(error = %rollback_err, "rollback after failed write did not complete");
                    }
                }
                Err(err)
            }
        }
    }
}

/// Decode the scalar columns of `schema` starting at column `offset`
pub fn decode_record(schema: &EntitySchema, row: &Row<'_>, offset: usize) -> Result<Record> {
    let mut record = Map::with_capacity(schema.fields.len());
    for (i, field) in schema.fields.iter().enumerate() {
        let raw = row.get_ref(offset + i).map_err(from_rusqlite)?;
        record.insert(field.name.to_string(), from_sql(field, raw)?);
    }
    Ok(record)
}

/// Primary key of a decoded record
pub fn record_id(record: &Record) -> Result<String> {
    match record.get("id") {
        Some(Value::String(id)) => Ok(id.clone()),
        _ => Err(crate::errors::internal("record without a string id")),
    }
}
