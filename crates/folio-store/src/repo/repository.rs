//! Typed repository over one entity
//!
//! Every call validates its arguments against the entity schema, borrows a
//! connection (or runs on the enclosing transaction's), executes through the
//! engine and converts records into `E`. Writes are atomic per call.

use std::marker::PhantomData;
use std::time::{Duration, Instant};

use folio_core::errors::{ExError, QueryError};
use folio_core::model::{Entity, EntitySchema};
use folio_core::query::{
    AggregateArgs, AggregateResult, BatchCount, Filter, FindArgs, FindUniqueArgs, GroupByArgs,
    GroupRow, Select, Unique,
};
use folio_core::rules::{
    validate_aggregate, validate_filter, validate_find, validate_group_by, validate_include,
    validate_select, validate_unique,
};
use folio_core::{log_op_end, log_op_error, log_op_start};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::engine::{aggregate, read, write, EngineContext, Record, Session};
use crate::errors::Result;
use crate::pool::ConnectionPool;

/// Where a repository gets its connection
#[derive(Clone, Copy)]
pub(crate) enum Scope<'a> {
    /// A pooled connection per call
    Pool {
        pool: &'a ConnectionPool,
        wait: Duration,
    },
    /// The connection of an open transaction
    Transaction {
        conn: &'a Connection,
        deadline: Option<Instant>,
    },
}

/// Data access for entity `E`
pub struct Repository<'a, E: Entity> {
    scope: Scope<'a>,
    ctx: &'a EngineContext,
    _entity: PhantomData<fn() -> E>,
}

fn to_payload<T: Serialize>(entity: &str, value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(QueryError::MalformedPayload {
            entity: entity.to_string(),
        }
        .into()),
    }
}

fn decode<E: Entity>(record: Record) -> Result<E> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

fn decode_all<E: Entity>(records: Vec<Record>) -> Result<Vec<E>> {
    records.into_iter().map(decode).collect()
}

fn count_of(n: usize) -> BatchCount {
    BatchCount { count: n as u64 }
}

impl<'a, E: Entity> Repository<'a, E> {
    pub(crate) fn new(scope: Scope<'a>, ctx: &'a EngineContext) -> Self {
        Self {
            scope,
            ctx,
            _entity: PhantomData,
        }
    }

    fn with_session<T>(
        &self,
        atomic: bool,
        body: impl FnOnce(&Session<'_>) -> Result<T>,
    ) -> Result<T> {
        match self.scope {
            Scope::Pool { pool, wait } => {
                let conn = pool.acquire(wait)?;
                let session = Session::new(&conn, self.ctx, None);
                if atomic {
                    session.atomic(body)
                } else {
                    body(&session)
                }
            }
            Scope::Transaction { conn, deadline } => {
                let session = Session::new(conn, self.ctx, deadline);
                if atomic {
                    session.atomic(body)
                } else {
                    body(&session)
                }
            }
        }
    }

    fn run<T>(
        &self,
        op: &'static str,
        atomic: bool,
        body: impl FnOnce(&Session<'_>) -> Result<T>,
    ) -> Result<T> {
        self.run_checked(op, atomic, || Ok(()), body)
    }

    /// Run one repository operation with boundary logging and error context
    ///
    /// `check` runs before a connection is borrowed.
    fn run_checked<T>(
        &self,
        op: &'static str,
        atomic: bool,
        check: impl FnOnce() -> Result<()>,
        body: impl FnOnce(&Session<'_>) -> Result<T>,
    ) -> Result<T> {
        let entity = E::schema().name;
        let start = Instant::now();
        if self.ctx.log_info {
            log_op_start!(op, entity = entity);
        }

        let result = check()
            .and_then(|()| self.with_session(atomic, body))
            .map_err(|e| e.in_context(op, entity));

        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) if self.ctx.log_info => {
                log_op_end!(op, duration_ms = duration_ms, entity = entity);
            }
            Err(err) if self.ctx.log_error => {
                log_op_error!(op, err, duration_ms = duration_ms, entity = entity);
            }
            _ => {}
        }
        result
    }

    fn not_found(unique: &Unique) -> ExError {
        let schema = E::schema();
        ExError::not_found(
            schema.name,
            format!("no {} with {} = {}", schema.name, unique.field, unique.value),
        )
        .with_field(unique.field.clone())
    }

    // ========== reads ==========

    /// Look up one record by id or a unique field
    ///
    /// # Errors
    ///
    /// Validation when the selector does not name a unique field.
    pub fn find_unique(&self, args: impl Into<FindUniqueArgs>) -> Result<Option<E>> {
        let args = args.into();
        let schema = E::schema();
        let check = || {
            validate_unique(schema, &args.unique)?;
            if let Some(include) = &args.include {
                validate_include(schema, include)?;
            }
            Ok(())
        };
        self.run_checked("find_unique", false, check, |s| {
            read::find_unique(s, schema, &args.unique, args.include.as_ref())?
                .map(decode)
                .transpose()
        })
    }

    /// Like `find_unique`, failing with NotFound when absent
    pub fn find_unique_or_throw(&self, args: impl Into<FindUniqueArgs>) -> Result<E> {
        let args = args.into();
        let unique = args.unique.clone();
        self.find_unique(args)?
            .ok_or_else(|| Self::not_found(&unique).with_op("find_unique_or_throw"))
    }

    pub fn find_first(&self, args: FindArgs) -> Result<Option<E>> {
        let schema = E::schema();
        let check = || Ok(validate_find(schema, &args)?);
        self.run_checked("find_first", false, check, |s| {
            read::find_first(s, schema, &args)?.map(decode).transpose()
        })
    }

    pub fn find_first_or_throw(&self, args: FindArgs) -> Result<E> {
        let schema = E::schema();
        self.find_first(args)?.ok_or_else(|| {
            ExError::not_found(schema.name, format!("no {} matches the query", schema.name))
                .with_op("find_first_or_throw")
        })
    }

    /// All records in the requested window; empty when nothing matches
    pub fn find_many(&self, args: FindArgs) -> Result<Vec<E>> {
        let schema = E::schema();
        let check = || Ok(validate_find(schema, &args)?);
        self.run_checked("find_many", false, check, |s| {
            decode_all(read::find_many(s, schema, &args)?)
        })
    }

    /// Number of records matching `filter`
    pub fn count(&self, filter: Option<Filter>) -> Result<u64> {
        let schema = E::schema();
        let check = || filter_check(schema, filter.as_ref());
        self.run_checked("count", false, check, |s| {
            read::count(s, schema, filter.as_ref())
        })
    }

    // ========== projections ==========

    /// `find_unique` narrowed to a projection
    pub fn select_unique(
        &self,
        args: impl Into<FindUniqueArgs>,
        select: &Select,
    ) -> Result<Option<Value>> {
        let args = args.into();
        let schema = E::schema();
        let check = || {
            if args.include.is_some() {
                return Err(QueryError::SelectWithInclude.into());
            }
            validate_unique(schema, &args.unique)?;
            Ok(validate_select(schema, select)?)
        };
        self.run_checked("select_unique", false, check, |s| {
            let include = select.to_include();
            Ok(read::find_unique(s, schema, &args.unique, Some(&include))?
                .map(|record| read::project(schema, &record, select)))
        })
    }

    pub fn select_first(&self, args: FindArgs, select: &Select) -> Result<Option<Value>> {
        let schema = E::schema();
        let args = projected(args, select);
        let check = || {
            let args = args.as_ref().map_err(Clone::clone)?;
            validate_find(schema, args)?;
            Ok(validate_select(schema, select)?)
        };
        self.run_checked("select_first", false, check, |s| {
            let args = args.as_ref().map_err(Clone::clone)?;
            Ok(read::find_first(s, schema, args)?
                .map(|record| read::project(schema, &record, select)))
        })
    }

    pub fn select_many(&self, args: FindArgs, select: &Select) -> Result<Vec<Value>> {
        let schema = E::schema();
        let args = projected(args, select);
        let check = || {
            let args = args.as_ref().map_err(Clone::clone)?;
            validate_find(schema, args)?;
            Ok(validate_select(schema, select)?)
        };
        self.run_checked("select_many", false, check, |s| {
            let args = args.as_ref().map_err(Clone::clone)?;
            Ok(read::find_many(s, schema, args)?
                .iter()
                .map(|record| read::project(schema, record, select))
                .collect())
        })
    }

    // ========== writes ==========

    /// Insert one record with its nested writes
    ///
    /// # Errors
    ///
    /// Conflict on a unique or foreign-key violation, NotFound when a nested
    /// `connect` target is missing, Validation on a malformed payload.
    pub fn create(&self, data: E::Create) -> Result<E> {
        let schema = E::schema();
        self.run("create", true, |s| {
            let payload = to_payload(schema.name, &data)?;
            decode(write::create(s, schema, payload)?)
        })
    }

    /// Insert many records; nested writes are rejected
    pub fn create_many(&self, data: Vec<E::Create>, skip_duplicates: bool) -> Result<BatchCount> {
        let schema = E::schema();
        self.run("create_many", true, |s| {
            let items = data
                .iter()
                .map(|item| to_payload(schema.name, item))
                .collect::<Result<Vec<_>>>()?;
            Ok(count_of(write::create_many(s, schema, items, skip_duplicates)?.len()))
        })
    }

    pub fn create_many_and_return(
        &self,
        data: Vec<E::Create>,
        skip_duplicates: bool,
    ) -> Result<Vec<E>> {
        let schema = E::schema();
        self.run("create_many_and_return", true, |s| {
            let items = data
                .iter()
                .map(|item| to_payload(schema.name, item))
                .collect::<Result<Vec<_>>>()?;
            let ids = write::create_many(s, schema, items, skip_duplicates)?;
            decode_all(write::reread_all(s, schema, &ids)?)
        })
    }

    /// Patch the record `unique` selects; unset fields stay untouched
    ///
    /// # Errors
    ///
    /// NotFound when no record matches.
    pub fn update(&self, unique: Unique, data: E::Update) -> Result<E> {
        let schema = E::schema();
        self.run("update", true, |s| {
            let payload = to_payload(schema.name, &data)?;
            decode(write::update(s, schema, &unique, payload)?)
        })
    }

    /// Patch every match (up to `limit`); nested writes are rejected
    pub fn update_many(
        &self,
        filter: Option<Filter>,
        data: E::Update,
        limit: Option<u64>,
    ) -> Result<BatchCount> {
        let schema = E::schema();
        let check = || filter_check(schema, filter.as_ref());
        self.run_checked("update_many", true, check, |s| {
            let payload = to_payload(schema.name, &data)?;
            let ids = write::update_many(s, schema, filter.as_ref(), payload, limit)?;
            Ok(count_of(ids.len()))
        })
    }

    pub fn update_many_and_return(
        &self,
        filter: Option<Filter>,
        data: E::Update,
        limit: Option<u64>,
    ) -> Result<Vec<E>> {
        let schema = E::schema();
        let check = || filter_check(schema, filter.as_ref());
        self.run_checked("update_many_and_return", true, check, |s| {
            let payload = to_payload(schema.name, &data)?;
            let ids = write::update_many(s, schema, filter.as_ref(), payload, limit)?;
            decode_all(write::reread_all(s, schema, &ids)?)
        })
    }

    /// Update the record `unique` selects, or create it when absent
    pub fn upsert(&self, unique: Unique, create: E::Create, update: E::Update) -> Result<E> {
        let schema = E::schema();
        self.run("upsert", true, |s| {
            let create = to_payload(schema.name, &create)?;
            let update = to_payload(schema.name, &update)?;
            decode(write::upsert(s, schema, &unique, create, update)?)
        })
    }

    /// Delete the record `unique` selects and return it
    ///
    /// # Errors
    ///
    /// NotFound when no record matches; Conflict when dependents restrict
    /// the delete.
    pub fn delete(&self, unique: Unique) -> Result<E> {
        let schema = E::schema();
        self.run("delete", true, |s| decode(write::delete(s, schema, &unique)?))
    }

    pub fn delete_many(&self, filter: Option<Filter>, limit: Option<u64>) -> Result<BatchCount> {
        let schema = E::schema();
        let check = || filter_check(schema, filter.as_ref());
        self.run_checked("delete_many", true, check, |s| {
            let n = write::delete_many(s, schema, filter.as_ref(), limit)?;
            Ok(BatchCount { count: n })
        })
    }

    // ========== aggregation ==========

    pub fn aggregate(&self, args: AggregateArgs) -> Result<AggregateResult> {
        let schema = E::schema();
        let check = || Ok(validate_aggregate(schema, &args)?);
        self.run_checked("aggregate", false, check, |s| {
            aggregate::aggregate(s, schema, &args)
        })
    }

    /// Grouped aggregates; argument errors surface before the store is touched
    pub fn group_by(&self, args: GroupByArgs) -> Result<Vec<GroupRow>> {
        let schema = E::schema();
        let check = || Ok(validate_group_by(schema, &args)?);
        self.run_checked("group_by", false, check, |s| {
            aggregate::group_by(s, schema, &args)
        })
    }
}

fn filter_check(schema: &EntitySchema, filter: Option<&Filter>) -> Result<()> {
    if let Some(filter) = filter {
        validate_filter(schema, filter)?;
    }
    Ok(())
}

/// Load what a projection needs instead of an explicit include
fn projected(args: FindArgs, select: &Select) -> Result<FindArgs> {
    if args.include.is_some() {
        return Err(QueryError::SelectWithInclude.into());
    }
    let include = select.to_include();
    Ok(if include.is_empty() {
        args
    } else {
        args.include(include)
    })
}
