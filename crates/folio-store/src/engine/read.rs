//! Reads: unique lookups, windowed scans and projections

use std::collections::HashSet;

use folio_core::model::schema::EntitySchema;
use folio_core::query::{Filter, FindArgs, Include, OrderBy, Select, Unique};
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};

use super::{decode_record, include, Record, Session};
use crate::errors::{from_rusqlite, Result};
use crate::sql::value::to_sql;
use crate::sql::{col, field, order_terms, quote, select_list, SqlWriter, ROOT};

/// Filtering and pagination shared by scans and aggregates
#[derive(Debug, Clone, Copy, Default)]
pub struct Window<'a> {
    pub filter: Option<&'a Filter>,
    pub order_by: &'a [OrderBy],
    pub cursor: Option<&'a Unique>,
    pub skip: Option<u64>,
    pub take: Option<i64>,
    pub distinct: &'a [String],
}

impl<'a> From<&'a FindArgs> for Window<'a> {
    fn from(args: &'a FindArgs) -> Self {
        Self {
            filter: args.filter.as_ref(),
            order_by: &args.order_by,
            cursor: args.cursor.as_ref(),
            skip: args.skip,
            take: args.take,
            distinct: &args.distinct,
        }
    }
}

/// A compiled window ready to run
#[derive(Debug)]
pub struct WindowQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
    backwards: bool,
    /// skip/take left for after de-duplication
    deferred: Option<(u64, Option<u64>)>,
}

impl WindowQuery {
    /// Apply what SQL could not: distinct, deferred paging, backward order
    fn finish(&self, mut records: Vec<Record>, distinct: &[String]) -> Vec<Record> {
        if !distinct.is_empty() {
            let mut seen = HashSet::new();
            records.retain(|r| {
                let key: Vec<String> = distinct
                    .iter()
                    .map(|f| r.get(f).map(Value::to_string).unwrap_or_default())
                    .collect();
                seen.insert(key)
            });
        }
        if let Some((skip, take)) = self.deferred {
            let skip = usize::try_from(skip).unwrap_or(usize::MAX);
            records = records.into_iter().skip(skip).collect();
            if let Some(take) = take {
                records.truncate(usize::try_from(take).unwrap_or(usize::MAX));
            }
        }
        if self.backwards {
            records.reverse();
        }
        records
    }
}

/// Fetch a row by primary key or unique field
pub fn find_by_unique(s: &Session<'_>, schema: &EntitySchema, unique: &Unique) -> Result<Option<Record>> {
    let def = field(schema, &unique.field)?;
    let sql = format!(
        "SELECT {} FROM {} AS {} WHERE {} = ? LIMIT 1",
        select_list(schema, ROOT),
        quote(schema.table),
        ROOT,
        col(ROOT, def.column)
    );
    let mut rows = s.query(&sql, &[to_sql(def, &unique.value)?], |r| decode_record(schema, r, 0))?;
    Ok(rows.pop())
}

/// Fetch rows by primary key, in no particular order
pub fn find_by_ids(s: &Session<'_>, schema: &EntitySchema, ids: &[String]) -> Result<Vec<Record>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut w = SqlWriter::new();
    let sql = format!(
        "SELECT {} FROM {} AS {} WHERE {} IN {}",
        select_list(schema, ROOT),
        quote(schema.table),
        ROOT,
        col(ROOT, schema.primary().column),
        w.bind_id_set(ids)
    );
    s.query(&sql, w.params(), |r| decode_record(schema, r, 0))
}

/// Compile `SELECT <columns> FROM <table> WHERE .. ORDER BY .. LIMIT ..`
///
/// `None` when the cursor row does not exist, in which case the window is
/// empty.
pub fn compile_window(
    s: &Session<'_>,
    schema: &EntitySchema,
    window: &Window<'_>,
    columns: &str,
) -> Result<Option<WindowQuery>> {
    let backwards = window.take.is_some_and(|t| t < 0);
    let mut orders = window.order_by.to_vec();
    if orders.is_empty() && (window.cursor.is_some() || backwards) {
        orders.push(OrderBy::asc(schema.primary().name));
    }
    if backwards {
        orders = orders.iter().map(OrderBy::reversed).collect();
    }

    let mut w = SqlWriter::new();
    let mut conditions = Vec::new();
    if let Some(filter) = window.filter {
        conditions.push(w.filter(schema, ROOT, filter)?);
    }
    if let Some(cursor) = window.cursor {
        let Some(anchor) = find_by_unique(s, schema, cursor)? else {
            return Ok(None);
        };
        conditions.push(w.cursor_predicate(schema, ROOT, &orders, &anchor)?);
    }

    let mut sql = format!("SELECT {} FROM {} AS {}", columns, quote(schema.table), ROOT);
    if !conditions.is_empty() {
        let joined = conditions
            .iter()
            .map(|c| format!("({})", c))
            .collect::<Vec<_>>()
            .join(" AND ");
        sql.push_str(" WHERE ");
        sql.push_str(&joined);
    }
    if !orders.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_terms(schema, ROOT, &orders)?);
    }

    let take = window.take.map(i64::unsigned_abs);
    let mut deferred = None;
    if !window.distinct.is_empty() {
        if window.skip.is_some() || take.is_some() {
            deferred = Some((window.skip.unwrap_or(0), take));
        }
    } else if take.is_some() || window.skip.is_some() {
        let limit = take.map_or(-1, |t| i64::try_from(t).unwrap_or(i64::MAX));
        let offset = window.skip.map_or(0, |k| i64::try_from(k).unwrap_or(i64::MAX));
        sql.push_str(&format!(
            " LIMIT {} OFFSET {}",
            w.bind(SqlValue::Integer(limit)),
            w.bind(SqlValue::Integer(offset))
        ));
    }

    Ok(Some(WindowQuery {
        sql,
        params: w.into_params(),
        backwards,
        deferred,
    }))
}

/// Scalar rows of a window, in the requested order
pub fn scan(s: &Session<'_>, schema: &EntitySchema, window: &Window<'_>) -> Result<Vec<Record>> {
    let Some(query) = compile_window(s, schema, window, &select_list(schema, ROOT))? else {
        return Ok(Vec::new());
    };
    let records = s.query(&query.sql, &query.params, |r| decode_record(schema, r, 0))?;
    Ok(query.finish(records, window.distinct))
}

pub fn find_unique(
    s: &Session<'_>,
    schema: &EntitySchema,
    unique: &Unique,
    include: Option<&Include>,
) -> Result<Option<Record>> {
    let Some(mut record) = find_by_unique(s, schema, unique)? else {
        return Ok(None);
    };
    if let Some(include) = include {
        include::load(s, schema, std::slice::from_mut(&mut record), include)?;
    }
    Ok(Some(record))
}

pub fn find_many(s: &Session<'_>, schema: &EntitySchema, args: &FindArgs) -> Result<Vec<Record>> {
    let mut records = scan(s, schema, &Window::from(args))?;
    if let Some(include) = &args.include {
        include::load(s, schema, &mut records, include)?;
    }
    Ok(records)
}

/// First row of the window; a negative take keeps paging backwards
pub fn find_first(s: &Session<'_>, schema: &EntitySchema, args: &FindArgs) -> Result<Option<Record>> {
    let mut window = Window::from(args);
    window.take = Some(if args.take.is_some_and(|t| t < 0) { -1 } else { 1 });
    let mut records = scan(s, schema, &window)?;
    records.truncate(1);
    if let Some(include) = &args.include {
        include::load(s, schema, &mut records, include)?;
    }
    Ok(records.pop())
}

/// Number of rows matching `filter`
pub fn count(s: &Session<'_>, schema: &EntitySchema, filter: Option<&Filter>) -> Result<u64> {
    let mut w = SqlWriter::new();
    let mut sql = format!("SELECT COUNT(*) FROM {} AS {}", quote(schema.table), ROOT);
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(&w.filter(schema, ROOT, filter)?);
    }
    let rows = s.query(&sql, w.params(), |r| r.get::<_, i64>(0).map_err(from_rusqlite))?;
    Ok(rows.first().copied().unwrap_or(0).max(0) as u64)
}

/// Ids of the rows matching `filter`, at most `limit` of them
pub fn matching_ids(
    s: &Session<'_>,
    schema: &EntitySchema,
    filter: Option<&Filter>,
    limit: Option<u64>,
) -> Result<Vec<String>> {
    let mut w = SqlWriter::new();
    let mut sql = format!(
        "SELECT {} FROM {} AS {}",
        col(ROOT, schema.primary().column),
        quote(schema.table),
        ROOT
    );
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(&w.filter(schema, ROOT, filter)?);
    }
    if let Some(limit) = limit {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        sql.push_str(&format!(" LIMIT {}", w.bind(SqlValue::Integer(limit))));
    }
    s.query(&sql, w.params(), |r| r.get::<_, String>(0).map_err(from_rusqlite))
}

/// Narrow a loaded record to a projection
pub fn project(schema: &EntitySchema, record: &Record, select: &Select) -> Value {
    let mut out = Map::new();
    for name in &select.fields {
        if let Some(value) = record.get(name) {
            out.insert(name.clone(), value.clone());
        }
    }
    for (name, rel_select) in &select.relations {
        let Some(rel) = schema.relation(name) else {
            continue;
        };
        let target = rel.target_schema();
        let narrow = |item: &Value| match item {
            Value::Object(obj) => match &rel_select.select {
                Some(inner) => project(target, obj, inner),
                None => scalars(target, obj),
            },
            other => other.clone(),
        };
        let value = match record.get(name) {
            Some(Value::Array(items)) => Value::Array(items.iter().map(narrow).collect()),
            Some(item @ Value::Object(_)) => narrow(item),
            _ => Value::Null,
        };
        out.insert(name.clone(), value);
    }
    if !select.count.is_empty() {
        if let Some(counts) = record.get("_count") {
            out.insert("_count".to_string(), counts.clone());
        }
    }
    Value::Object(out)
}

fn scalars(schema: &EntitySchema, record: &Record) -> Value {
    Value::Object(
        schema
            .fields
            .iter()
            .filter_map(|f| record.get(f.name).map(|v| (f.name.to_string(), v.clone())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::model::schema::TAG;
    use serde_json::json;

    #[test]
    fn test_project_keeps_only_selected() {
        let record = json!({
            "id": "1", "name": "rust", "createdAt": "x", "updatedAt": "y",
            "posts": [{"id": "p", "title": "t", "slug": "s"}]
        });
        let Value::Object(record) = record else { unreachable!() };
        let select = Select::fields(["name"]).relation("posts", Select::fields(["slug"]));
        assert_eq!(
            project(&TAG, &record, &select),
            json!({"name": "rust", "posts": [{"slug": "s"}]})
        );
    }

    #[test]
    fn test_finish_dedupes_then_pages() {
        let query = WindowQuery {
            sql: String::new(),
            params: Vec::new(),
            backwards: false,
            deferred: Some((1, Some(1))),
        };
        let rows: Vec<Record> = ["a", "a", "b", "c"]
            .iter()
            .map(|c| {
                let Value::Object(m) = json!({"category": c}) else { unreachable!() };
                m
            })
            .collect();
        let out = query.finish(rows, &["category".to_string()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["category"], json!("b"));
    }
}
