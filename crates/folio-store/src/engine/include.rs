//! Eager relation loading
//!
//! Each included relation costs one batched query for all parent records,
//! regardless of how many parents there are. To-many pagination is applied
//! per parent after the batch is fetched.

use std::collections::HashMap;

use folio_core::model::schema::{EntitySchema, RelationKind};
use folio_core::query::{Include, RelationArgs};
use serde_json::{Map, Value};

use super::read::find_by_ids;
use super::{decode_record, record_id, Record, Session};
use crate::errors::{from_rusqlite, Result};
use crate::sql::{col, field, order_terms, quote, relation, select_list, SqlWriter, ROOT};

/// Attach the relations named by `include` to every record
pub fn load(
    s: &Session<'_>,
    schema: &EntitySchema,
    records: &mut [Record],
    include: &Include,
) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let ids = records
        .iter()
        .map(record_id)
        .collect::<Result<Vec<_>>>()?;

    for (name, args) in &include.relations {
        let rel = relation(schema, name)?;
        let target = rel.target_schema();
        match rel.kind {
            RelationKind::BelongsTo { field: fk, .. } => {
                load_parent(s, target, records, name, fk, args)?;
            }
            _ => {
                let children = fetch_children(s, schema, name, &ids, args)?;
                let mut grouped = paginate(children, args);
                attach_nested(s, target, &mut grouped, args)?;
                for (record, id) in records.iter_mut().zip(&ids) {
                    let items = grouped.remove(id).unwrap_or_default();
                    record.insert(
                        name.clone(),
                        Value::Array(items.into_iter().map(Value::Object).collect()),
                    );
                }
            }
        }
    }

    if !include.count.is_empty() {
        load_counts(s, schema, records, &ids, &include.count)?;
    }
    Ok(())
}

fn load_parent(
    s: &Session<'_>,
    target: &EntitySchema,
    records: &mut [Record],
    name: &str,
    fk: &str,
    args: &RelationArgs,
) -> Result<()> {
    let mut keys: Vec<String> = records
        .iter()
        .filter_map(|r| r.get(fk).and_then(Value::as_str).map(str::to_string))
        .collect();
    keys.sort();
    keys.dedup();

    let mut parents = find_by_ids(s, target, &keys)?;
    if let Some(nested) = &args.include {
        load(s, target, &mut parents, nested)?;
    }
    let mut by_id = HashMap::with_capacity(parents.len());
    for parent in parents {
        by_id.insert(record_id(&parent)?, parent);
    }

    for record in records.iter_mut() {
        let value = record
            .get(fk)
            .and_then(Value::as_str)
            .and_then(|key| by_id.get(key))
            .cloned()
            .map_or(Value::Null, Value::Object);
        record.insert(name.to_string(), value);
    }
    Ok(())
}

/// `(owner id, child)` pairs for every parent in `ids`, in relation order
fn fetch_children(
    s: &Session<'_>,
    schema: &EntitySchema,
    name: &str,
    ids: &[String],
    args: &RelationArgs,
) -> Result<Vec<(String, Record)>> {
    let rel = relation(schema, name)?;
    let target = rel.target_schema();
    let mut w = SqlWriter::new();
    let id_set = w.bind_id_set(ids);

    let (sql_head, owner_expr) = match rel.kind {
        RelationKind::HasMany { foreign_field } => {
            let owner = col(ROOT, field(target, foreign_field)?.column);
            (
                format!(
                    "SELECT {}, {} FROM {} AS {}",
                    owner,
                    select_list(target, ROOT),
                    quote(target.table),
                    ROOT
                ),
                owner,
            )
        }
        RelationKind::ManyToMany {
            join_table,
            self_column,
            target_column,
        } => {
            let owner = col("j", self_column);
            (
                format!(
                    "SELECT {}, {} FROM {} AS j JOIN {} AS {} ON {} = {}",
                    owner,
                    select_list(target, ROOT),
                    quote(join_table),
                    quote(target.table),
                    ROOT,
                    col(ROOT, target.primary().column),
                    col("j", target_column)
                ),
                owner,
            )
        }
        RelationKind::BelongsTo { .. } => return Ok(Vec::new()),
    };

    let mut sql = format!("{} WHERE {} IN {}", sql_head, owner_expr, id_set);
    if let Some(filter) = &args.filter {
        sql.push_str(&format!(" AND ({})", w.filter(target, ROOT, filter)?));
    }
    if !args.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_terms(target, ROOT, &args.order_by)?);
    }

    s.query(&sql, w.params(), |row| {
        let owner: String = row.get(0).map_err(from_rusqlite)?;
        Ok((owner, decode_record(target, row, 1)?))
    })
}

/// Group children by owner, applying skip/take within each group
fn paginate(children: Vec<(String, Record)>, args: &RelationArgs) -> HashMap<String, Vec<Record>> {
    let skip = args.skip.map_or(0, |k| usize::try_from(k).unwrap_or(usize::MAX));
    let take = args.take.map(|t| usize::try_from(t).unwrap_or(usize::MAX));

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut grouped: HashMap<String, Vec<Record>> = HashMap::new();
    for (owner, child) in children {
        let position = seen.entry(owner.clone()).or_insert(0);
        let index = *position;
        *position += 1;
        if index < skip || take.is_some_and(|t| index - skip >= t) {
            continue;
        }
        grouped.entry(owner).or_default().push(child);
    }
    grouped
}

fn attach_nested(
    s: &Session<'_>,
    target: &EntitySchema,
    grouped: &mut HashMap<String, Vec<Record>>,
    args: &RelationArgs,
) -> Result<()> {
    let Some(nested) = &args.include else {
        return Ok(());
    };
    let mut owners = Vec::new();
    let mut flat = Vec::new();
    for (owner, items) in grouped.drain() {
        for item in items {
            owners.push(owner.clone());
            flat.push(item);
        }
    }
    load(s, target, &mut flat, nested)?;
    for (owner, item) in owners.into_iter().zip(flat) {
        grouped.entry(owner).or_default().push(item);
    }
    Ok(())
}

fn load_counts(
    s: &Session<'_>,
    schema: &EntitySchema,
    records: &mut [Record],
    ids: &[String],
    relations: &[String],
) -> Result<()> {
    let mut counts: Vec<Map<String, Value>> = vec![Map::new(); records.len()];
    for name in relations {
        let rel = relation(schema, name)?;
        let (owner, from) = match rel.kind {
            RelationKind::HasMany { foreign_field } => {
                let target = rel.target_schema();
                (
                    col(ROOT, field(target, foreign_field)?.column),
                    format!("{} AS {}", quote(target.table), ROOT),
                )
            }
            RelationKind::ManyToMany {
                join_table,
                self_column,
                ..
            } => (col(ROOT, self_column), format!("{} AS {}", quote(join_table), ROOT)),
            RelationKind::BelongsTo { .. } => continue,
        };

        let mut w = SqlWriter::new();
        let id_set = w.bind_id_set(ids);
        let sql = format!(
            "SELECT {owner}, COUNT(*) FROM {from} WHERE {owner} IN {id_set} GROUP BY {owner}"
        );
        let totals: HashMap<String, i64> = s
            .query(&sql, w.params(), |row| {
                Ok((
                    row.get::<_, String>(0).map_err(from_rusqlite)?,
                    row.get::<_, i64>(1).map_err(from_rusqlite)?,
                ))
            })?
            .into_iter()
            .collect();

        for (slot, id) in counts.iter_mut().zip(ids) {
            slot.insert(name.clone(), Value::from(totals.get(id).copied().unwrap_or(0)));
        }
    }
    for (record, slot) in records.iter_mut().zip(counts) {
        record.insert("_count".to_string(), Value::Object(slot));
    }
    Ok(())
}
