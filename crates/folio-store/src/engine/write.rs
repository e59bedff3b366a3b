//! Writes: create, update, upsert, delete and their bulk forms
//!
//! Payloads are JSON objects keyed by API field names. Scalar keys are
//! written to the entity's own row; relation keys carry nested writes that
//! run in the same atomic unit as the parent write.

use chrono::DateTime;
use folio_core::errors::{ExError, ExErrorKind, QueryError};
use folio_core::model::schema::{
    entities, EntitySchema, FieldDefault, OnDelete, RelationDef, RelationKind,
};
use folio_core::query::{Filter, NestedMany, NestedOne, Unique};
use folio_core::rules::validation::{
    check_exclusive, nested_action_allowed, validate_payload, validate_unique, WriteMode,
};
use rusqlite::types::Value as SqlValue;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::read::{count, find_by_ids, find_by_unique, matching_ids};
use super::{record_id, Record, Session};
use crate::config::UserDeletePolicy;
use crate::errors::{internal, Result};
use crate::sql::value::{millis_to_rfc3339, now_millis, to_sql};
use crate::sql::{field, quote};

type Relations = Vec<(&'static RelationDef, Value)>;

fn split(schema: &EntitySchema, payload: Map<String, Value>) -> (Record, Relations) {
    let mut scalars = Map::new();
    let mut relations = Vec::new();
    for (key, value) in payload {
        match schema.relation(&key) {
            Some(rel) => relations.push((rel, value)),
            None => {
                scalars.insert(key, value);
            }
        }
    }
    (scalars, relations)
}

fn parse_nested<T: DeserializeOwned>(
    schema: &EntitySchema,
    rel: &RelationDef,
    value: Value,
) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        ExError::new(ExErrorKind::Validation)
            .with_entity(schema.name)
            .with_field(rel.name)
            .with_message(format!("malformed nested write on '{}': {}", rel.name, e))
    })
}

fn missing(schema: &EntitySchema, unique: &Unique) -> ExError {
    ExError::not_found(
        schema.name,
        format!("no {} with {} = {}", schema.name, unique.field, unique.value),
    )
    .with_field(unique.field.clone())
}

/// Find the row `unique` selects or fail with NotFound
fn resolve(s: &Session<'_>, schema: &EntitySchema, unique: &Unique) -> Result<Record> {
    validate_unique(schema, unique)?;
    find_by_unique(s, schema, unique)?.ok_or_else(|| missing(schema, unique))
}

fn exists(s: &Session<'_>, schema: &EntitySchema, id: &str) -> Result<bool> {
    Ok(find_by_unique(s, schema, &Unique::id(id))?.is_some())
}

fn reject_relations(schema: &EntitySchema, payload: &Map<String, Value>, op: &str) -> Result<()> {
    match payload.keys().find(|k| schema.relation(k).is_some()) {
        Some(key) => Err(QueryError::NestedWriteNotAllowed {
            relation: key.clone(),
            op: op.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}

// ========== to-one resolution and checks ==========

/// Turn `relation: { connect }` into the foreign key value
fn connect_parents(s: &Session<'_>, schema: &EntitySchema, scalars: &mut Record, relations: &Relations) -> Result<()> {
    for (rel, value) in relations {
        if let RelationKind::BelongsTo { field: fk, .. } = rel.kind {
            let nested: NestedOne = parse_nested(schema, rel, value.clone())?;
            let parent = resolve(s, rel.target_schema(), &nested.connect)
                .map_err(|e| e.with_op("connect"))?;
            scalars.insert(fk.to_string(), Value::String(record_id(&parent)?));
        }
    }
    Ok(())
}

/// Foreign keys must point at existing rows
fn check_references(s: &Session<'_>, schema: &EntitySchema, scalars: &Record) -> Result<()> {
    for rel in schema.relations {
        let RelationKind::BelongsTo { field: fk, .. } = rel.kind else {
            continue;
        };
        if let Some(Value::String(id)) = scalars.get(fk) {
            let target = rel.target_schema();
            if !exists(s, target, id)? {
                return Err(ExError::new(ExErrorKind::Conflict)
                    .with_entity(schema.name)
                    .with_field(fk)
                    .with_message(format!("{} references missing {} '{}'", fk, target.name, id)));
            }
        }
    }
    Ok(())
}

fn apply_defaults(schema: &EntitySchema, scalars: &mut Record) -> Result<()> {
    let now = millis_to_rfc3339(now_millis())?;
    for f in schema.fields {
        if scalars.contains_key(f.name) {
            continue;
        }
        let value = match f.default {
            FieldDefault::None => continue,
            FieldDefault::Uuid => Value::String(Uuid::now_v7().to_string()),
            FieldDefault::Now => Value::String(now.clone()),
            FieldDefault::Text(text) => Value::String(text.to_string()),
            FieldDefault::Bool(flag) => Value::Bool(flag),
        };
        scalars.insert(f.name.to_string(), value);
    }
    Ok(())
}

/// Advance every touch-on-update timestamp past its previous value
fn touch(schema: &EntitySchema, current: &Record, scalars: &mut Record) -> Result<()> {
    for f in schema.fields.iter().filter(|f| f.touch_on_update) {
        if scalars.contains_key(f.name) {
            continue;
        }
        let previous = current
            .get(f.name)
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.timestamp_millis());
        let now = now_millis();
        let next = previous.map_or(now, |p| now.max(p + 1));
        scalars.insert(f.name.to_string(), Value::String(millis_to_rfc3339(next)?));
    }
    Ok(())
}

// ========== row statements ==========

fn insert_row(s: &Session<'_>, schema: &EntitySchema, scalars: &Record, skip_duplicates: bool) -> Result<usize> {
    let mut columns = Vec::new();
    let mut params = Vec::new();
    for f in schema.fields {
        if let Some(value) = scalars.get(f.name) {
            columns.push(quote(f.column));
            params.push(to_sql(f, value)?);
        }
    }
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}){}",
        quote(schema.table),
        columns.join(", "),
        vec!["?"; columns.len()].join(", "),
        if skip_duplicates { " ON CONFLICT DO NOTHING" } else { "" }
    );
    s.execute(&sql, &params)
}

fn update_row(s: &Session<'_>, schema: &EntitySchema, id: &str, scalars: &Record) -> Result<usize> {
    let mut sets = Vec::new();
    let mut params = Vec::new();
    for f in schema.fields {
        if let Some(value) = scalars.get(f.name) {
            sets.push(format!("{} = ?", quote(f.column)));
            params.push(to_sql(f, value)?);
        }
    }
    if sets.is_empty() {
        return Ok(0);
    }
    params.push(SqlValue::Text(id.to_string()));
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote(schema.table),
        sets.join(", "),
        quote(schema.primary().column)
    );
    s.execute(&sql, &params)
}

fn link(s: &Session<'_>, join_table: &str, self_column: &str, target_column: &str, owner: &str, target: &str) -> Result<()> {
    let sql = format!(
        "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?, ?)",
        quote(join_table),
        quote(self_column),
        quote(target_column)
    );
    s.execute(&sql, &[SqlValue::Text(owner.to_string()), SqlValue::Text(target.to_string())])?;
    Ok(())
}

// ========== create ==========

/// Insert one row plus its nested writes; `None` when skipped as a duplicate
fn create_record(
    s: &Session<'_>,
    schema: &EntitySchema,
    payload: Map<String, Value>,
    skip_duplicates: bool,
) -> Result<Option<String>> {
    validate_payload(schema, &payload, WriteMode::Create)?;
    let (mut scalars, relations) = split(schema, payload);
    connect_parents(s, schema, &mut scalars, &relations)?;
    apply_defaults(schema, &mut scalars)?;
    check_references(s, schema, &scalars)?;

    if insert_row(s, schema, &scalars, skip_duplicates)? == 0 {
        return Ok(None);
    }
    let id = record_id(&scalars)?;
    write_relations(s, schema, &id, relations, WriteMode::Create)?;
    Ok(Some(id))
}

fn reread(s: &Session<'_>, schema: &EntitySchema, id: &str) -> Result<Record> {
    find_by_unique(s, schema, &Unique::id(id))?
        .ok_or_else(|| internal(format!("{} '{}' vanished after write", schema.name, id)))
}

/// Read back rows in the order their ids are given
pub fn reread_all(s: &Session<'_>, schema: &EntitySchema, ids: &[String]) -> Result<Vec<Record>> {
    let mut found = find_by_ids(s, schema, ids)?;
    let mut ordered = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(pos) = found
            .iter()
            .position(|r| r.get("id").and_then(Value::as_str) == Some(id.as_str()))
        {
            ordered.push(found.swap_remove(pos));
        }
    }
    Ok(ordered)
}

pub fn create(s: &Session<'_>, schema: &EntitySchema, payload: Map<String, Value>) -> Result<Record> {
    let id = create_record(s, schema, payload, false)?
        .ok_or_else(|| internal("insert without duplicate skipping wrote no row"))?;
    reread(s, schema, &id)
}

/// Insert every item; returns the ids actually written
pub fn create_many(
    s: &Session<'_>,
    schema: &EntitySchema,
    items: Vec<Map<String, Value>>,
    skip_duplicates: bool,
) -> Result<Vec<String>> {
    for item in &items {
        reject_relations(schema, item, "createMany")?;
    }
    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        if let Some(id) = create_record(s, schema, item, skip_duplicates)? {
            ids.push(id);
        }
    }
    Ok(ids)
}

// ========== update ==========

/// Apply a patch to an existing row; returns its (possibly new) id
fn update_record(
    s: &Session<'_>,
    schema: &EntitySchema,
    current: &Record,
    payload: Map<String, Value>,
) -> Result<String> {
    validate_payload(schema, &payload, WriteMode::Update)?;
    let id = record_id(current)?;
    let (mut scalars, relations) = split(schema, payload);
    connect_parents(s, schema, &mut scalars, &relations)?;

    let mut merged = current.clone();
    merged.extend(scalars.iter().map(|(k, v)| (k.clone(), v.clone())));
    check_exclusive(schema, &merged)?;
    check_references(s, schema, &scalars)?;
    touch(schema, current, &mut scalars)?;

    update_row(s, schema, &id, &scalars)?;
    let new_id = match scalars.get("id") {
        Some(Value::String(new_id)) => new_id.clone(),
        _ => id,
    };
    write_relations(s, schema, &new_id, relations, WriteMode::Update)?;
    Ok(new_id)
}

pub fn update(
    s: &Session<'_>,
    schema: &EntitySchema,
    unique: &Unique,
    payload: Map<String, Value>,
) -> Result<Record> {
    let current = resolve(s, schema, unique)?;
    let id = update_record(s, schema, &current, payload)?;
    reread(s, schema, &id)
}

/// Patch every row matching `filter` (at most `limit`); returns their ids
pub fn update_many(
    s: &Session<'_>,
    schema: &EntitySchema,
    filter: Option<&Filter>,
    payload: Map<String, Value>,
    limit: Option<u64>,
) -> Result<Vec<String>> {
    reject_relations(schema, &payload, "updateMany")?;
    validate_payload(schema, &payload, WriteMode::Update)?;
    let ids = matching_ids(s, schema, filter, limit)?;
    let mut updated = Vec::with_capacity(ids.len());
    for id in ids {
        let current = reread(s, schema, &id)?;
        updated.push(update_record(s, schema, &current, payload.clone())?);
    }
    Ok(updated)
}

pub fn upsert(
    s: &Session<'_>,
    schema: &EntitySchema,
    unique: &Unique,
    create_payload: Map<String, Value>,
    update_payload: Map<String, Value>,
) -> Result<Record> {
    validate_unique(schema, unique)?;
    match find_by_unique(s, schema, unique)? {
        Some(current) => {
            let id = update_record(s, schema, &current, update_payload)?;
            reread(s, schema, &id)
        }
        None => create(s, schema, create_payload),
    }
}

// ========== delete ==========

/// Delete one row, resolving every relation that points at it first
pub fn delete_record(s: &Session<'_>, schema: &EntitySchema, id: &str) -> Result<()> {
    for child in entities() {
        for rel in child.relations {
            let RelationKind::BelongsTo { field: fk, on_delete } = rel.kind else {
                continue;
            };
            if rel.target != schema.name {
                continue;
            }
            let policy = match on_delete {
                OnDelete::UserPolicy => match s.context().user_delete {
                    UserDeletePolicy::Restrict => OnDelete::Restrict,
                    UserDeletePolicy::Cascade => OnDelete::Cascade,
                },
                other => other,
            };
            let dependents = Filter::eq(fk, id);
            match policy {
                OnDelete::Cascade => {
                    for child_id in matching_ids(s, child, Some(&dependents), None)? {
                        delete_record(s, child, &child_id)?;
                    }
                }
                OnDelete::SetNull => {
                    let sql = format!(
                        "UPDATE {} SET {} = NULL WHERE {} = ?",
                        quote(child.table),
                        quote(field(child, fk)?.column),
                        quote(field(child, fk)?.column)
                    );
                    s.execute(&sql, &[SqlValue::Text(id.to_string())])?;
                }
                OnDelete::Restrict | OnDelete::UserPolicy => {
                    let n = count(s, child, Some(&dependents))?;
                    if n > 0 {
                        let via = schema
                            .relations
                            .iter()
                            .find(|r| {
                                matches!(r.kind, RelationKind::HasMany { foreign_field } if foreign_field == fk)
                                    && r.target == child.name
                            })
                            .map_or(fk, |r| r.name);
                        return Err(ExError::new(ExErrorKind::Conflict)
                            .with_entity(schema.name)
                            .with_record_id(id)
                            .with_field(via)
                            .with_message(format!(
                                "{} '{}' still has {} dependent {} row(s)",
                                schema.name, id, n, child.name
                            )));
                    }
                }
            }
        }
    }

    for rel in schema.relations {
        if let RelationKind::ManyToMany {
            join_table,
            self_column,
            ..
        } = rel.kind
        {
            let sql = format!("DELETE FROM {} WHERE {} = ?", quote(join_table), quote(self_column));
            s.execute(&sql, &[SqlValue::Text(id.to_string())])?;
        }
    }

    let sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        quote(schema.table),
        quote(schema.primary().column)
    );
    s.execute(&sql, &[SqlValue::Text(id.to_string())])?;
    Ok(())
}

pub fn delete(s: &Session<'_>, schema: &EntitySchema, unique: &Unique) -> Result<Record> {
    let current = resolve(s, schema, unique)?;
    delete_record(s, schema, &record_id(&current)?)?;
    Ok(current)
}

pub fn delete_many(
    s: &Session<'_>,
    schema: &EntitySchema,
    filter: Option<&Filter>,
    limit: Option<u64>,
) -> Result<u64> {
    let ids = matching_ids(s, schema, filter, limit)?;
    for id in &ids {
        delete_record(s, schema, id)?;
    }
    Ok(ids.len() as u64)
}

// ========== nested to-many writes ==========

fn actions<C>(nested: &NestedMany<C>) -> Vec<&'static str> {
    let mut out = Vec::new();
    if nested.set.is_some() {
        out.push("set");
    }
    if !nested.disconnect.is_empty() {
        out.push("disconnect");
    }
    if !nested.delete.is_empty() {
        out.push("delete");
    }
    if !nested.create.is_empty() {
        out.push("create");
    }
    if !nested.connect.is_empty() {
        out.push("connect");
    }
    if !nested.connect_or_create.is_empty() {
        out.push("connectOrCreate");
    }
    out
}

fn check_actions<C>(
    schema: &EntitySchema,
    rel: &RelationDef,
    nested: &NestedMany<C>,
    mode: WriteMode,
    fk_nullable: bool,
) -> Result<()> {
    for action in actions(nested) {
        let update_only = matches!(action, "disconnect" | "delete" | "set");
        if (mode == WriteMode::Create && update_only)
            || !nested_action_allowed(&rel.kind, action, fk_nullable)
        {
            return Err(QueryError::UnsupportedNestedWrite {
                entity: schema.name.to_string(),
                relation: rel.name.to_string(),
                action: action.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

fn write_relations(
    s: &Session<'_>,
    schema: &EntitySchema,
    owner: &str,
    relations: Relations,
    mode: WriteMode,
) -> Result<()> {
    for (rel, value) in relations {
        match rel.kind {
            // Resolved into the foreign key before the row was written
            RelationKind::BelongsTo { .. } => {}
            RelationKind::HasMany { foreign_field } => {
                let nested: NestedMany<Map<String, Value>> = parse_nested(schema, rel, value)?;
                let target = rel.target_schema();
                let fk_nullable = field(target, foreign_field)?.nullable;
                check_actions(schema, rel, &nested, mode, fk_nullable)?;
                write_children(s, target, foreign_field, owner, nested)?;
            }
            RelationKind::ManyToMany {
                join_table,
                self_column,
                target_column,
            } => {
                let nested: NestedMany<Map<String, Value>> = parse_nested(schema, rel, value)?;
                check_actions(schema, rel, &nested, mode, false)?;
                let links = Links {
                    join_table,
                    self_column,
                    target_column,
                    owner,
                };
                write_links(s, rel.target_schema(), &links, nested)?;
            }
        }
    }
    Ok(())
}

/// Owned children: the child row holds `fk` pointing at `owner`
fn write_children(
    s: &Session<'_>,
    target: &EntitySchema,
    fk: &str,
    owner: &str,
    nested: NestedMany<Map<String, Value>>,
) -> Result<()> {
    let owns = |child: &Record| child.get(fk).and_then(Value::as_str) == Some(owner);

    for selector in &nested.disconnect {
        let child = resolve(s, target, selector)?;
        if !owns(&child) {
            return Err(missing(target, selector).with_op("disconnect"));
        }
        let mut patch = Map::new();
        patch.insert(fk.to_string(), Value::Null);
        update_record(s, target, &child, patch)?;
    }
    for selector in &nested.delete {
        let child = resolve(s, target, selector)?;
        if !owns(&child) {
            return Err(missing(target, selector).with_op("delete"));
        }
        delete_record(s, target, &record_id(&child)?)?;
    }
    for mut item in nested.create {
        item.insert(fk.to_string(), Value::String(owner.to_string()));
        create_record(s, target, item, false)?;
    }
    for selector in &nested.connect {
        let child = resolve(s, target, selector).map_err(|e| e.with_op("connect"))?;
        let mut patch = Map::new();
        patch.insert(fk.to_string(), Value::String(owner.to_string()));
        update_record(s, target, &child, patch)?;
    }
    Ok(())
}

struct Links<'a> {
    join_table: &'a str,
    self_column: &'a str,
    target_column: &'a str,
    owner: &'a str,
}

impl Links<'_> {
    fn add(&self, s: &Session<'_>, target: &str) -> Result<()> {
        link(s, self.join_table, self.self_column, self.target_column, self.owner, target)
    }

    fn remove(&self, s: &Session<'_>, target: &str) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ? AND {} = ?",
            quote(self.join_table),
            quote(self.self_column),
            quote(self.target_column)
        );
        s.execute(
            &sql,
            &[SqlValue::Text(self.owner.to_string()), SqlValue::Text(target.to_string())],
        )?;
        Ok(())
    }

    fn clear(&self, s: &Session<'_>) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote(self.join_table),
            quote(self.self_column)
        );
        s.execute(&sql, &[SqlValue::Text(self.owner.to_string())])?;
        Ok(())
    }
}

/// Many-to-many links through a join table
fn write_links(
    s: &Session<'_>,
    target: &EntitySchema,
    links: &Links<'_>,
    nested: NestedMany<Map<String, Value>>,
) -> Result<()> {
    if let Some(selectors) = &nested.set {
        links.clear(s)?;
        for selector in selectors {
            let row = resolve(s, target, selector).map_err(|e| e.with_op("set"))?;
            links.add(s, &record_id(&row)?)?;
        }
    }
    for selector in &nested.disconnect {
        let row = resolve(s, target, selector).map_err(|e| e.with_op("disconnect"))?;
        links.remove(s, &record_id(&row)?)?;
    }
    for item in nested.create {
        if let Some(id) = create_record(s, target, item, false)? {
            links.add(s, &id)?;
        }
    }
    for selector in &nested.connect {
        let row = resolve(s, target, selector).map_err(|e| e.with_op("connect"))?;
        links.add(s, &record_id(&row)?)?;
    }
    for entry in nested.connect_or_create {
        validate_unique(target, &entry.selector)?;
        let id = match find_by_unique(s, target, &entry.selector)? {
            Some(row) => record_id(&row)?,
            None => create_record(s, target, entry.create, false)?
                .ok_or_else(|| internal("connectOrCreate wrote no row"))?,
        };
        links.add(s, &id)?;
    }
    Ok(())
}
