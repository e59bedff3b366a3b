//! `where` compilation

use folio_core::model::schema::{EntitySchema, RelationKind};
use folio_core::query::{Condition, Filter, QueryMode};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use super::value::to_sql;
use super::{col, field, quote, relation, SqlWriter};
use crate::errors::Result;

/// Escape `%`, `_` and the escape character itself for `LIKE ... ESCAPE '\'`
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn fold(value: &Value, insensitive: bool) -> Value {
    match value {
        Value::String(s) if insensitive => Value::String(s.to_lowercase()),
        other => other.clone(),
    }
}

/// Join compiled parts with `op`; `empty` stands in for no parts
pub(crate) fn conjoin(parts: Vec<String>, op: &str, empty: &str) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    parts
        .into_iter()
        .map(|p| format!("({})", p))
        .collect::<Vec<_>>()
        .join(op)
}

impl SqlWriter {
    /// Compile one condition against an arbitrary SQL expression
    ///
    /// `encode` converts each operand to its storage form.
    pub fn condition(
        &mut self,
        expr: &str,
        condition: &Condition,
        mode: QueryMode,
        encode: &dyn Fn(&Value) -> Result<SqlValue>,
    ) -> Result<String> {
        let insensitive = mode == QueryMode::Insensitive;
        let expr = if insensitive {
            format!("{}({})", crate::db::FOLD_FUNCTION, expr)
        } else {
            expr.to_string()
        };

        let sql = match condition {
            Condition::Equals(Value::Null) => format!("{} IS NULL", expr),
            Condition::NotEquals(Value::Null) => format!("{} IS NOT NULL", expr),
            Condition::Equals(v) => format!("{} = {}", expr, self.bind(encode(&fold(v, insensitive))?)),
            Condition::NotEquals(v) => {
                format!("{} <> {}", expr, self.bind(encode(&fold(v, insensitive))?))
            }
            Condition::Lt(v) => format!("{} < {}", expr, self.bind(encode(&fold(v, insensitive))?)),
            Condition::Lte(v) => format!("{} <= {}", expr, self.bind(encode(&fold(v, insensitive))?)),
            Condition::Gt(v) => format!("{} > {}", expr, self.bind(encode(&fold(v, insensitive))?)),
            Condition::Gte(v) => format!("{} >= {}", expr, self.bind(encode(&fold(v, insensitive))?)),
            Condition::In(values) | Condition::NotIn(values) if values.is_empty() => {
                // in [] matches nothing, notIn [] matches everything
                if matches!(condition, Condition::In(_)) { "0" } else { "1" }.to_string()
            }
            Condition::In(values) | Condition::NotIn(values) => {
                let mut placeholders = Vec::with_capacity(values.len());
                for v in values {
                    placeholders.push(self.bind(encode(&fold(v, insensitive))?));
                }
                let op = if matches!(condition, Condition::In(_)) { "IN" } else { "NOT IN" };
                format!("{} {} ({})", expr, op, placeholders.join(", "))
            }
            Condition::Contains(s) | Condition::StartsWith(s) | Condition::EndsWith(s) => {
                let needle = escape_like(&if insensitive { s.to_lowercase() } else { s.clone() });
                let pattern = match condition {
                    Condition::Contains(_) => format!("%{}%", needle),
                    Condition::StartsWith(_) => format!("{}%", needle),
                    _ => format!("%{}", needle),
                };
                format!("{} LIKE {} ESCAPE '\\'", expr, self.bind(SqlValue::Text(pattern)))
            }
        };
        Ok(sql)
    }

    /// Compile a filter tree rooted at `alias`, a row of `schema`
    pub fn filter(&mut self, schema: &EntitySchema, alias: &str, filter: &Filter) -> Result<String> {
        match filter {
            Filter::Field(f) => {
                let def = field(schema, &f.field)?;
                self.condition(&col(alias, def.column), &f.condition, f.mode, &|v| {
                    to_sql(def, v)
                })
            }
            Filter::And(parts) => {
                let compiled = parts
                    .iter()
                    .map(|p| self.filter(schema, alias, p))
                    .collect::<Result<Vec<_>>>()?;
                Ok(conjoin(compiled, " AND ", "1"))
            }
            Filter::Or(parts) => {
                let compiled = parts
                    .iter()
                    .map(|p| self.filter(schema, alias, p))
                    .collect::<Result<Vec<_>>>()?;
                Ok(conjoin(compiled, " OR ", "0"))
            }
            Filter::Not(inner) => Ok(format!("NOT ({})", self.filter(schema, alias, inner)?)),
            Filter::Some { relation, filter } => {
                let sub = self.related(schema, alias, relation, |w, target, t| {
                    w.filter(target, t, filter)
                })?;
                Ok(format!("EXISTS ({})", sub))
            }
            Filter::None { relation, filter } => {
                let sub = self.related(schema, alias, relation, |w, target, t| {
                    w.filter(target, t, filter)
                })?;
                Ok(format!("NOT EXISTS ({})", sub))
            }
            Filter::Every { relation, filter } => {
                // No related row fails the filter; NULL counts as failing
                let sub = self.related(schema, alias, relation, |w, target, t| {
                    Ok(format!("NOT COALESCE(({}), 0)", w.filter(target, t, filter)?))
                })?;
                Ok(format!("NOT EXISTS ({})", sub))
            }
            Filter::Is { relation, filter: None } => {
                Ok(format!("{} IS NULL", self.foreign_key(schema, alias, relation)?))
            }
            Filter::IsNot { relation, filter: None } => {
                Ok(format!("{} IS NOT NULL", self.foreign_key(schema, alias, relation)?))
            }
            Filter::Is { relation, filter: Some(inner) } => {
                let sub = self.related(schema, alias, relation, |w, target, t| {
                    w.filter(target, t, inner)
                })?;
                Ok(format!("EXISTS ({})", sub))
            }
            Filter::IsNot { relation, filter: Some(inner) } => {
                let sub = self.related(schema, alias, relation, |w, target, t| {
                    w.filter(target, t, inner)
                })?;
                Ok(format!("NOT EXISTS ({})", sub))
            }
        }
    }

    fn foreign_key(&self, schema: &EntitySchema, alias: &str, name: &str) -> Result<String> {
        let rel = relation(schema, name)?;
        match rel.kind {
            RelationKind::BelongsTo { field: fk, .. } => Ok(col(alias, field(schema, fk)?.column)),
            _ => Err(folio_core::errors::QueryError::RelationMisuse {
                entity: schema.name.to_string(),
                relation: name.to_string(),
                usage: "is/isNot".to_string(),
            }
            .into()),
        }
    }

    /// `SELECT 1 FROM <related rows of alias> WHERE <cond>`
    fn related(
        &mut self,
        schema: &EntitySchema,
        alias: &str,
        name: &str,
        cond: impl FnOnce(&mut Self, &EntitySchema, &str) -> Result<String>,
    ) -> Result<String> {
        let rel = relation(schema, name)?;
        let target = rel.target_schema();
        let t = self.next_alias("t");
        let target_pk = col(&t, target.primary().column);

        let (from, link) = match rel.kind {
            RelationKind::BelongsTo { field: fk, .. } => (
                format!("{} AS {}", quote(target.table), t),
                format!("{} = {}", target_pk, col(alias, field(schema, fk)?.column)),
            ),
            RelationKind::HasMany { foreign_field } => (
                format!("{} AS {}", quote(target.table), t),
                format!(
                    "{} = {}",
                    col(&t, field(target, foreign_field)?.column),
                    col(alias, schema.primary().column)
                ),
            ),
            RelationKind::ManyToMany {
                join_table,
                self_column,
                target_column,
            } => {
                let j = self.next_alias("j");
                (
                    format!(
                        "{} AS {} JOIN {} AS {} ON {} = {}",
                        quote(join_table),
                        j,
                        quote(target.table),
                        t,
                        target_pk,
                        col(&j, target_column)
                    ),
                    format!("{} = {}", col(&j, self_column), col(alias, schema.primary().column)),
                )
            }
        };

        let condition = cond(self, target, &t)?;
        Ok(format!("SELECT 1 FROM {} WHERE {} AND ({})", from, link, condition))
    }
}
