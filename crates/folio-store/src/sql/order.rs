//! `orderBy` and cursor compilation

use folio_core::model::schema::EntitySchema;
use folio_core::query::{OrderBy, SortOrder};
use serde_json::{Map, Value};

use super::value::to_sql;
use super::{col, field, SqlWriter};
use crate::errors::Result;

fn nulls_sql(order: &OrderBy) -> &'static str {
    if order.nulls_come_first() {
        "NULLS FIRST"
    } else {
        "NULLS LAST"
    }
}

/// Comma-separated ordering terms, NULL placement always explicit
pub fn order_terms(schema: &EntitySchema, alias: &str, orders: &[OrderBy]) -> Result<String> {
    let terms = orders
        .iter()
        .map(|o| {
            let def = field(schema, &o.field)?;
            Ok(format!(
                "{} {} {}",
                col(alias, def.column),
                o.direction.sql(),
                nulls_sql(o)
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(terms.join(", "))
}

impl SqlWriter {
    /// Rows at or after `cursor` in `orders`
    ///
    /// Lexicographic over the ordering keys: a row qualifies when it equals
    /// the cursor on a prefix of keys and sorts strictly after it on the
    /// next, or equals it on every key.
    pub fn cursor_predicate(
        &mut self,
        schema: &EntitySchema,
        alias: &str,
        orders: &[OrderBy],
        cursor: &Map<String, Value>,
    ) -> Result<String> {
        let mut disjuncts = Vec::with_capacity(orders.len() + 1);
        for (k, order) in orders.iter().enumerate() {
            let mut parts = Vec::with_capacity(k + 1);
            for prefix in &orders[..k] {
                parts.push(self.cursor_equal(schema, alias, prefix, cursor)?);
            }
            match self.cursor_after(schema, alias, order, cursor)? {
                Some(after) => parts.push(after),
                // Nothing sorts after the cursor value on this key
                None => continue,
            }
            disjuncts.push(parts.join(" AND "));
        }

        let mut equal = Vec::with_capacity(orders.len());
        for order in orders {
            equal.push(self.cursor_equal(schema, alias, order, cursor)?);
        }
        disjuncts.push(if equal.is_empty() {
            "1".to_string()
        } else {
            equal.join(" AND ")
        });

        Ok(disjuncts
            .into_iter()
            .map(|d| format!("({})", d))
            .collect::<Vec<_>>()
            .join(" OR "))
    }

    fn cursor_equal(
        &mut self,
        schema: &EntitySchema,
        alias: &str,
        order: &OrderBy,
        cursor: &Map<String, Value>,
    ) -> Result<String> {
        let def = field(schema, &order.field)?;
        let value = cursor.get(def.name).unwrap_or(&Value::Null);
        let placeholder = self.bind(to_sql(def, value)?);
        Ok(format!("{} IS {}", col(alias, def.column), placeholder))
    }

    fn cursor_after(
        &mut self,
        schema: &EntitySchema,
        alias: &str,
        order: &OrderBy,
        cursor: &Map<String, Value>,
    ) -> Result<Option<String>> {
        let def = field(schema, &order.field)?;
        let expr = col(alias, def.column);
        let value = cursor.get(def.name).unwrap_or(&Value::Null);

        if value.is_null() {
            return Ok(order
                .nulls_come_first()
                .then(|| format!("{} IS NOT NULL", expr)));
        }

        let op = match order.direction {
            SortOrder::Asc => ">",
            SortOrder::Desc => "<",
        };
        let placeholder = self.bind(to_sql(def, value)?);
        Ok(Some(if order.nulls_come_first() {
            format!("{} {} {}", expr, op, placeholder)
        } else {
            format!("({} {} {} OR {} IS NULL)", expr, op, placeholder, expr)
        }))
    }
}
