//! SQL generation
//!
//! Query trees are compiled into SQLite statements with positional `?`
//! parameters. A `SqlWriter` accumulates parameters in text order and hands
//! out table aliases (`t0` is always the root entity).

mod filter;
mod order;
pub mod value;

use folio_core::errors::QueryError;
use folio_core::model::schema::{EntitySchema, FieldDef, RelationDef};
use rusqlite::types::Value as SqlValue;

use crate::errors::Result;

pub(crate) use filter::conjoin;
pub use order::order_terms;

/// Alias of the root table in every generated statement
pub const ROOT: &str = "t0";

/// Double-quote an identifier
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `alias."column"`
pub fn col(alias: &str, column: &str) -> String {
    format!("{}.{}", alias, quote(column))
}

/// Every scalar column of `schema`, in declaration order
pub fn select_list(schema: &EntitySchema, alias: &str) -> String {
    schema
        .fields
        .iter()
        .map(|f| col(alias, f.column))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn field(schema: &EntitySchema, name: &str) -> Result<&'static FieldDef> {
    schema.field(name).ok_or_else(|| {
        QueryError::UnknownField {
            entity: schema.name.to_string(),
            field: name.to_string(),
        }
        .into()
    })
}

pub(crate) fn relation(schema: &EntitySchema, name: &str) -> Result<&'static RelationDef> {
    schema.relation(name).ok_or_else(|| {
        QueryError::UnknownRelation {
            entity: schema.name.to_string(),
            relation: name.to_string(),
        }
        .into()
    })
}

/// Parameter and alias accumulator for one statement
#[derive(Debug)]
pub struct SqlWriter {
    params: Vec<SqlValue>,
    aliases: usize,
}

impl Default for SqlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlWriter {
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            aliases: 1,
        }
    }

    /// A fresh alias with the given prefix (`t1`, `j2`, ...)
    pub fn next_alias(&mut self, prefix: &str) -> String {
        let alias = format!("{}{}", prefix, self.aliases);
        self.aliases += 1;
        alias
    }

    /// Queue a parameter and return its placeholder
    pub fn bind(&mut self, value: SqlValue) -> &'static str {
        self.params.push(value);
        "?"
    }

    /// Bind `ids` as one JSON array parameter and return a subquery over it
    ///
    /// The statement carries a single parameter however many ids there are,
    /// so large parent sets stay under SQLite's variable limit.
    pub fn bind_id_set(&mut self, ids: &[String]) -> String {
        let array = serde_json::Value::from(ids.to_vec()).to_string();
        format!(
            "(SELECT value FROM json_each({}))",
            self.bind(SqlValue::Text(array))
        )
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn into_params(self) -> Vec<SqlValue> {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::model::schema::TAG;

    #[test]
    fn test_id_set_binds_one_parameter() {
        let ids: Vec<String> = (0..40_000).map(|i| format!("id-{i}")).collect();
        let mut w = SqlWriter::new();

        let subquery = w.bind_id_set(&ids);

        assert_eq!(subquery, "(SELECT value FROM json_each(?))");
        assert_eq!(w.params().len(), 1);
        let SqlValue::Text(array) = &w.params()[0] else {
            panic!("id set should bind as text");
        };
        let decoded: Vec<String> = serde_json::from_str(array).unwrap();
        assert_eq!(decoded, ids);
    }

    #[test]
    fn test_quote_escapes_embedded_quotes() {
        assert_eq!(quote("order"), "\"order\"");
        assert_eq!(quote("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_select_list_follows_schema() {
        assert_eq!(
            select_list(&TAG, ROOT),
            "t0.\"id\", t0.\"name\", t0.\"created_at\", t0.\"updated_at\""
        );
    }

    #[test]
    fn test_aliases_are_fresh() {
        let mut w = SqlWriter::new();
        assert_eq!(w.next_alias("t"), "t1");
        assert_eq!(w.next_alias("j"), "j2");
    }
}
