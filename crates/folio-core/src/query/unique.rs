//! Unique record selectors

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Selects at most one row through the primary key or a declared-unique field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unique {
    pub field: String,
    pub value: Value,
}

impl Unique {
    /// Select by primary key
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            field: "id".to_string(),
            value: Value::String(id.into()),
        }
    }

    /// Select by any unique field, e.g. `Unique::by("email", "a@x.com")`
    pub fn by(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}
