//! Nested relation writes carried inside create/update payloads

use serde::{Deserialize, Serialize};

use super::unique::Unique;

/// Link to an existing row matched by `selector`, or create it from `create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectOrCreate<C> {
    #[serde(rename = "where")]
    pub selector: Unique,
    pub create: C,
}

/// Writes against a to-many relation
///
/// Which actions apply depends on the relation: owned children accept
/// `create`, `connect`, `disconnect` (nullable foreign keys only) and
/// `delete`; many-to-many links accept `create`, `connect`,
/// `connect_or_create`, `disconnect` and `set`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedMany<C> {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub create: Vec<C>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connect: Vec<Unique>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connect_or_create: Vec<ConnectOrCreate<C>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disconnect: Vec<Unique>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<Unique>,
    /// Replace the full link set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<Vec<Unique>>,
}

impl<C> Default for NestedMany<C> {
    fn default() -> Self {
        Self {
            create: Vec::new(),
            connect: Vec::new(),
            connect_or_create: Vec::new(),
            disconnect: Vec::new(),
            delete: Vec::new(),
            set: None,
        }
    }
}

impl<C> NestedMany<C> {
    pub fn create(items: impl IntoIterator<Item = C>) -> Self {
        Self {
            create: items.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn connect(selectors: impl IntoIterator<Item = Unique>) -> Self {
        Self {
            connect: selectors.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn set(selectors: impl IntoIterator<Item = Unique>) -> Self {
        Self {
            set: Some(selectors.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn and_create(mut self, item: C) -> Self {
        self.create.push(item);
        self
    }

    pub fn and_connect(mut self, selector: Unique) -> Self {
        self.connect.push(selector);
        self
    }

    pub fn and_connect_or_create(mut self, selector: Unique, create: C) -> Self {
        self.connect_or_create
            .push(ConnectOrCreate { selector, create });
        self
    }

    pub fn and_disconnect(mut self, selector: Unique) -> Self {
        self.disconnect.push(selector);
        self
    }

    pub fn and_delete(mut self, selector: Unique) -> Self {
        self.delete.push(selector);
        self
    }
}

/// Writes against a to-one relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedOne {
    pub connect: Unique,
}

impl NestedOne {
    pub fn connect(selector: Unique) -> Self {
        Self { connect: selector }
    }
}
