//! Argument bundles for read operations

use serde::{Deserialize, Serialize};

use super::filter::Filter;
use super::order::OrderBy;
use super::relations::Include;
use super::unique::Unique;

/// Arguments of `find_first` / `find_many` and their projected variants
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindArgs {
    pub filter: Option<Filter>,
    pub order_by: Vec<OrderBy>,
    /// Page anchor; the anchored row is the first row of the page
    pub cursor: Option<Unique>,
    pub skip: Option<u64>,
    /// Page size; negative values page backwards
    pub take: Option<i64>,
    pub distinct: Vec<String>,
    pub include: Option<Include>,
}

impl FindArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn cursor(mut self, cursor: Unique) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn distinct<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.distinct = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn include(mut self, include: Include) -> Self {
        self.include = Some(include);
        self
    }
}

impl From<Filter> for FindArgs {
    fn from(filter: Filter) -> Self {
        FindArgs::new().filter(filter)
    }
}

/// Arguments of `find_unique` and friends
#[derive(Debug, Clone, PartialEq)]
pub struct FindUniqueArgs {
    pub unique: Unique,
    pub include: Option<Include>,
}

impl FindUniqueArgs {
    pub fn new(unique: Unique) -> Self {
        Self {
            unique,
            include: None,
        }
    }

    pub fn include(mut self, include: Include) -> Self {
        self.include = Some(include);
        self
    }
}

impl From<Unique> for FindUniqueArgs {
    fn from(unique: Unique) -> Self {
        FindUniqueArgs::new(unique)
    }
}

/// Affected-row count returned by bulk writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCount {
    pub count: u64,
}
