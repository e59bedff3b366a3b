//! Query grammar
//!
//! Tagged-variant descriptions of filters, orderings, pagination, relation
//! loading, projections, nested writes and aggregations. Nothing here talks
//! to a store; `rules::validation` checks these against entity schemas and
//! the store crate compiles them.

pub mod aggregate;
pub mod args;
pub mod filter;
pub mod nested;
pub mod order;
pub mod relations;
pub mod unique;

pub use aggregate::{
    AggregateArgs, AggregateFields, AggregateOp, AggregateResult, CountAggregate, GroupByArgs,
    GroupOrder, GroupRow, Having, HavingCondition, COUNT_ALL,
};
pub use args::{BatchCount, FindArgs, FindUniqueArgs};
pub use filter::{Condition, FieldFilter, Filter, QueryMode};
pub use nested::{ConnectOrCreate, NestedMany, NestedOne};
pub use order::{NullsOrder, OrderBy, SortOrder};
pub use relations::{Include, RelationArgs, RelationSelect, Select};
pub use unique::Unique;
