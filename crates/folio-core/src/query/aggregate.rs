//! Aggregation and grouping

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::filter::{Condition, Filter};
use super::order::{OrderBy, SortOrder};
use super::unique::Unique;

/// Pseudo-field counting every row
pub const COUNT_ALL: &str = "_all";

/// Aggregate function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Count,
    Avg,
    Sum,
    Min,
    Max,
}

impl AggregateOp {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateOp::Count => "_count",
            AggregateOp::Avg => "_avg",
            AggregateOp::Sum => "_sum",
            AggregateOp::Min => "_min",
            AggregateOp::Max => "_max",
        }
    }
}

/// Which aggregates to compute, per function
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateFields {
    pub count_all: bool,
    pub count: Vec<String>,
    pub avg: Vec<String>,
    pub sum: Vec<String>,
    pub min: Vec<String>,
    pub max: Vec<String>,
}

impl AggregateFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_all(mut self) -> Self {
        self.count_all = true;
        self
    }

    /// Count non-null values of `field`
    pub fn count(mut self, field: impl Into<String>) -> Self {
        self.count.push(field.into());
        self
    }

    pub fn avg(mut self, field: impl Into<String>) -> Self {
        self.avg.push(field.into());
        self
    }

    pub fn sum(mut self, field: impl Into<String>) -> Self {
        self.sum.push(field.into());
        self
    }

    pub fn min(mut self, field: impl Into<String>) -> Self {
        self.min.push(field.into());
        self
    }

    pub fn max(mut self, field: impl Into<String>) -> Self {
        self.max.push(field.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.count_all
            && self.count.is_empty()
            && self.avg.is_empty()
            && self.sum.is_empty()
            && self.min.is_empty()
            && self.max.is_empty()
    }

    /// Every `(op, field)` pair in a stable order
    pub fn pairs(&self) -> Vec<(AggregateOp, &str)> {
        let mut out = Vec::new();
        if self.count_all {
            out.push((AggregateOp::Count, COUNT_ALL));
        }
        let groups = [
            (AggregateOp::Count, &self.count),
            (AggregateOp::Avg, &self.avg),
            (AggregateOp::Sum, &self.sum),
            (AggregateOp::Min, &self.min),
            (AggregateOp::Max, &self.max),
        ];
        for (op, fields) in groups {
            out.extend(fields.iter().map(|f| (op, f.as_str())));
        }
        out
    }
}

/// Arguments of `aggregate`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateArgs {
    pub filter: Option<Filter>,
    pub order_by: Vec<OrderBy>,
    pub cursor: Option<Unique>,
    pub skip: Option<u64>,
    pub take: Option<i64>,
    pub fields: AggregateFields,
}

impl AggregateArgs {
    pub fn new(fields: AggregateFields) -> Self {
        Self {
            fields,
            ..Self::default()
        }
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
}

/// `_count` block of an aggregate result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountAggregate {
    #[serde(rename = "_all", default, skip_serializing_if = "Option::is_none")]
    pub all: Option<i64>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, i64>,
}

/// Computed aggregates; blocks are present only when requested
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    #[serde(rename = "_count", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<CountAggregate>,
    #[serde(rename = "_avg", default, skip_serializing_if = "Option::is_none")]
    pub avg: Option<BTreeMap<String, Option<f64>>>,
    #[serde(rename = "_sum", default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<BTreeMap<String, Option<i64>>>,
    #[serde(rename = "_min", default, skip_serializing_if = "Option::is_none")]
    pub min: Option<BTreeMap<String, Value>>,
    #[serde(rename = "_max", default, skip_serializing_if = "Option::is_none")]
    pub max: Option<BTreeMap<String, Value>>,
}

impl AggregateResult {
    pub fn count_all(&self) -> Option<i64> {
        self.count.as_ref().and_then(|c| c.all)
    }

    pub fn count_of(&self, field: &str) -> Option<i64> {
        self.count.as_ref().and_then(|c| c.fields.get(field).copied())
    }

    /// Average, `None` when not requested or no non-null values
    pub fn avg(&self, field: &str) -> Option<f64> {
        self.avg.as_ref().and_then(|m| m.get(field).copied().flatten())
    }

    pub fn sum(&self, field: &str) -> Option<i64> {
        self.sum.as_ref().and_then(|m| m.get(field).copied().flatten())
    }

    pub fn min(&self, field: &str) -> Option<&Value> {
        self.min.as_ref().and_then(|m| m.get(field)).filter(|v| !v.is_null())
    }

    pub fn max(&self, field: &str) -> Option<&Value> {
        self.max.as_ref().and_then(|m| m.get(field)).filter(|v| !v.is_null())
    }
}

/// One condition of a `having` clause
///
/// With `aggregate: None` the condition applies to a grouped field's value.
#[derive(Debug, Clone, PartialEq)]
pub struct HavingCondition {
    pub field: String,
    pub aggregate: Option<AggregateOp>,
    pub condition: Condition,
}

/// Post-grouping filter
#[derive(Debug, Clone, PartialEq)]
pub enum Having {
    Condition(HavingCondition),
    And(Vec<Having>),
    Or(Vec<Having>),
    Not(Box<Having>),
}

impl Having {
    /// Condition on a grouped field
    pub fn field(field: impl Into<String>, condition: Condition) -> Self {
        Having::Condition(HavingCondition {
            field: field.into(),
            aggregate: None,
            condition,
        })
    }

    /// Condition on an aggregate of `field` (`COUNT_ALL` with `Count`)
    pub fn aggregate(op: AggregateOp, field: impl Into<String>, condition: Condition) -> Self {
        Having::Condition(HavingCondition {
            field: field.into(),
            aggregate: Some(op),
            condition,
        })
    }
}

/// One `orderBy` entry of a `group_by`
#[derive(Debug, Clone, PartialEq)]
pub enum GroupOrder {
    Field(OrderBy),
    Aggregate {
        op: AggregateOp,
        field: String,
        direction: SortOrder,
    },
}

/// Arguments of `group_by`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupByArgs {
    pub by: Vec<String>,
    pub filter: Option<Filter>,
    pub having: Option<Having>,
    pub order_by: Vec<GroupOrder>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    pub fields: AggregateFields,
}

impl GroupByArgs {
    pub fn new<I, S>(by: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            by: by.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn having(mut self, having: Having) -> Self {
        self.having = Some(having);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(GroupOrder::Field(order));
        self
    }

    pub fn order_by_aggregate(
        mut self,
        op: AggregateOp,
        field: impl Into<String>,
        direction: SortOrder,
    ) -> Self {
        self.order_by.push(GroupOrder::Aggregate {
            op,
            field: field.into(),
            direction,
        });
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn aggregates(mut self, fields: AggregateFields) -> Self {
        self.fields = fields;
        self
    }
}

/// One group: the grouped field values plus the requested aggregates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
    #[serde(flatten)]
    pub keys: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub aggregates: AggregateResult,
}

impl GroupRow {
    pub fn key(&self, field: &str) -> Option<&Value> {
        self.keys.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_are_stable() {
        let fields = AggregateFields::new()
            .max("size")
            .count_all()
            .avg("size")
            .count("width");
        let pairs = fields.pairs();
        assert_eq!(
            pairs,
            vec![
                (AggregateOp::Count, COUNT_ALL),
                (AggregateOp::Count, "width"),
                (AggregateOp::Avg, "size"),
                (AggregateOp::Max, "size"),
            ]
        );
    }

    #[test]
    fn test_result_serializes_prisma_style_blocks() {
        let mut avg = BTreeMap::new();
        avg.insert("order".to_string(), Some(2.0));
        let result = AggregateResult {
            count: Some(CountAggregate {
                all: Some(3),
                fields: BTreeMap::new(),
            }),
            avg: Some(avg),
            ..AggregateResult::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({"_count": {"_all": 3}, "_avg": {"order": 2.0}}));
        assert_eq!(result.avg("order"), Some(2.0));
        assert_eq!(result.count_all(), Some(3));
        assert_eq!(result.sum("order"), None);
    }
}
