//! `where` filter grammar
//!
//! A filter is a boolean expression tree over field conditions and relation
//! predicates. Trees are validated against the entity schema before they are
//! compiled to SQL.

use serde_json::Value;

/// Comparison applied to a single scalar field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `equals`; `Value::Null` matches NULL
    Equals(Value),
    /// `not`; `Value::Null` matches non-NULL
    NotEquals(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
}

impl Condition {
    /// Operator name as it appears in validation messages
    pub fn operator(&self) -> &'static str {
        match self {
            Condition::Equals(_) => "equals",
            Condition::NotEquals(_) => "not",
            Condition::In(_) => "in",
            Condition::NotIn(_) => "notIn",
            Condition::Lt(_) => "lt",
            Condition::Lte(_) => "lte",
            Condition::Gt(_) => "gt",
            Condition::Gte(_) => "gte",
            Condition::Contains(_) => "contains",
            Condition::StartsWith(_) => "startsWith",
            Condition::EndsWith(_) => "endsWith",
        }
    }

    /// String-only operators
    pub fn is_text_match(&self) -> bool {
        matches!(
            self,
            Condition::Contains(_) | Condition::StartsWith(_) | Condition::EndsWith(_)
        )
    }

    /// Ordering comparisons
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Condition::Lt(_) | Condition::Lte(_) | Condition::Gt(_) | Condition::Gte(_)
        )
    }

    /// Only null checks are meaningful on JSON columns
    pub fn is_null_check(&self) -> bool {
        matches!(
            self,
            Condition::Equals(Value::Null) | Condition::NotEquals(Value::Null)
        )
    }

    /// Values carried by the condition that must match the field type
    pub fn values(&self) -> Vec<&Value> {
        match self {
            Condition::Equals(v)
            | Condition::NotEquals(v)
            | Condition::Lt(v)
            | Condition::Lte(v)
            | Condition::Gt(v)
            | Condition::Gte(v) => vec![v],
            Condition::In(vs) | Condition::NotIn(vs) => vs.iter().collect(),
            Condition::Contains(_) | Condition::StartsWith(_) | Condition::EndsWith(_) => {
                Vec::new()
            }
        }
    }
}

/// String comparison mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    #[default]
    Default,
    Insensitive,
}

/// A condition bound to a field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub condition: Condition,
    pub mode: QueryMode,
}

/// Boolean filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Field(FieldFilter),
    /// All must hold; empty is true
    And(Vec<Filter>),
    /// Any must hold; empty is false
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// At least one related row matches (to-many)
    Some { relation: String, filter: Box<Filter> },
    /// Every related row matches (to-many, vacuously true)
    Every { relation: String, filter: Box<Filter> },
    /// No related row matches (to-many)
    None { relation: String, filter: Box<Filter> },
    /// The related row exists and matches; `None` means the relation is unset (to-one)
    Is {
        relation: String,
        filter: Option<Box<Filter>>,
    },
    /// The related row does not match; `None` means the relation is set (to-one)
    IsNot {
        relation: String,
        filter: Option<Box<Filter>>,
    },
}

impl Filter {
    pub fn field(field: impl Into<String>, condition: Condition) -> Self {
        Filter::Field(FieldFilter {
            field: field.into(),
            condition,
            mode: QueryMode::Default,
        })
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::Equals(value.into()))
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::NotEquals(value.into()))
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::field(field, Condition::Equals(Value::Null))
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::field(field, Condition::NotEquals(Value::Null))
    }

    pub fn in_list<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::field(field, Condition::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn not_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::field(
            field,
            Condition::NotIn(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::Lt(value.into()))
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::Lte(value.into()))
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::Gt(value.into()))
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, Condition::Gte(value.into()))
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::field(field, Condition::Contains(needle.into()))
    }

    pub fn starts_with(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::field(field, Condition::StartsWith(prefix.into()))
    }

    pub fn ends_with(field: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self::field(field, Condition::EndsWith(suffix.into()))
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    pub fn some(relation: impl Into<String>, filter: Filter) -> Self {
        Filter::Some {
            relation: relation.into(),
            filter: Box::new(filter),
        }
    }

    pub fn every(relation: impl Into<String>, filter: Filter) -> Self {
        Filter::Every {
            relation: relation.into(),
            filter: Box::new(filter),
        }
    }

    pub fn none(relation: impl Into<String>, filter: Filter) -> Self {
        Filter::None {
            relation: relation.into(),
            filter: Box::new(filter),
        }
    }

    pub fn is(relation: impl Into<String>, filter: Filter) -> Self {
        Filter::Is {
            relation: relation.into(),
            filter: Some(Box::new(filter)),
        }
    }

    pub fn is_not(relation: impl Into<String>, filter: Filter) -> Self {
        Filter::IsNot {
            relation: relation.into(),
            filter: Some(Box::new(filter)),
        }
    }

    /// To-one relation is unset
    pub fn relation_is_null(relation: impl Into<String>) -> Self {
        Filter::Is {
            relation: relation.into(),
            filter: None,
        }
    }

    /// To-one relation is set
    pub fn relation_is_set(relation: impl Into<String>) -> Self {
        Filter::IsNot {
            relation: relation.into(),
            filter: None,
        }
    }

    /// Switch a string condition to case-insensitive matching
    ///
    /// Has no effect on composite filters.
    pub fn insensitive(self) -> Self {
        match self {
            Filter::Field(mut f) => {
                f.mode = QueryMode::Insensitive;
                Filter::Field(f)
            }
            other => other,
        }
    }

    /// Conjoin with another filter, flattening nested `And`s
    pub fn and_also(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            first => Filter::And(vec![first, other]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_produce_field_filters() {
        let f = Filter::eq("slug", "hello");
        assert_eq!(
            f,
            Filter::Field(FieldFilter {
                field: "slug".into(),
                condition: Condition::Equals(Value::String("hello".into())),
                mode: QueryMode::Default,
            })
        );
    }

    #[test]
    fn test_insensitive_only_touches_field_filters() {
        let f = Filter::contains("title", "Rust").insensitive();
        match f {
            Filter::Field(ff) => assert_eq!(ff.mode, QueryMode::Insensitive),
            _ => panic!("expected field filter"),
        }

        let composite = Filter::and([Filter::eq("published", true)]).insensitive();
        assert!(matches!(composite, Filter::And(_)));
    }

    #[test]
    fn test_and_also_flattens() {
        let f = Filter::and([Filter::eq("a", 1)]).and_also(Filter::eq("b", 2));
        match f {
            Filter::And(parts) => assert_eq!(parts.len(), 2),
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn test_condition_classification() {
        assert!(Condition::Contains("x".into()).is_text_match());
        assert!(Condition::Gte(Value::from(1)).is_range());
        assert!(Condition::Equals(Value::Null).is_null_check());
        assert!(!Condition::Equals(Value::from(1)).is_null_check());
        assert_eq!(Condition::In(vec![Value::from(1), Value::from(2)]).values().len(), 2);
    }
}
