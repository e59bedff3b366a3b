//! Boundary validation of queries and write payloads
//!
//! Every check here runs before a statement is prepared. Failures are
//! `QueryError`s, which surface as `ExErrorKind::Validation`.

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::errors::QueryError;
use crate::model::schema::{EntitySchema, FieldDef, FieldType, RelationKind};
use crate::query::{
    AggregateArgs, AggregateFields, AggregateOp, Condition, FieldFilter, Filter, FindArgs,
    GroupByArgs, GroupOrder, Having, Include, OrderBy, QueryMode, RelationArgs, Select, Unique,
    COUNT_ALL,
};

type Result<T> = std::result::Result<T, QueryError>;

fn unknown_field(schema: &EntitySchema, field: &str) -> QueryError {
    QueryError::UnknownField {
        entity: schema.name.to_string(),
        field: field.to_string(),
    }
}

fn misuse(schema: &EntitySchema, relation: &str, usage: &str) -> QueryError {
    QueryError::RelationMisuse {
        entity: schema.name.to_string(),
        relation: relation.to_string(),
        usage: usage.to_string(),
    }
}

/// Resolve a scalar field or fail with `UnknownField`
pub fn scalar_field(schema: &EntitySchema, name: &str) -> Result<&'static FieldDef> {
    schema.field(name).ok_or_else(|| unknown_field(schema, name))
}

fn relation(
    schema: &EntitySchema,
    name: &str,
) -> Result<&'static crate::model::schema::RelationDef> {
    schema
        .relation(name)
        .ok_or_else(|| QueryError::UnknownRelation {
            entity: schema.name.to_string(),
            relation: name.to_string(),
        })
}

/// Check that `value` fits the declared type of `field`
///
/// `Null` is accepted only when `allow_null` is set.
pub fn check_value(
    schema: &EntitySchema,
    field: &FieldDef,
    value: &Value,
    allow_null: bool,
) -> Result<()> {
    let ok = match (field.ty, value) {
        (_, Value::Null) => allow_null,
        (FieldType::Text, Value::String(_)) => true,
        (FieldType::Int, Value::Number(n)) => n.is_i64(),
        (FieldType::Bool, Value::Bool(_)) => true,
        (FieldType::DateTime, Value::String(s)) => DateTime::parse_from_rfc3339(s).is_ok(),
        (FieldType::Json, _) => true,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(QueryError::InvalidValue {
            entity: schema.name.to_string(),
            field: field.name.to_string(),
            expected: field.ty.describe().to_string(),
        })
    }
}

fn validate_condition(schema: &EntitySchema, filter: &FieldFilter) -> Result<()> {
    let field = scalar_field(schema, &filter.field)?;
    let unsupported = || QueryError::UnsupportedOperator {
        entity: schema.name.to_string(),
        field: field.name.to_string(),
        operator: filter.condition.operator().to_string(),
    };

    let cond = &filter.condition;
    let applicable = match field.ty {
        FieldType::Json => cond.is_null_check(),
        FieldType::Text => true,
        FieldType::Bool => !cond.is_text_match() && !cond.is_range(),
        FieldType::Int | FieldType::DateTime => !cond.is_text_match(),
    };
    if !applicable {
        return Err(unsupported());
    }
    if filter.mode == QueryMode::Insensitive && field.ty != FieldType::Text {
        return Err(QueryError::UnsupportedOperator {
            entity: schema.name.to_string(),
            field: field.name.to_string(),
            operator: "mode: insensitive".to_string(),
        });
    }

    // Null is only meaningful for equals / not
    let null_ok = matches!(cond, Condition::Equals(_) | Condition::NotEquals(_));
    for value in cond.values() {
        check_value(schema, field, value, null_ok)?;
    }
    Ok(())
}

/// Validate a `where` tree against `schema`, descending into relations
pub fn validate_filter(schema: &EntitySchema, filter: &Filter) -> Result<()> {
    match filter {
        Filter::Field(f) => validate_condition(schema, f),
        Filter::And(parts) | Filter::Or(parts) => {
            parts.iter().try_for_each(|p| validate_filter(schema, p))
        }
        Filter::Not(inner) => validate_filter(schema, inner),
        Filter::Some { relation: name, filter }
        | Filter::Every { relation: name, filter }
        | Filter::None { relation: name, filter } => {
            let rel = relation(schema, name)?;
            if !rel.is_to_many() {
                return Err(misuse(schema, name, "some/every/none"));
            }
            validate_filter(rel.target_schema(), filter)
        }
        Filter::Is { relation: name, filter } | Filter::IsNot { relation: name, filter } => {
            let rel = relation(schema, name)?;
            if rel.is_to_many() {
                return Err(misuse(schema, name, "is/isNot"));
            }
            match filter {
                Some(inner) => validate_filter(rel.target_schema(), inner),
                None => Ok(()),
            }
        }
    }
}

/// A unique selector must name the primary key or a unique field with a non-null value
pub fn validate_unique(schema: &EntitySchema, unique: &Unique) -> Result<()> {
    let field = scalar_field(schema, &unique.field)?;
    if !field.unique {
        return Err(QueryError::NotUnique {
            entity: schema.name.to_string(),
            field: field.name.to_string(),
        });
    }
    check_value(schema, field, &unique.value, false)
}

pub fn validate_order(schema: &EntitySchema, order_by: &[OrderBy]) -> Result<()> {
    for order in order_by {
        let field = scalar_field(schema, &order.field)?;
        if !field.ty.is_comparable() {
            return Err(QueryError::UnsupportedOperator {
                entity: schema.name.to_string(),
                field: field.name.to_string(),
                operator: "orderBy".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_count_relations(schema: &EntitySchema, count: &[String]) -> Result<()> {
    for name in count {
        if !relation(schema, name)?.is_to_many() {
            return Err(misuse(schema, name, "_count"));
        }
    }
    Ok(())
}

fn validate_relation_args(schema: &EntitySchema, name: &str, args: &RelationArgs) -> Result<()> {
    let rel = relation(schema, name)?;
    if !rel.is_to_many() && !args.is_plain() {
        return Err(misuse(schema, name, "filter/orderBy/skip/take"));
    }
    let target = rel.target_schema();
    if let Some(filter) = &args.filter {
        validate_filter(target, filter)?;
    }
    validate_order(target, &args.order_by)?;
    if let Some(include) = &args.include {
        validate_include(target, include)?;
    }
    Ok(())
}

/// Validate an `include` tree, recursively
pub fn validate_include(schema: &EntitySchema, include: &Include) -> Result<()> {
    for (name, args) in &include.relations {
        validate_relation_args(schema, name, args)?;
    }
    validate_count_relations(schema, &include.count)
}

/// Validate a `select` projection, recursively
pub fn validate_select(schema: &EntitySchema, select: &Select) -> Result<()> {
    for field in &select.fields {
        scalar_field(schema, field)?;
    }
    for (name, rel_select) in &select.relations {
        validate_relation_args(schema, name, &rel_select.args)?;
        if let Some(inner) = &rel_select.select {
            let target = relation(schema, name)?.target_schema();
            validate_select(target, inner)?;
        }
    }
    validate_count_relations(schema, &select.count)
}

/// Validate `find_first` / `find_many` arguments
pub fn validate_find(schema: &EntitySchema, args: &FindArgs) -> Result<()> {
    if let Some(filter) = &args.filter {
        validate_filter(schema, filter)?;
    }
    validate_order(schema, &args.order_by)?;
    if let Some(cursor) = &args.cursor {
        validate_unique(schema, cursor)?;
    }
    for field in &args.distinct {
        scalar_field(schema, field)?;
    }
    if let Some(include) = &args.include {
        validate_include(schema, include)?;
    }
    Ok(())
}

fn validate_aggregate_pair(schema: &EntitySchema, op: AggregateOp, field: &str) -> Result<()> {
    if field == COUNT_ALL {
        return match op {
            AggregateOp::Count => Ok(()),
            _ => Err(QueryError::NonNumericAggregate {
                entity: schema.name.to_string(),
                field: field.to_string(),
                aggregate: op.name().to_string(),
            }),
        };
    }
    let def = scalar_field(schema, field)?;
    let ok = match op {
        AggregateOp::Count => true,
        AggregateOp::Avg | AggregateOp::Sum => def.ty.is_numeric(),
        AggregateOp::Min | AggregateOp::Max => def.ty.is_comparable(),
    };
    if ok {
        Ok(())
    } else {
        Err(QueryError::NonNumericAggregate {
            entity: schema.name.to_string(),
            field: field.to_string(),
            aggregate: op.name().to_string(),
        })
    }
}

/// Each requested aggregate must fit its field's type
pub fn validate_aggregate_fields(schema: &EntitySchema, fields: &AggregateFields) -> Result<()> {
    fields
        .pairs()
        .into_iter()
        .try_for_each(|(op, field)| validate_aggregate_pair(schema, op, field))
}

pub fn validate_aggregate(schema: &EntitySchema, args: &AggregateArgs) -> Result<()> {
    if let Some(filter) = &args.filter {
        validate_filter(schema, filter)?;
    }
    validate_order(schema, &args.order_by)?;
    if let Some(cursor) = &args.cursor {
        validate_unique(schema, cursor)?;
    }
    validate_aggregate_fields(schema, &args.fields)
}

fn require_in_by(args: &GroupByArgs, field: &str, clause: &str) -> Result<()> {
    if args.by.iter().any(|b| b == field) {
        Ok(())
    } else {
        Err(QueryError::GroupByFieldNotInBy {
            field: field.to_string(),
            clause: clause.to_string(),
        })
    }
}

fn validate_having(schema: &EntitySchema, args: &GroupByArgs, having: &Having) -> Result<()> {
    match having {
        Having::And(parts) | Having::Or(parts) => parts
            .iter()
            .try_for_each(|p| validate_having(schema, args, p)),
        Having::Not(inner) => validate_having(schema, args, inner),
        Having::Condition(cond) => match cond.aggregate {
            None => {
                require_in_by(args, &cond.field, "having")?;
                validate_condition(
                    schema,
                    &FieldFilter {
                        field: cond.field.clone(),
                        condition: cond.condition.clone(),
                        mode: QueryMode::Default,
                    },
                )
            }
            Some(op) => {
                validate_aggregate_pair(schema, op, &cond.field)?;
                if cond.condition.is_text_match() {
                    return Err(QueryError::UnsupportedOperator {
                        entity: schema.name.to_string(),
                        field: cond.field.clone(),
                        operator: cond.condition.operator().to_string(),
                    });
                }
                let numeric = matches!(op, AggregateOp::Count | AggregateOp::Avg | AggregateOp::Sum);
                for value in cond.condition.values() {
                    let fits = if numeric {
                        value.is_number() || value.is_null()
                    } else {
                        let def = scalar_field(schema, &cond.field)?;
                        check_value(schema, def, value, true).is_ok()
                    };
                    if !fits {
                        return Err(QueryError::InvalidValue {
                            entity: schema.name.to_string(),
                            field: cond.field.clone(),
                            expected: if numeric { "number" } else { "field value" }.to_string(),
                        });
                    }
                }
                Ok(())
            }
        },
    }
}

/// Validate `group_by` arguments
///
/// Plain fields in `having` and `orderBy` must be grouped; aggregates of any
/// field are allowed. Pagination requires an ordering.
pub fn validate_group_by(schema: &EntitySchema, args: &GroupByArgs) -> Result<()> {
    if args.by.is_empty() {
        return Err(QueryError::EmptyGroupBy);
    }
    for field in &args.by {
        scalar_field(schema, field)?;
    }
    if let Some(filter) = &args.filter {
        validate_filter(schema, filter)?;
    }
    if let Some(having) = &args.having {
        validate_having(schema, args, having)?;
    }
    for order in &args.order_by {
        match order {
            GroupOrder::Field(o) => {
                require_in_by(args, &o.field, "orderBy")?;
                validate_order(schema, std::slice::from_ref(o))?;
            }
            GroupOrder::Aggregate { op, field, .. } => {
                validate_aggregate_pair(schema, *op, field)?;
            }
        }
    }
    if (args.take.is_some() || args.skip.is_some()) && args.order_by.is_empty() {
        return Err(QueryError::GroupByPaginationWithoutOrder);
    }
    validate_aggregate_fields(schema, &args.fields)
}

/// How a payload is being written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

/// Validate the scalar part of a create or update payload
///
/// Relation keys are accepted here and checked by the nested-write planner.
/// On create every required field must be present. Exclusive field pairs
/// must not both be non-null.
pub fn validate_payload(
    schema: &EntitySchema,
    payload: &Map<String, Value>,
    mode: WriteMode,
) -> Result<()> {
    for (key, value) in payload {
        if let Some(field) = schema.field(key) {
            check_value(schema, field, value, field.nullable)?;
        } else if schema.relation(key).is_none() {
            return Err(unknown_field(schema, key));
        }
    }

    if mode == WriteMode::Create {
        for field in schema.fields.iter().filter(|f| f.is_required()) {
            let present = payload.get(field.name).is_some_and(|v| !v.is_null());
            if !present && !fk_supplied_by_relation(schema, field, payload) {
                return Err(QueryError::MissingField {
                    entity: schema.name.to_string(),
                    field: field.name.to_string(),
                });
            }
        }
    }

    check_exclusive(schema, payload)
}

// A required foreign key may instead come from `relation: { connect }`
fn fk_supplied_by_relation(
    schema: &EntitySchema,
    field: &FieldDef,
    payload: &Map<String, Value>,
) -> bool {
    schema
        .relation_for_fk(field.name)
        .is_some_and(|rel| payload.contains_key(rel.name))
}

/// Exclusive field pairs may not both carry a value
pub fn check_exclusive(schema: &EntitySchema, payload: &Map<String, Value>) -> Result<()> {
    for (first, second) in schema.exclusive {
        let set = |name: &str| payload.get(name).is_some_and(|v| !v.is_null());
        if set(first) && set(second) {
            return Err(QueryError::ExclusiveFields {
                entity: schema.name.to_string(),
                first: first.to_string(),
                second: second.to_string(),
            });
        }
    }
    Ok(())
}

/// Which nested actions a relation accepts
pub fn nested_action_allowed(rel: &RelationKind, action: &str, fk_nullable: bool) -> bool {
    match rel {
        RelationKind::BelongsTo { .. } => action == "connect",
        RelationKind::HasMany { .. } => match action {
            "create" | "connect" | "delete" => true,
            "disconnect" => fk_nullable,
            _ => false,
        },
        RelationKind::ManyToMany { .. } => matches!(
            action,
            "create" | "connect" | "connectOrCreate" | "disconnect" | "set"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::schema::{CONTENT_SECTION, MEDIA, POST, TAG, USER};
    use crate::query::SortOrder;
    use serde_json::json;

    #[test]
    fn test_text_match_rejected_on_int() {
        let err = validate_filter(&MEDIA, &Filter::contains("size", "1")).unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedOperator { .. }));
    }

    #[test]
    fn test_value_type_mismatch() {
        let err = validate_filter(&POST, &Filter::eq("published", "yes")).unwrap_err();
        assert!(matches!(err, QueryError::InvalidValue { .. }));
        assert!(validate_filter(&POST, &Filter::eq("published", true)).is_ok());
    }

    #[test]
    fn test_null_only_with_equals() {
        assert!(validate_filter(&POST, &Filter::is_null("category")).is_ok());
        let err = validate_filter(&POST, &Filter::in_list("category", [Value::Null])).unwrap_err();
        assert!(matches!(err, QueryError::InvalidValue { .. }));
    }

    #[test]
    fn test_relation_filters_check_cardinality() {
        let ok = Filter::some("tags", Filter::eq("name", "rust"));
        assert!(validate_filter(&POST, &ok).is_ok());

        let bad = Filter::some("author", Filter::eq("role", "admin"));
        assert!(matches!(
            validate_filter(&POST, &bad).unwrap_err(),
            QueryError::RelationMisuse { .. }
        ));

        let bad = Filter::is("tags", Filter::eq("name", "rust"));
        assert!(validate_filter(&POST, &bad).is_err());
    }

    #[test]
    fn test_nested_filter_checked_against_target() {
        let f = Filter::is("author", Filter::eq("nope", 1));
        assert_eq!(
            validate_filter(&POST, &f).unwrap_err(),
            QueryError::UnknownField {
                entity: "User".into(),
                field: "nope".into()
            }
        );
    }

    #[test]
    fn test_unique_requires_unique_field() {
        assert!(validate_unique(&USER, &Unique::by("email", "a@x.io")).is_ok());
        assert!(matches!(
            validate_unique(&USER, &Unique::by("name", "a")).unwrap_err(),
            QueryError::NotUnique { .. }
        ));
    }

    #[test]
    fn test_include_args_on_to_one_rejected() {
        let inc = Include::new().with_args("author", RelationArgs::new().take(1));
        assert!(validate_include(&POST, &inc).is_err());
        assert!(validate_include(&POST, &Include::new().with("author")).is_ok());
        assert!(validate_include(&POST, &Include::new().count("author")).is_err());
    }

    #[test]
    fn test_group_by_rules() {
        let empty = GroupByArgs::new(Vec::<String>::new());
        assert_eq!(validate_group_by(&POST, &empty), Err(QueryError::EmptyGroupBy));

        let unordered = GroupByArgs::new(["category"]).take(2);
        assert_eq!(
            validate_group_by(&POST, &unordered),
            Err(QueryError::GroupByPaginationWithoutOrder)
        );

        let outside = GroupByArgs::new(["category"]).order_by(OrderBy::asc("title"));
        assert!(matches!(
            validate_group_by(&POST, &outside),
            Err(QueryError::GroupByFieldNotInBy { .. })
        ));

        let by_aggregate = GroupByArgs::new(["category"])
            .order_by_aggregate(AggregateOp::Count, COUNT_ALL, SortOrder::Desc)
            .take(3)
            .aggregates(AggregateFields::new().count_all().avg("readTime"));
        assert!(validate_group_by(&POST, &by_aggregate).is_ok());
    }

    #[test]
    fn test_avg_requires_numeric() {
        let fields = AggregateFields::new().avg("title");
        assert!(matches!(
            validate_aggregate_fields(&POST, &fields),
            Err(QueryError::NonNumericAggregate { .. })
        ));
    }

    #[test]
    fn test_create_payload_requires_fields() {
        let payload = json!({"name": "rust"});
        assert!(validate_payload(&TAG, payload.as_object().unwrap(), WriteMode::Create).is_ok());

        let missing = json!({});
        assert_eq!(
            validate_payload(&TAG, missing.as_object().unwrap(), WriteMode::Create),
            Err(QueryError::MissingField {
                entity: "Tag".into(),
                field: "name".into()
            })
        );
        assert!(validate_payload(&TAG, missing.as_object().unwrap(), WriteMode::Update).is_ok());
    }

    #[test]
    fn test_author_connect_satisfies_author_id() {
        let payload = json!({
            "title": "t", "slug": "s", "excerpt": "e", "content": "c",
            "author": {"connect": {"field": "id", "value": "u1"}}
        });
        assert!(validate_payload(&POST, payload.as_object().unwrap(), WriteMode::Create).is_ok());
    }

    #[test]
    fn test_exclusive_owner_fields() {
        let payload = json!({"type": "text", "content": "x", "order": 1, "postId": "p", "projectId": "q"});
        assert!(matches!(
            validate_payload(&CONTENT_SECTION, payload.as_object().unwrap(), WriteMode::Create),
            Err(QueryError::ExclusiveFields { .. })
        ));
    }
}
