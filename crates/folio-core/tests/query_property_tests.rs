use folio_core::errors::QueryError;
use folio_core::model::schema::{entities, FieldType};
use folio_core::query::{Filter, OrderBy};
use folio_core::rules::{validate_filter, validate_order};
use proptest::prelude::*;
use serde_json::Value;

fn sample_value(ty: FieldType, n: i64, text: &str, flag: bool) -> Value {
    match ty {
        FieldType::Text => Value::String(text.to_string()),
        FieldType::Int => Value::from(n),
        FieldType::Bool => Value::Bool(flag),
        FieldType::DateTime => Value::String("2024-05-01T12:00:00.000Z".to_string()),
        FieldType::Json => Value::Null,
    }
}

proptest! {
    #[test]
    fn prop_equality_on_declared_field_with_matching_type_validates(
        entity_idx in 0usize..7,
        field_seed in any::<usize>(),
        n in any::<i64>(),
        text in "[a-zA-Z0-9 %_]{0,12}",
        flag in any::<bool>(),
    ) {
        let schema = entities()[entity_idx];
        let field = &schema.fields[field_seed % schema.fields.len()];
        let filter = Filter::eq(field.name, sample_value(field.ty, n, &text, flag));

        prop_assert!(validate_filter(schema, &filter).is_ok());
    }

    #[test]
    fn prop_unknown_fields_are_always_rejected(
        entity_idx in 0usize..7,
        name in "zz[a-z]{1,10}",
    ) {
        let schema = entities()[entity_idx];
        let err = validate_filter(schema, &Filter::eq(name.clone(), 1)).unwrap_err();

        let is_unknown_field = matches!(
            err,
            QueryError::UnknownField { ref field, .. } if *field == name
        );
        prop_assert!(is_unknown_field);
    }

    #[test]
    fn prop_reversing_an_ordering_twice_is_identity_up_to_nulls(
        desc in any::<bool>(),
        nulls in prop::option::of(any::<bool>()),
    ) {
        let mut order = if desc { OrderBy::desc("title") } else { OrderBy::asc("title") };
        order = match nulls {
            Some(true) => order.nulls_first(),
            Some(false) => order.nulls_last(),
            None => order,
        };

        let back = order.reversed().reversed();

        prop_assert_eq!(back.direction, order.direction);
        prop_assert_eq!(back.nulls_come_first(), order.nulls_come_first());
        prop_assert_ne!(order.reversed().nulls_come_first(), order.nulls_come_first());
    }

    #[test]
    fn prop_nested_boolean_composition_validates_when_leaves_do(
        depth in 0usize..5,
        use_or in any::<bool>(),
    ) {
        let schema = entities()[1];
        let mut filter = Filter::eq("published", true);
        for _ in 0..depth {
            filter = if use_or {
                Filter::or([filter, Filter::not(Filter::contains("title", "x"))])
            } else {
                Filter::and([filter, Filter::gte("readTime", 1)])
            };
        }

        prop_assert!(validate_filter(schema, &filter).is_ok());
        prop_assert!(validate_order(schema, &[OrderBy::asc("createdAt")]).is_ok());
    }
}
