pub mod validation;

pub use validation::{
    check_value, validate_aggregate, validate_aggregate_fields, validate_filter, validate_find,
    validate_group_by, validate_include, validate_order, validate_payload, validate_select,
    validate_unique, WriteMode,
};
