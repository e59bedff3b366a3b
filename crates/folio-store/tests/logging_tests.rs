// Integration tests for operation and query logging
//
// The capture subscriber is process-global, so every assertion filters on
// something unique to its test.

mod common;

use common::client_with;
use folio_core::errors::ExErrorKind;
use folio_core::logging_facility::init_test_capture;
use folio_core::query::{Filter, Unique};
use folio_store::{LogLevel, Repositories, StoreConfig};
use tracing::Level;

#[test]
fn test_query_logging_traces_statements() {
    // Given
    let capture = init_test_capture();
    let client = client_with(StoreConfig::in_memory().with_log([LogLevel::Query, LogLevel::Info]));

    // When
    client
        .tags()
        .count(Some(Filter::eq("name", "query-trace-marker")))
        .unwrap();

    // Then
    let traced = capture.count_events(|e| {
        e.target == "folio_store::query"
            && e.level == Level::DEBUG
            && e.event.as_deref() == Some("query")
            && e.field("sql").is_some_and(|sql| sql.contains("COUNT(*)"))
            && e.field("param_count") == Some("1")
    });
    assert!(traced >= 1, "expected a traced COUNT statement");
    capture.assert_event_exists("count", "start");
    capture.assert_event_exists("count", "end");
}

#[test]
fn test_failed_operation_logs_end_error_with_kind() {
    let capture = init_test_capture();
    let client = client_with(StoreConfig::in_memory().with_log([LogLevel::Error]));

    let err = client
        .tags()
        .find_unique_or_throw(Unique::id("logging-missing-tag"))
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);

    let delete_err = client
        .tags()
        .delete(Unique::id("logging-missing-tag"))
        .unwrap_err();
    assert_eq!(delete_err.kind(), ExErrorKind::NotFound);

    let logged = capture.count_events(|e| {
        e.level == Level::ERROR
            && e.op.as_deref() == Some("delete")
            && e.event.as_deref() == Some("end_error")
            && e.field("err_kind") == Some("NotFound")
            && e.field("entity") == Some("Tag")
    });
    assert!(logged >= 1, "expected an end_error event for the failed delete");
}
