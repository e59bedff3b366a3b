// Integration tests for aggregate and group_by

mod common;

use common::client;
use folio_core::errors::ExErrorKind;
use folio_core::model::{CreateContentSection, CreateMedia};
use folio_core::query::{
    AggregateArgs, AggregateFields, AggregateOp, Condition, Filter, GroupByArgs, Having, OrderBy,
    SortOrder, COUNT_ALL,
};
use folio_store::{FolioClient, Repositories};
use serde_json::json;

fn seed_media(client: &FolioClient) {
    let items = vec![
        CreateMedia::new("a.png", "https://cdn/a.png", "image", 100).dimensions(10, 10),
        CreateMedia::new("b.png", "https://cdn/b.png", "image", 300),
        CreateMedia::new("c.mp4", "https://cdn/c.mp4", "video", 1000).dimensions(1920, 1080),
    ];
    client.media().create_many(items, false).unwrap();
}

#[test]
fn test_average_of_section_order() {
    // Given: sections ordered 1, 2, 3
    let client = client();
    for order in 1..=3 {
        client
            .content_sections()
            .create(CreateContentSection::new("text", format!("s{}", order), order))
            .unwrap();
    }

    // When
    let result = client
        .content_sections()
        .aggregate(AggregateArgs::new(AggregateFields::new().avg("order").count_all()))
        .unwrap();

    // Then
    assert_eq!(result.avg("order"), Some(2.0));
    assert_eq!(result.count_all(), Some(3));
}

#[test]
fn test_sum_min_max_and_field_counts() {
    let client = client();
    seed_media(&client);

    let result = client
        .media()
        .aggregate(AggregateArgs::new(
            AggregateFields::new()
                .sum("size")
                .min("size")
                .max("name")
                .count("width"),
        ))
        .unwrap();

    assert_eq!(result.sum("size"), Some(1400));
    assert_eq!(result.min("size"), Some(&json!(100)));
    assert_eq!(result.max("name"), Some(&json!("c.mp4")));
    // width is null on one row
    assert_eq!(result.count_of("width"), Some(2));
}

#[test]
fn test_aggregate_respects_filter_and_window() {
    let client = client();
    seed_media(&client);

    let images = client
        .media()
        .aggregate(
            AggregateArgs::new(AggregateFields::new().sum("size").count_all())
                .filter(Filter::eq("type", "image")),
        )
        .unwrap();
    let largest_two = client
        .media()
        .aggregate(
            AggregateArgs::new(AggregateFields::new().sum("size"))
                .order_by(OrderBy::desc("size"))
                .take(2),
        )
        .unwrap();

    assert_eq!(images.sum("size"), Some(400));
    assert_eq!(images.count_all(), Some(2));
    assert_eq!(largest_two.sum("size"), Some(1300));
}

#[test]
fn test_aggregate_over_no_rows() {
    let client = client();

    let result = client
        .media()
        .aggregate(AggregateArgs::new(
            AggregateFields::new().count_all().avg("size").sum("size"),
        ))
        .unwrap();

    assert_eq!(result.count_all(), Some(0));
    assert_eq!(result.avg("size"), None);
    assert_eq!(result.sum("size"), None);
}

#[test]
fn test_numeric_aggregate_on_text_is_validation() {
    let client = client();

    let err = client
        .media()
        .aggregate(AggregateArgs::new(AggregateFields::new().avg("name")))
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(err.fields(), ["name".to_string()]);
}

#[test]
fn test_group_by_with_aggregates_and_order() {
    // Given
    let client = client();
    seed_media(&client);

    // When
    let groups = client
        .media()
        .group_by(
            GroupByArgs::new(["type"])
                .aggregates(AggregateFields::new().count_all().sum("size"))
                .order_by(OrderBy::asc("type")),
        )
        .unwrap();

    // Then
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].key("type"), Some(&json!("image")));
    assert_eq!(groups[0].aggregates.count_all(), Some(2));
    assert_eq!(groups[0].aggregates.sum("size"), Some(400));
    assert_eq!(groups[1].key("type"), Some(&json!("video")));
    assert_eq!(groups[1].aggregates.sum("size"), Some(1000));
}

#[test]
fn test_group_by_having_and_aggregate_order() {
    let client = client();
    seed_media(&client);

    let crowded = client
        .media()
        .group_by(
            GroupByArgs::new(["type"])
                .aggregates(AggregateFields::new().count_all())
                .having(Having::aggregate(
                    AggregateOp::Count,
                    COUNT_ALL,
                    Condition::Gt(json!(1)),
                ))
                .order_by(OrderBy::asc("type")),
        )
        .unwrap();
    let by_size = client
        .media()
        .group_by(
            GroupByArgs::new(["type"])
                .order_by_aggregate(AggregateOp::Sum, "size", SortOrder::Desc)
                .take(1),
        )
        .unwrap();

    assert_eq!(crowded.len(), 1);
    assert_eq!(crowded[0].key("type"), Some(&json!("image")));
    assert_eq!(by_size.len(), 1);
    assert_eq!(by_size[0].key("type"), Some(&json!("video")));
}

#[test]
fn test_group_by_validation_rules() {
    let client = client();
    seed_media(&client);

    let order_outside_by = client
        .media()
        .group_by(GroupByArgs::new(["type"]).order_by(OrderBy::asc("name")))
        .unwrap_err();
    let having_outside_by = client
        .media()
        .group_by(GroupByArgs::new(["type"]).having(Having::field("name", Condition::Equals(json!("x")))))
        .unwrap_err();
    let paginated_without_order = client
        .media()
        .group_by(GroupByArgs::new(["type"]).take(1))
        .unwrap_err();
    let empty_by = client
        .media()
        .group_by(GroupByArgs::new(Vec::<String>::new()))
        .unwrap_err();

    for err in [&order_outside_by, &having_outside_by, &paginated_without_order, &empty_by] {
        assert_eq!(err.kind(), ExErrorKind::Validation, "{}", err);
        assert_eq!(err.op(), Some("group_by"));
    }
    assert_eq!(order_outside_by.fields(), ["name".to_string()]);
}
