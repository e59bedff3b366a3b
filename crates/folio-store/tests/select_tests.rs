// Integration tests for field projections

mod common;

use common::{client, create_post, create_user};
use folio_core::errors::ExErrorKind;
use folio_core::model::{CreatePost, CreateTag};
use folio_core::query::{
    FindArgs, FindUniqueArgs, Include, NestedMany, OrderBy, RelationArgs, Select, Unique,
};
use folio_store::Repositories;
use serde_json::json;

#[test]
fn test_select_returns_only_requested_fields() {
    let client = client();
    let ada = create_user(&client, "Ada");
    create_post(&client, &ada, "first");
    create_post(&client, &ada, "second");

    let rows = client
        .posts()
        .select_many(
            FindArgs::new().order_by(OrderBy::asc("slug")),
            &Select::fields(["slug", "published"]),
        )
        .unwrap();

    assert_eq!(
        rows,
        vec![
            json!({"slug": "first", "published": false}),
            json!({"slug": "second", "published": false}),
        ]
    );
}

#[test]
fn test_select_relation_narrows_nested_records() {
    // Given
    let client = client();
    let ada = create_user(&client, "Ada");
    let post = client
        .posts()
        .create(
            CreatePost::new("Tagged", "tagged", "e", "c")
                .author_id(ada.id.clone())
                .tags(NestedMany::create([CreateTag::new("b"), CreateTag::new("a")])),
        )
        .unwrap();

    // When
    let select = Select::fields(["title"])
        .relation("author", Select::fields(["email"]))
        .relation_with(
            "tags",
            RelationArgs::new().order_by(OrderBy::asc("name")),
            Some(Select::fields(["name"])),
        )
        .count("tags");
    let row = client
        .posts()
        .select_unique(Unique::id(&post.id), &select)
        .unwrap()
        .unwrap();

    // Then
    assert_eq!(
        row,
        json!({
            "title": "Tagged",
            "author": {"email": "ada@example.com"},
            "tags": [{"name": "a"}, {"name": "b"}],
            "_count": {"tags": 2},
        })
    );
}

#[test]
fn test_select_first_and_missing_unique() {
    let client = client();
    let ada = create_user(&client, "Ada");
    create_post(&client, &ada, "only");

    let first = client
        .posts()
        .select_first(FindArgs::new(), &Select::fields(["slug"]))
        .unwrap();
    let missing = client
        .posts()
        .select_unique(Unique::by("slug", "nope"), &Select::fields(["slug"]))
        .unwrap();

    assert_eq!(first, Some(json!({"slug": "only"})));
    assert!(missing.is_none());
}

#[test]
fn test_select_with_include_is_validation() {
    let client = client();

    let many = client
        .posts()
        .select_many(
            FindArgs::new().include(Include::new().with("author")),
            &Select::fields(["slug"]),
        )
        .unwrap_err();
    let unique = client
        .posts()
        .select_unique(
            FindUniqueArgs::new(Unique::by("slug", "x")).include(Include::new().with("author")),
            &Select::fields(["slug"]),
        )
        .unwrap_err();

    assert_eq!(many.kind(), ExErrorKind::Validation);
    assert_eq!(unique.kind(), ExErrorKind::Validation);
}

#[test]
fn test_select_unknown_field_is_validation() {
    let client = client();

    let err = client
        .users()
        .select_many(FindArgs::new(), &Select::fields(["name", "nickname"]))
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(err.fields(), ["nickname".to_string()]);
}
