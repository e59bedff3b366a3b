// Integration tests for ordering, skip/take, cursors and distinct

mod common;

use std::collections::HashSet;

use common::{client, create_user, seed_posts};
use folio_core::errors::ExErrorKind;
use folio_core::model::{CreatePost, Post};
use folio_core::query::{Filter, FindArgs, OrderBy, Unique};
use folio_store::{FolioClient, Repositories};

fn page(client: &FolioClient, args: FindArgs) -> Vec<String> {
    client
        .posts()
        .find_many(args)
        .unwrap()
        .into_iter()
        .map(|p: Post| p.slug)
        .collect()
}

#[test]
fn test_skip_and_take_window() {
    let client = client();
    seed_posts(&client, 5);

    let window = page(
        &client,
        FindArgs::new().order_by(OrderBy::asc("slug")).skip(1).take(2),
    );

    assert_eq!(window, ["post-1", "post-2"]);
}

#[test]
fn test_descending_order() {
    let client = client();
    seed_posts(&client, 3);

    let slugs = page(&client, FindArgs::new().order_by(OrderBy::desc("slug")));

    assert_eq!(slugs, ["post-2", "post-1", "post-0"]);
}

#[test]
fn test_nulls_placement_is_explicit() {
    // Given: two posts with a read time and one without
    let client = client();
    let ada = create_user(&client, "Ada");
    for (slug, minutes) in [("a", Some(3)), ("b", None), ("c", Some(1))] {
        let mut post = CreatePost::new("t", slug, "e", "c").author_id(ada.id.clone());
        if let Some(m) = minutes {
            post = post.read_time(m);
        }
        client.posts().create(post).unwrap();
    }

    // When / Then
    let first = page(
        &client,
        FindArgs::new().order_by(OrderBy::asc("readTime").nulls_first()),
    );
    let last = page(
        &client,
        FindArgs::new().order_by(OrderBy::asc("readTime").nulls_last()),
    );
    assert_eq!(first, ["b", "c", "a"]);
    assert_eq!(last, ["c", "a", "b"]);
}

#[test]
fn test_cursor_pages_are_disjoint_and_cover_everything() {
    // Given
    let client = client();
    seed_posts(&client, 7);
    let order = || OrderBy::asc("slug");

    // When: walk the table two rows at a time
    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let mut args = FindArgs::new().order_by(order()).take(2);
        if let Some(slug) = &cursor {
            args = args.cursor(Unique::by("slug", slug.clone())).skip(1);
        }
        let batch = page(&client, args);
        if batch.is_empty() {
            break;
        }
        cursor = batch.last().cloned();
        seen.extend(batch);
    }

    // Then
    let unique: HashSet<_> = seen.iter().collect();
    assert_eq!(seen.len(), 7);
    assert_eq!(unique.len(), 7);
    assert_eq!(seen.first().map(String::as_str), Some("post-0"));
    assert_eq!(seen.last().map(String::as_str), Some("post-6"));
}

#[test]
fn test_cursor_includes_its_own_row_without_skip() {
    let client = client();
    seed_posts(&client, 4);

    let slugs = page(
        &client,
        FindArgs::new()
            .order_by(OrderBy::asc("slug"))
            .cursor(Unique::by("slug", "post-2"))
            .take(5),
    );

    assert_eq!(slugs, ["post-2", "post-3"]);
}

#[test]
fn test_missing_cursor_row_yields_empty_page() {
    let client = client();
    seed_posts(&client, 2);

    let slugs = page(
        &client,
        FindArgs::new().cursor(Unique::by("slug", "gone")).take(2),
    );

    assert!(slugs.is_empty());
}

#[test]
fn test_negative_take_reads_backwards_in_requested_order() {
    let client = client();
    seed_posts(&client, 5);

    let tail = page(
        &client,
        FindArgs::new().order_by(OrderBy::asc("slug")).take(-2),
    );
    let before_cursor = page(
        &client,
        FindArgs::new()
            .order_by(OrderBy::asc("slug"))
            .cursor(Unique::by("slug", "post-3"))
            .skip(1)
            .take(-2),
    );

    assert_eq!(tail, ["post-3", "post-4"]);
    assert_eq!(before_cursor, ["post-1", "post-2"]);
}

#[test]
fn test_find_first_honours_order_and_negative_take() {
    let client = client();
    seed_posts(&client, 3);

    let first = client
        .posts()
        .find_first(FindArgs::new().order_by(OrderBy::desc("slug")))
        .unwrap()
        .unwrap();
    let last = client
        .posts()
        .find_first(FindArgs::new().order_by(OrderBy::asc("slug")).take(-1))
        .unwrap()
        .unwrap();

    assert_eq!(first.slug, "post-2");
    assert_eq!(last.slug, "post-2");
}

#[test]
fn test_distinct_keeps_first_row_per_value() {
    // Given: categories rust, rust, sql
    let client = client();
    let ada = create_user(&client, "Ada");
    for (slug, category) in [("a", "rust"), ("b", "rust"), ("c", "sql")] {
        client
            .posts()
            .create(
                CreatePost::new("t", slug, "e", "c")
                    .author_id(ada.id.clone())
                    .category(category),
            )
            .unwrap();
    }

    // When
    let slugs = page(
        &client,
        FindArgs::new()
            .order_by(OrderBy::asc("slug"))
            .distinct(["category"]),
    );
    let limited = page(
        &client,
        FindArgs::new()
            .order_by(OrderBy::asc("slug"))
            .distinct(["category"])
            .take(1)
            .skip(1),
    );

    // Then
    assert_eq!(slugs, ["a", "c"]);
    assert_eq!(limited, ["c"]);
}

#[test]
fn test_order_by_unknown_field_is_validation() {
    let client = client();

    let err = client
        .posts()
        .find_many(FindArgs::new().order_by(OrderBy::asc("popularity")))
        .unwrap_err();
    let json_order = client
        .content_sections()
        .find_many(FindArgs::new().order_by(OrderBy::asc("metadata")))
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(json_order.kind(), ExErrorKind::Validation);
}

#[test]
fn test_filter_and_pagination_compose() {
    let client = client();
    seed_posts(&client, 6);

    let slugs = page(
        &client,
        FindArgs::new()
            .filter(Filter::not_in("slug", ["post-0", "post-1"]))
            .order_by(OrderBy::desc("slug"))
            .skip(1)
            .take(2),
    );

    assert_eq!(slugs, ["post-4", "post-3"]);
}
