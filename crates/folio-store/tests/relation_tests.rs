// Integration tests for relation loading (include, _count) and nested writes

mod common;

use common::{client, create_post, create_project, create_user};
use folio_core::errors::ExErrorKind;
use folio_core::model::{
    CreateContentSection, CreateGalleryImage, CreatePost, CreateProject, CreateTag,
    SectionOwner, UpdatePost, UpdateProject,
};
use folio_core::query::{
    Filter, FindArgs, FindUniqueArgs, Include, NestedMany, NestedOne, OrderBy, RelationArgs,
    Unique,
};
use folio_store::Repositories;

#[test]
fn test_include_belongs_to_loads_author() {
    // Given
    let client = client();
    let ada = create_user(&client, "Ada");
    let post = create_post(&client, &ada, "hello");

    // When
    let loaded = client
        .posts()
        .find_unique(FindUniqueArgs::new(Unique::id(&post.id)).include(Include::new().with("author")))
        .unwrap()
        .unwrap();
    let plain = client.posts().find_unique(Unique::id(&post.id)).unwrap().unwrap();

    // Then
    let author = loaded.author.expect("author should be loaded");
    assert_eq!(author.email, "ada@example.com");
    assert!(plain.author.is_none());
}

#[test]
fn test_nested_create_of_gallery_images_links_to_project() {
    // Given
    let client = client();
    let ada = create_user(&client, "Ada");

    // When
    let project = client
        .projects()
        .create(
            CreateProject::new("Portfolio", "portfolio", "d", "c")
                .author_id(ada.id.clone())
                .gallery_images(NestedMany::create([
                    CreateGalleryImage::new("https://img/1.png").alt("one"),
                    CreateGalleryImage::new("https://img/2.png"),
                ])),
        )
        .unwrap();

    // Then
    let images = client
        .gallery_images()
        .find_many(FindArgs::new().filter(Filter::eq("projectId", project.id.clone())))
        .unwrap();
    assert_eq!(images.len(), 2);
    assert!(images.iter().all(|i| i.project_id == project.id));

    let with_images = client
        .projects()
        .find_unique(
            FindUniqueArgs::new(Unique::id(&project.id)).include(Include::new().with_args(
                "galleryImages",
                RelationArgs::new().order_by(OrderBy::asc("url")),
            )),
        )
        .unwrap()
        .unwrap();
    let urls: Vec<_> = with_images
        .gallery_images
        .unwrap()
        .into_iter()
        .map(|i| i.url)
        .collect();
    assert_eq!(urls, ["https://img/1.png", "https://img/2.png"]);
}

#[test]
fn test_include_take_applies_per_parent() {
    // Given: two authors with three posts each
    let client = client();
    for name in ["Ada", "Bob"] {
        let user = create_user(&client, name);
        for i in 0..3 {
            create_post(&client, &user, &format!("{}-{}", name.to_lowercase(), i));
        }
    }

    // When
    let users = client
        .users()
        .find_many(
            FindArgs::new().order_by(OrderBy::asc("name")).include(Include::new().with_args(
                "posts",
                RelationArgs::new().order_by(OrderBy::desc("slug")).take(2),
            )),
        )
        .unwrap();

    // Then
    assert_eq!(users.len(), 2);
    let ada: Vec<_> = users[0].posts.as_ref().unwrap().iter().map(|p| p.slug.clone()).collect();
    let bob: Vec<_> = users[1].posts.as_ref().unwrap().iter().map(|p| p.slug.clone()).collect();
    assert_eq!(ada, ["ada-2", "ada-1"]);
    assert_eq!(bob, ["bob-2", "bob-1"]);
}

#[test]
fn test_include_filter_and_empty_to_many() {
    let client = client();
    let ada = create_user(&client, "Ada");
    let idle = create_user(&client, "Idle");
    client
        .posts()
        .create(CreatePost::new("p", "pub", "e", "c").author_id(ada.id.clone()).published(true))
        .unwrap();
    create_post(&client, &ada, "draft");

    let include = Include::new().with_args(
        "posts",
        RelationArgs::new().filter(Filter::eq("published", true)),
    );
    let ada_loaded = client
        .users()
        .find_unique(FindUniqueArgs::new(Unique::id(&ada.id)).include(include.clone()))
        .unwrap()
        .unwrap();
    let idle_loaded = client
        .users()
        .find_unique(FindUniqueArgs::new(Unique::id(&idle.id)).include(include))
        .unwrap()
        .unwrap();

    assert_eq!(ada_loaded.posts.unwrap().len(), 1);
    assert_eq!(idle_loaded.posts, Some(Vec::new()));
}

#[test]
fn test_nested_include_loads_two_levels() {
    let client = client();
    let ada = create_user(&client, "Ada");
    client
        .posts()
        .create(
            CreatePost::new("t", "tagged", "e", "c")
                .author_id(ada.id.clone())
                .tags(NestedMany::create([CreateTag::new("rust")])),
        )
        .unwrap();

    let user = client
        .users()
        .find_unique(
            FindUniqueArgs::new(Unique::id(&ada.id)).include(
                Include::new().with_args("posts", RelationArgs::new().include(Include::new().with("tags"))),
            ),
        )
        .unwrap()
        .unwrap();

    let posts = user.posts.unwrap();
    let tags = posts[0].tags.as_ref().unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "rust");
}

#[test]
fn test_relation_counts() {
    let client = client();
    let ada = create_user(&client, "Ada");
    let idle = create_user(&client, "Idle");
    create_post(&client, &ada, "one");
    create_post(&client, &ada, "two");
    create_project(&client, &ada, "proj");

    let users = client
        .users()
        .find_many(
            FindArgs::new()
                .order_by(OrderBy::asc("name"))
                .include(Include::new().count("posts").count("projects")),
        )
        .unwrap();

    let ada_counts = users[0].relation_counts.as_ref().unwrap();
    let idle_counts = users[1].relation_counts.as_ref().unwrap();
    assert_eq!(ada_counts.get("posts"), Some(&2));
    assert_eq!(ada_counts.get("projects"), Some(&1));
    assert_eq!(idle_counts.get("posts"), Some(&0));
    assert_eq!(users[1].id, idle.id);
}

#[test]
fn test_tags_connect_or_create_set_and_disconnect() {
    // Given
    let client = client();
    let ada = create_user(&client, "Ada");
    let existing = client.tags().create(CreateTag::new("rust")).unwrap();
    let post = create_post(&client, &ada, "tagging");
    let tag_names = |id: &str| -> Vec<String> {
        let post = client
            .posts()
            .find_unique(FindUniqueArgs::new(Unique::id(id)).include(Include::new().with_args(
                "tags",
                RelationArgs::new().order_by(OrderBy::asc("name")),
            )))
            .unwrap()
            .unwrap();
        post.tags.unwrap().into_iter().map(|t| t.name).collect()
    };

    // When: connectOrCreate reuses the existing tag and creates a new one
    client
        .posts()
        .update(
            Unique::id(&post.id),
            UpdatePost {
                tags: Some(
                    NestedMany::default()
                        .and_connect_or_create(Unique::by("name", "rust"), CreateTag::new("rust"))
                        .and_connect_or_create(Unique::by("name", "sql"), CreateTag::new("sql")),
                ),
                ..UpdatePost::default()
            },
        )
        .unwrap();

    // Then
    assert_eq!(tag_names(&post.id), ["rust", "sql"]);
    assert_eq!(client.tags().count(None).unwrap(), 2);

    // When: disconnect one link
    client
        .posts()
        .update(
            Unique::id(&post.id),
            UpdatePost {
                tags: Some(NestedMany::default().and_disconnect(Unique::id(&existing.id))),
                ..UpdatePost::default()
            },
        )
        .unwrap();
    assert_eq!(tag_names(&post.id), ["sql"]);

    // When: set replaces the whole link set
    client
        .posts()
        .update(
            Unique::id(&post.id),
            UpdatePost {
                tags: Some(NestedMany::set([Unique::by("name", "rust")])),
                ..UpdatePost::default()
            },
        )
        .unwrap();
    assert_eq!(tag_names(&post.id), ["rust"]);

    // the tags themselves survive unlinking
    assert_eq!(client.tags().count(None).unwrap(), 2);
}

#[test]
fn test_connect_missing_target_is_not_found_and_rolls_back() {
    let client = client();
    let ada = create_user(&client, "Ada");

    let err = client
        .posts()
        .create(
            CreatePost::new("t", "ghost-tags", "e", "c")
                .author_id(ada.id.clone())
                .tags(NestedMany::connect([Unique::by("name", "missing")])),
        )
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::NotFound);
    assert_eq!(client.posts().count(None).unwrap(), 0);
}

#[test]
fn test_author_connect_sets_foreign_key() {
    let client = client();
    let ada = create_user(&client, "Ada");

    let post = client
        .posts()
        .create(CreatePost {
            author: Some(NestedOne::connect(Unique::by("email", "ada@example.com"))),
            ..CreatePost::new("t", "connected", "e", "c")
        })
        .unwrap();
    let missing = client
        .posts()
        .create(CreatePost {
            author: Some(NestedOne::connect(Unique::by("email", "nobody@example.com"))),
            ..CreatePost::new("t", "orphan", "e", "c")
        })
        .unwrap_err();

    assert_eq!(post.author_id, ada.id);
    assert_eq!(missing.kind(), ExErrorKind::NotFound);
}

#[test]
fn test_content_section_cannot_belong_to_post_and_project() {
    let client = client();
    let ada = create_user(&client, "Ada");
    let post = create_post(&client, &ada, "p");
    let project = create_project(&client, &ada, "q");

    let err = client
        .content_sections()
        .create(CreateContentSection {
            post_id: Some(post.id.clone()),
            project_id: Some(project.id.clone()),
            ..CreateContentSection::new("text", "both", 0)
        })
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(err.fields(), ["postId".to_string(), "projectId".to_string()]);
}

#[test]
fn test_moving_section_onto_second_owner_is_validation() {
    // Given: a section owned by a post
    let client = client();
    let ada = create_user(&client, "Ada");
    let post = client
        .posts()
        .create(
            CreatePost::new("t", "with-sections", "e", "c")
                .author_id(ada.id.clone())
                .content_sections(NestedMany::create([CreateContentSection::new("text", "intro", 0)])),
        )
        .unwrap();
    let project = create_project(&client, &ada, "proj");
    let section = client
        .content_sections()
        .find_first(FindArgs::new().filter(Filter::eq("postId", post.id.clone())))
        .unwrap()
        .unwrap();
    assert_eq!(section.owner(), SectionOwner::Post(post.id.clone()));

    // When: the project connects it without clearing the post link
    let err = client
        .projects()
        .update(
            Unique::id(&project.id),
            UpdateProject {
                content_sections: Some(NestedMany::connect([Unique::id(&section.id)])),
                ..UpdateProject::default()
            },
        )
        .unwrap_err();

    // Then
    assert_eq!(err.kind(), ExErrorKind::Validation);
}

#[test]
fn test_owned_children_disconnect_and_delete() {
    let client = client();
    let ada = create_user(&client, "Ada");
    let post = client
        .posts()
        .create(
            CreatePost::new("t", "owner", "e", "c")
                .author_id(ada.id.clone())
                .content_sections(NestedMany::create([
                    CreateContentSection::new("text", "keep", 0),
                    CreateContentSection::new("text", "drop", 1),
                ])),
        )
        .unwrap();
    let section = |content: &str| {
        client
            .content_sections()
            .find_first(FindArgs::new().filter(Filter::eq("content", content)))
            .unwrap()
            .unwrap()
    };
    let keep = section("keep");
    let drop = section("drop");

    client
        .posts()
        .update(
            Unique::id(&post.id),
            UpdatePost {
                content_sections: Some(
                    NestedMany::default()
                        .and_disconnect(Unique::id(&keep.id))
                        .and_delete(Unique::id(&drop.id)),
                ),
                ..UpdatePost::default()
            },
        )
        .unwrap();

    let kept = client.content_sections().find_unique(Unique::id(&keep.id)).unwrap().unwrap();
    assert_eq!(kept.post_id, None);
    assert!(client.content_sections().find_unique(Unique::id(&drop.id)).unwrap().is_none());
}

#[test]
fn test_nested_writes_rejected_in_bulk_operations() {
    let client = client();
    let ada = create_user(&client, "Ada");

    let err = client
        .posts()
        .create_many(
            vec![CreatePost::new("t", "bulk", "e", "c")
                .author_id(ada.id.clone())
                .tags(NestedMany::create([CreateTag::new("x")]))],
            false,
        )
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(err.fields(), ["tags".to_string()]);
    assert_eq!(client.posts().count(None).unwrap(), 0);
}

#[test]
fn test_gallery_image_disconnect_is_unsupported() {
    let client = client();
    let ada = create_user(&client, "Ada");
    let project = create_project(&client, &ada, "gallery");

    let err = client
        .projects()
        .update(
            Unique::id(&project.id),
            UpdateProject {
                gallery_images: Some(NestedMany::default().and_disconnect(Unique::id("any"))),
                ..UpdateProject::default()
            },
        )
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(err.fields(), ["galleryImages".to_string()]);
}

#[test]
fn test_include_and_counts_span_more_parents_than_sqlite_variables() {
    // Given: more tags than SQLite allows bound variables in one statement
    let client = client();
    let ada = create_user(&client, "Ada");
    let tags: Vec<CreateTag> = (0..33_000).map(|i| CreateTag::new(format!("tag-{i:05}"))).collect();
    let created = client.tags().create_many(tags, false).unwrap();
    assert_eq!(created.count, 33_000);
    client
        .posts()
        .create(
            CreatePost::new("t", "linked", "e", "c")
                .author_id(ada.id.clone())
                .tags(NestedMany::connect([Unique::by("name", "tag-32999")])),
        )
        .unwrap();

    // When
    let loaded = client
        .tags()
        .find_many(
            FindArgs::new()
                .order_by(OrderBy::asc("name"))
                .include(Include::new().with("posts").count("posts")),
        )
        .unwrap();

    // Then
    assert_eq!(loaded.len(), 33_000);
    let last = &loaded[32_999];
    assert_eq!(last.posts.as_ref().map(Vec::len), Some(1));
    assert_eq!(last.relation_counts.as_ref().unwrap().get("posts"), Some(&1));
    let first = &loaded[0];
    assert_eq!(first.posts, Some(Vec::new()));
    assert_eq!(first.relation_counts.as_ref().unwrap().get("posts"), Some(&0));
}
