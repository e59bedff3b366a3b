// Shared fixtures for folio-store integration tests

use folio_core::model::{CreatePost, CreateProject, CreateUser, Post, Project, User};
use folio_store::{FolioClient, Repositories, StoreConfig};

/// Fresh in-memory store with migrations applied
#[allow(dead_code)]
pub fn client() -> FolioClient {
    FolioClient::connect(StoreConfig::in_memory()).unwrap()
}

#[allow(dead_code)]
pub fn client_with(config: StoreConfig) -> FolioClient {
    FolioClient::connect(config).unwrap()
}

#[allow(dead_code)]
pub fn create_user(client: &FolioClient, name: &str) -> User {
    let email = format!("{}@example.com", name.to_lowercase());
    client
        .users()
        .create(CreateUser::new(name, email, "secret"))
        .unwrap()
}

#[allow(dead_code)]
pub fn create_post(client: &FolioClient, author: &User, slug: &str) -> Post {
    client
        .posts()
        .create(
            CreatePost::new(format!("Post {}", slug), slug, "excerpt", "body")
                .author_id(author.id.clone()),
        )
        .unwrap()
}

#[allow(dead_code)]
pub fn create_project(client: &FolioClient, author: &User, slug: &str) -> Project {
    client
        .projects()
        .create(
            CreateProject::new(format!("Project {}", slug), slug, "description", "body")
                .author_id(author.id.clone()),
        )
        .unwrap()
}

/// Author plus `n` posts with slugs `post-0..n`
#[allow(dead_code)]
pub fn seed_posts(client: &FolioClient, n: usize) -> (User, Vec<Post>) {
    let author = create_user(client, "Ada");
    let posts = (0..n)
        .map(|i| create_post(client, &author, &format!("post-{}", i)))
        .collect();
    (author, posts)
}
