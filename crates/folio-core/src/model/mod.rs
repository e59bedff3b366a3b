//! Entity models
//!
//! Each entity comes as three types: the record returned by reads (with
//! optional eager-loaded relations), a create payload and an update patch.
//! Payloads serialize to camelCase JSON objects the store engine consumes;
//! omitted optional fields are left out entirely.

pub mod content_section;
pub mod gallery_image;
pub mod media;
pub mod post;
pub mod project;
pub mod schema;
pub mod tag;
pub mod user;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;

pub use content_section::{
    ContentSection, CreateContentSection, SectionOwner, UpdateContentSection,
};
pub use gallery_image::{CreateGalleryImage, GalleryImage, UpdateGalleryImage};
pub use media::{CreateMedia, Media, UpdateMedia};
pub use post::{CreatePost, Post, UpdatePost};
pub use project::{CreateProject, Project, UpdateProject};
pub use schema::EntitySchema;
pub use tag::{CreateTag, Tag, UpdateTag};
pub use user::{CreateUser, UpdateUser, User};

/// Sizes of to-many relations requested through `Include::count`
pub type RelationCounts = BTreeMap<String, i64>;

/// A persisted entity with its schema and write payload types
pub trait Entity: Serialize + DeserializeOwned + Clone + Debug + Send {
    /// Payload accepted by `create`
    type Create: Serialize;
    /// Patch accepted by `update`; unset fields are left untouched
    type Update: Serialize;

    fn schema() -> &'static EntitySchema;

    /// Primary key of this record
    fn id(&self) -> &str;
}
