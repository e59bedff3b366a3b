//! Folio Core - entity models and query grammar for the content store
//!
//! This crate holds everything about the data-access layer that does not
//! touch a database:
//! - Entity records and their create/update payloads (User, Post, Project,
//!   Tag, GalleryImage, ContentSection, Media)
//! - Static schemas describing fields, relations and delete behaviour
//! - The query grammar: filters, ordering, pagination, include/select,
//!   nested writes, aggregation and grouping
//! - Boundary validation of queries and payloads
//! - The error facility and structured logging macros
//!
//! `folio-store` compiles these into SQL and runs them.

pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod query;
pub mod rules;

pub use errors::{ExError, ExErrorKind, QueryError, Result};
pub use model::{
    ContentSection, CreateContentSection, CreateGalleryImage, CreateMedia, CreatePost,
    CreateProject, CreateTag, CreateUser, Entity, GalleryImage, Media, Post, Project,
    SectionOwner, Tag, UpdateContentSection, UpdateGalleryImage, UpdateMedia, UpdatePost,
    UpdateProject, UpdateTag, UpdateUser, User,
};
pub use query::{
    AggregateArgs, AggregateFields, AggregateOp, BatchCount, Condition, Filter, FindArgs,
    FindUniqueArgs, GroupByArgs, Having, Include, NestedMany, NestedOne, OrderBy, RelationArgs,
    Select, SortOrder, Unique,
};
