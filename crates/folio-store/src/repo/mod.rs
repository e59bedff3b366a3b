//! Typed repositories, one per entity

mod repository;

pub use repository::Repository;
pub(crate) use repository::Scope;
