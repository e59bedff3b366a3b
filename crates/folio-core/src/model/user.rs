use chrono::{DateTime, Utc};
use folio_core_types::Sensitive;
use serde::{Deserialize, Serialize};

use super::post::{CreatePost, Post};
use super::project::{CreateProject, Project};
use super::schema::{EntitySchema, USER};
use super::{Entity, RelationCounts};
use crate::query::NestedMany;

/// An author account
///
/// `password` holds whatever credential representation the caller stores
/// (normally a hash); it is redacted from `Debug` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: Sensitive<String>,
    pub role: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<Vec<Post>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<Project>>,
    #[serde(rename = "_count", default, skip_serializing_if = "Option::is_none")]
    pub relation_counts: Option<RelationCounts>,
}

/// Payload for creating a User
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub password: Sensitive<String>,
    /// Defaults to `"user"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<NestedMany<CreatePost>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<NestedMany<CreateProject>>,
}

impl CreateUser {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: Sensitive::new(password.into()),
            ..Self::default()
        }
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Patch for updating a User
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<Sensitive<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub image: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posts: Option<NestedMany<CreatePost>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<NestedMany<CreateProject>>,
}

impl Entity for User {
    type Create = CreateUser;
    type Update = UpdateUser;

    fn schema() -> &'static EntitySchema {
        &USER
    }

    fn id(&self) -> &str {
        &self.id
    }
}
