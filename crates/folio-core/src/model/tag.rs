use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::post::{CreatePost, Post};
use super::project::{CreateProject, Project};
use super::schema::{EntitySchema, TAG};
use super::{Entity, RelationCounts};
use crate::query::NestedMany;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<Vec<Post>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<Project>>,
    #[serde(rename = "_count", default, skip_serializing_if = "Option::is_none")]
    pub relation_counts: Option<RelationCounts>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<NestedMany<CreatePost>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<NestedMany<CreateProject>>,
}

impl CreateTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateTag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posts: Option<NestedMany<CreatePost>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<NestedMany<CreateProject>>,
}

impl Entity for Tag {
    type Create = CreateTag;
    type Update = UpdateTag;

    fn schema() -> &'static EntitySchema {
        &TAG
    }

    fn id(&self) -> &str {
        &self.id
    }
}
