use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::post::Post;
use super::project::Project;
use super::schema::{EntitySchema, CONTENT_SECTION};
use super::Entity;

/// A typed block of body content attached to a Post, a Project, or nothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSection {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub metadata: Option<Value>,
    pub order: i64,
    pub post_id: Option<String>,
    pub project_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Box<Post>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Box<Project>>,
}

/// Who a section belongs to; never both a post and a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionOwner {
    Standalone,
    Post(String),
    Project(String),
}

impl ContentSection {
    pub fn owner(&self) -> SectionOwner {
        match (&self.post_id, &self.project_id) {
            (Some(post_id), _) => SectionOwner::Post(post_id.clone()),
            (None, Some(project_id)) => SectionOwner::Project(project_id.clone()),
            (None, None) => SectionOwner::Standalone,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContentSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl CreateContentSection {
    pub fn new(kind: impl Into<String>, content: impl Into<String>, order: i64) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
            order,
            ..Self::default()
        }
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Attach to an owner; `Standalone` clears both links
    pub fn owned_by(mut self, owner: SectionOwner) -> Self {
        let (post_id, project_id) = match owner {
            SectionOwner::Standalone => (None, None),
            SectionOwner::Post(id) => (Some(id), None),
            SectionOwner::Project(id) => (None, Some(id)),
        };
        self.post_id = post_id;
        self.project_id = project_id;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateContentSection {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub metadata: Option<Option<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub post_id: Option<Option<String>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub project_id: Option<Option<String>>,
}

impl Entity for ContentSection {
    type Create = CreateContentSection;
    type Update = UpdateContentSection;

    fn schema() -> &'static EntitySchema {
        &CONTENT_SECTION
    }

    fn id(&self) -> &str {
        &self.id
    }
}
