use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content_section::{ContentSection, CreateContentSection};
use super::schema::{EntitySchema, POST};
use super::tag::{CreateTag, Tag};
use super::user::User;
use super::{Entity, RelationCounts};
use crate::query::{NestedMany, NestedOne};

/// A blog post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub cover_image: Option<String>,
    pub template: Option<String>,
    pub accent_color: Option<String>,
    pub featured: bool,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub category: Option<String>,
    /// Estimated reading time in minutes
    pub read_time: Option<i64>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Box<User>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_sections: Option<Vec<ContentSection>>,
    #[serde(rename = "_count", default, skip_serializing_if = "Option::is_none")]
    pub relation_counts: Option<RelationCounts>,
}

/// Payload for creating a Post
///
/// The author is given either by `author_id` or by `author.connect`. Inside a
/// nested create under a User both may be left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePost {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<NestedOne>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<NestedMany<CreateTag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_sections: Option<NestedMany<CreateContentSection>>,
}

impl CreatePost {
    pub fn new(
        title: impl Into<String>,
        slug: impl Into<String>,
        excerpt: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            slug: slug.into(),
            excerpt: excerpt.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn author_id(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = author_id.into();
        self
    }

    pub fn published(mut self, published: bool) -> Self {
        self.published = Some(published);
        self
    }

    pub fn featured(mut self, featured: bool) -> Self {
        self.featured = Some(featured);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn read_time(mut self, minutes: i64) -> Self {
        self.read_time = Some(minutes);
        self
    }

    pub fn tags(mut self, tags: NestedMany<CreateTag>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn content_sections(mut self, sections: NestedMany<CreateContentSection>) -> Self {
        self.content_sections = Some(sections);
        self
    }
}

/// Patch for updating a Post; `Some(None)` clears a nullable field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdatePost {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub cover_image: Option<Option<String>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub template: Option<Option<String>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub accent_color: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub published_at: Option<Option<DateTime<Utc>>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub category: Option<Option<String>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub read_time: Option<Option<i64>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub meta_title: Option<Option<String>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub meta_description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<NestedOne>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<NestedMany<CreateTag>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_sections: Option<NestedMany<CreateContentSection>>,
}

impl Entity for Post {
    type Create = CreatePost;
    type Update = UpdatePost;

    fn schema() -> &'static EntitySchema {
        &POST
    }

    fn id(&self) -> &str {
        &self.id
    }
}
