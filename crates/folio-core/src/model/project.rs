use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content_section::{ContentSection, CreateContentSection};
use super::gallery_image::{CreateGalleryImage, GalleryImage};
use super::schema::{EntitySchema, PROJECT};
use super::tag::{CreateTag, Tag};
use super::user::User;
use super::{Entity, RelationCounts};
use crate::query::{NestedMany, NestedOne};

/// A portfolio project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub content: String,
    pub cover_image: Option<String>,
    pub template: Option<String>,
    pub accent_color: Option<String>,
    pub featured: bool,
    pub published: bool,
    pub category: Option<String>,
    pub demo_url: Option<String>,
    pub repo_url: Option<String>,
    pub completed_date: Option<DateTime<Utc>>,
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gallery_images: Option<Vec<GalleryImage>>,
    #[serde(rename = "_count", default, skip_serializing_if = "Option::is_none")]
    pub relation_counts: Option<RelationCounts>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub slug: String,
    pub description: String,
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
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gallery_images: Option<NestedMany<CreateGalleryImage>>,
}

impl CreateProject {
    pub fn new(
        title: impl Into<String>,
        slug: impl Into<String>,
        description: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            slug: slug.into(),
            description: description.into(),
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

    pub fn tags(mut self, tags: NestedMany<CreateTag>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn gallery_images(mut self, images: NestedMany<CreateGalleryImage>) -> Self {
        self.gallery_images = Some(images);
        self
    }

    pub fn content_sections(mut self, sections: NestedMany<CreateContentSection>) -> Self {
        self.content_sections = Some(sections);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateProject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
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
    pub category: Option<Option<String>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub demo_url: Option<Option<String>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub repo_url: Option<Option<String>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub completed_date: Option<Option<DateTime<Utc>>>,
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gallery_images: Option<NestedMany<CreateGalleryImage>>,
}

impl Entity for Project {
    type Create = CreateProject;
    type Update = UpdateProject;

    fn schema() -> &'static EntitySchema {
        &PROJECT
    }

    fn id(&self) -> &str {
        &self.id
    }
}
