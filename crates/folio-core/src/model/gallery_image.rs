use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::project::Project;
use super::schema::{EntitySchema, GALLERY_IMAGE};
use super::Entity;
use crate::query::NestedOne;

/// An image shown in a project's gallery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub id: String,
    pub url: String,
    pub alt: Option<String>,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Box<Project>>,
}

/// Payload for creating a GalleryImage
///
/// `project_id` may be left empty when nested under a Project create; the
/// owning project is filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGalleryImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_id: String,
}

impl CreateGalleryImage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = Some(alt.into());
        self
    }

    pub fn for_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateGalleryImage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub alt: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Move the image to another project
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<NestedOne>,
}

impl Entity for GalleryImage {
    type Create = CreateGalleryImage;
    type Update = UpdateGalleryImage;

    fn schema() -> &'static EntitySchema {
        &GALLERY_IMAGE
    }

    fn id(&self) -> &str {
        &self.id
    }
}
