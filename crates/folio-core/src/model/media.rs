use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schema::{EntitySchema, MEDIA};
use super::Entity;

/// An uploaded asset; standalone, no relations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: String,
    pub name: String,
    pub url: String,
    /// MIME type or asset kind
    #[serde(rename = "type")]
    pub kind: String,
    /// Size in bytes
    pub size: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMedia {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
}

impl CreateMedia {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        kind: impl Into<String>,
        size: i64,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind: kind.into(),
            size,
            ..Self::default()
        }
    }

    pub fn dimensions(mut self, width: i64, height: i64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateMedia {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub width: Option<Option<i64>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub height: Option<Option<i64>>,
}

impl Entity for Media {
    type Create = CreateMedia;
    type Update = UpdateMedia;

    fn schema() -> &'static EntitySchema {
        &MEDIA
    }

    fn id(&self) -> &str {
        &self.id
    }
}
