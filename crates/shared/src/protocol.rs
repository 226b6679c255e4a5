use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Cursor, ImageId};

/// Read-only copy of an image owned by the remote collection service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: ImageId,
    pub title: String,
    pub description: String,
    pub url: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// One page of `GET /collection`. `after` is absent on the last page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePage {
    pub data: Vec<ImageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Cursor>,
}

impl ImagePage {
    pub fn is_last(&self) -> bool {
        self.after.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListImagesQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Cursor>,
}

/// Body of `POST /collection`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateImageRequest {
    pub url: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImageData {
    pub url: String,
}

/// Upload endpoints either answer with the url directly or wrap it the way
/// hosted image services do (`{"data": {"url": ...}}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadResponse {
    Direct { url: String },
    Wrapped { data: UploadedImageData },
}

impl UploadResponse {
    pub fn into_url(self) -> String {
        match self {
            Self::Direct { url } => url,
            Self::Wrapped { data } => data.url,
        }
    }
}
