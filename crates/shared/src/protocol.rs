use serde::{Deserialize, Serialize};

use crate::domain::PlaceRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPasswordRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserListResponse {
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataSavedResponse {
    #[serde(rename = "imageUrl", default)]
    pub image_url: String,
}

/// Object-storage upload response. `secure_url` is the only field the
/// workflow reads; its absence counts as a failed upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaUploadResponse {
    #[serde(default)]
    pub secure_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlacesResponse {
    #[serde(default)]
    pub places: Vec<PlaceRecord>,
}
