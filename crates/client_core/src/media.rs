use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{multipart, Client};

use shared::protocol::MediaUploadResponse;

/// External object storage accepting direct uploads and answering with a
/// public URL for the stored asset.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Returns the secure URL of the stored asset, or `None` when the
    /// provider answered without one.
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<Option<String>>;
}

pub struct MissingMediaStore;

#[async_trait]
impl MediaStore for MissingMediaStore {
    async fn upload(&self, _filename: &str, _bytes: Vec<u8>) -> Result<Option<String>> {
        Err(anyhow!("no object storage configured"))
    }
}

/// Unsigned direct upload: multipart `file` + `upload_preset`, no signing
/// step; the preset governs what the provider accepts.
pub struct UnsignedMediaUpload {
    http: Client,
    endpoint: String,
    upload_preset: String,
}

impl UnsignedMediaUpload {
    pub fn new(endpoint: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            upload_preset: upload_preset.into(),
        }
    }
}

#[async_trait]
impl MediaStore for UnsignedMediaUpload {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<Option<String>> {
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        let response: MediaUploadResponse = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("object storage returned an unreadable response")?;

        Ok(response.secure_url)
    }
}
