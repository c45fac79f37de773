//! Cloudinary upload backend.
//!
//! Uses the unsigned upload endpoint with a preconfigured upload preset.
//! Each upload carries a public id derived from the staged filename, so a
//! failed attempt never leaves remote state that could collide with a later
//! retry of the same image under a different staged name.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use snapguard_core::config::CloudinaryConfig;

use crate::{UploadBackend, UploadError};

pub struct CloudinaryBackend {
    config: CloudinaryConfig,
    client: reqwest::Client,
}

impl CloudinaryBackend {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn err(&self, message: impl Into<String>) -> UploadError {
        UploadError::Backend {
            name: "cloudinary".to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl UploadBackend for CloudinaryBackend {
    fn name(&self) -> &str {
        "cloudinary"
    }

    async fn upload(&self, path: &Path) -> Result<String, UploadError> {
        let bytes = tokio::fs::read(path).await?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| self.err("Path has no file name"))?
            .to_string();
        // Staged filenames already carry a unique id; reusing the stem keeps
        // remote assets one-to-one with local copies.
        let public_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("screenshot")
            .to_string();

        debug!(file = %file_name, "Uploading to Cloudinary");

        let form = reqwest::multipart::Form::new()
            .text("upload_preset", self.config.upload_preset.clone())
            .text("folder", self.config.folder.clone())
            .text("public_id", public_id)
            .text("overwrite", "false")
            .text("tags", self.config.tags.join(","))
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );

        let endpoint = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        );

        let response = self
            .client
            .post(&endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.err(format!("HTTP {}", response.status())));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.err(format!("Invalid response body: {}", e)))?;

        body.get("secure_url")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| self.err("Response missing secure_url"))
    }
}
