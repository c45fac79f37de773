//! Imgur upload backend (anonymous, Client-ID auth).
//!
//! Posts the image as base64 JSON and reads the public link from the
//! response. Used as the backup behind Cloudinary.

use std::path::Path;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

use snapguard_core::config::ImgurConfig;

use crate::{UploadBackend, UploadError};

const IMGUR_UPLOAD_URL: &str = "https://api.imgur.com/3/image";

pub struct ImgurBackend {
    config: ImgurConfig,
    client: reqwest::Client,
}

impl ImgurBackend {
    pub fn new(config: ImgurConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn err(&self, message: impl Into<String>) -> UploadError {
        UploadError::Backend {
            name: "imgur".to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl UploadBackend for ImgurBackend {
    fn name(&self) -> &str {
        "imgur"
    }

    async fn upload(&self, path: &Path) -> Result<String, UploadError> {
        let bytes = tokio::fs::read(path).await?;
        let encoded = STANDARD.encode(&bytes);

        debug!(path = %path.display(), "Uploading to Imgur");

        let response = self
            .client
            .post(IMGUR_UPLOAD_URL)
            .header(
                "Authorization",
                format!("Client-ID {}", self.config.client_id),
            )
            .json(&serde_json::json!({
                "image": encoded,
                "type": "base64",
            }))
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

        if body.get("success").and_then(|v| v.as_bool()) != Some(true) {
            return Err(self.err("Response reported failure"));
        }

        body.get("data")
            .and_then(|d| d.get("link"))
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| self.err("Response missing data.link"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_backend() -> ImgurBackend {
        ImgurBackend::new(ImgurConfig {
            client_id: "client123".to_string(),
        })
    }

    #[test]
    fn test_backend_name() {
        assert_eq!(make_backend().name(), "imgur");
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_io_error() {
        let backend = make_backend();
        let err = backend
            .upload(Path::new("/nonexistent/screenshot.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Io(_)));
    }
}
