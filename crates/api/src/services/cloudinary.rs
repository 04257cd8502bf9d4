//! Cloudinary upload API client.
//!
//! Uploads and deletions are signed requests: the signature is the SHA-256
//! hex digest of the alphabetically sorted `key=value` parameters joined with
//! `&`, followed by the API secret.

use std::fmt;

use chrono::Utc;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::CloudinaryConfig;
use crate::models::ImageAsset;

/// Cloudinary API base URL.
const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Errors from the image host.
#[derive(Debug, Error)]
pub enum CloudinaryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cloudinary returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("asset not found: {0}")]
    NotFound(String),
}

/// Cloudinary resource family of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Image,
    /// Non-media files such as PDFs.
    Raw,
}

impl ResourceType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Raw => "raw",
        }
    }

    /// Pick the resource type for an uploaded file's content type.
    #[must_use]
    pub fn for_content_type(content_type: &str) -> Self {
        if content_type.eq_ignore_ascii_case("application/pdf") {
            Self::Raw
        } else {
            Self::Image
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file received from a multipart request, ready to upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Client for Cloudinary's upload API.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: Client,
    cloud_name: String,
    api_key: String,
    api_secret: SecretString,
}

impl fmt::Debug for CloudinaryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryClient")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl CloudinaryClient {
    #[must_use]
    pub fn new(config: &CloudinaryConfig) -> Self {
        Self {
            client: Client::new(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        }
    }

    fn endpoint(&self, resource_type: ResourceType, action: &str) -> String {
        format!(
            "{CLOUDINARY_API_BASE}/{}/{resource_type}/{action}",
            self.cloud_name
        )
    }

    /// Upload a file into `folder`.
    ///
    /// # Errors
    ///
    /// Returns `CloudinaryError::Api` if Cloudinary rejects the upload.
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.bytes.len()))]
    pub async fn upload(
        &self,
        file: UploadFile,
        folder: &str,
        resource_type: ResourceType,
    ) -> Result<ImageAsset, CloudinaryError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[("folder", folder), ("timestamp", &timestamp)],
            self.api_secret.expose_secret(),
        );

        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.content_type)?;

        let form = Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("folder", folder.to_owned())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(self.endpoint(resource_type, "upload"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &response.text().await?));
        }

        let uploaded: UploadResponse = response.json().await?;
        debug!(public_id = %uploaded.public_id, "Uploaded asset");

        Ok(ImageAsset {
            secure_url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }

    /// Delete an asset by public id.
    ///
    /// # Errors
    ///
    /// Returns `CloudinaryError::NotFound` if Cloudinary does not know the asset.
    #[instrument(skip(self))]
    pub async fn destroy(
        &self,
        public_id: &str,
        resource_type: ResourceType,
    ) -> Result<(), CloudinaryError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[("public_id", public_id), ("timestamp", &timestamp)],
            self.api_secret.expose_secret(),
        );

        let params = [
            ("public_id", public_id),
            ("api_key", self.api_key.as_str()),
            ("timestamp", timestamp.as_str()),
            ("signature_algorithm", "sha256"),
            ("signature", signature.as_str()),
        ];

        let response = self
            .client
            .post(self.endpoint(resource_type, "destroy"))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &response.text().await?));
        }

        let body: DestroyResponse = response.json().await?;
        match body.result.as_str() {
            "ok" => Ok(()),
            "not found" => Err(CloudinaryError::NotFound(public_id.to_owned())),
            other => Err(CloudinaryError::Api {
                status: status.as_u16(),
                message: other.to_owned(),
            }),
        }
    }

    /// Delete assets, logging failures instead of returning them.
    ///
    /// Used after the database change has already committed.
    pub async fn destroy_quietly(&self, assets: &[ImageAsset]) {
        for asset in assets {
            let resource_type = if asset.secure_url.contains("/raw/") {
                ResourceType::Raw
            } else {
                ResourceType::Image
            };
            if let Err(e) = self.destroy(&asset.public_id, resource_type).await {
                warn!(public_id = %asset.public_id, error = %e, "Failed to delete hosted asset");
            }
        }
    }
}

fn api_error(status: u16, body: &str) -> CloudinaryError {
    let message = serde_json::from_str::<ErrorBody>(body).map_or_else(
        |_| body.chars().take(200).collect(),
        |parsed| parsed.error.message,
    );
    CloudinaryError::Api { status, message }
}

/// Sign request parameters with the API secret.
fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_sorts_parameters() {
        let forward = sign(
            &[("folder", "store/images"), ("timestamp", "1700000000")],
            "abcd1234secret",
        );
        let reversed = sign(
            &[("timestamp", "1700000000"), ("folder", "store/images")],
            "abcd1234secret",
        );
        assert_eq!(forward, reversed);
        assert_eq!(
            forward,
            "c23c8fbeb6e9d64e4081d9c0b7ab719e16946202c51258fee25d77f6b788b3a2"
        );
    }

    #[test]
    fn test_sign_destroy_params() {
        assert_eq!(
            sign(
                &[("public_id", "store/images/abc"), ("timestamp", "1700000000")],
                "abcd1234secret"
            ),
            "cd49348189416e2ed9f648127bb7bb93ca19401f1656205471b84f4992c75599"
        );
    }

    #[test]
    fn test_resource_type_for_content_type() {
        assert_eq!(
            ResourceType::for_content_type("application/pdf"),
            ResourceType::Raw
        );
        assert_eq!(
            ResourceType::for_content_type("image/webp"),
            ResourceType::Image
        );
    }

    #[test]
    fn test_api_error_parses_body() {
        let err = api_error(400, r#"{"error": {"message": "Invalid image file"}}"#);
        assert_eq!(err.to_string(), "Cloudinary returned 400: Invalid image file");

        let err = api_error(502, "upstream down");
        assert_eq!(err.to_string(), "Cloudinary returned 502: upstream down");
    }
}
