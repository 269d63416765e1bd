use async_trait::async_trait;
use bon::bon;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::artifact::CapturedArtifact;

const USER_AGENT: &str = concat!("geostamp/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("upload request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The service rejected the upload; the message is shown to the user
    /// verbatim and the artifact is kept for retry.
    #[error("{message}")]
    Rejected { status: u16, message: String },
}

/// Success acknowledgement from the photo service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadReceipt {
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiMessage {
    message: Option<String>,
}

/// The upload endpoint seam.
#[async_trait]
pub trait PhotoUploader: Send + Sync {
    async fn upload(&self, artifact: &CapturedArtifact) -> Result<UploadReceipt, UploadError>;
}

/// Multipart uploader for the photo service.
///
/// Sends the stamped JPEG together with the coordinates, accuracy, address
/// and camera label, authenticated with a bearer token when one is
/// configured. The token is injected at construction; nothing is read from
/// ambient storage.
pub struct HttpUploader {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

#[bon]
impl HttpUploader {
    /// Constructs an uploader via a builder pattern.
    ///
    /// # Builder Arguments
    ///
    /// * `base_url: String` - Root of the photo service API.
    /// * `auth_token: Option<String>` - Bearer token attached to every
    ///   request. Requests are sent unauthenticated without one; the service
    ///   will reject them for any route that requires a user.
    ///
    /// # Errors
    ///
    /// Fails only if the underlying HTTP client cannot be constructed.
    #[builder]
    pub fn new(base_url: String, auth_token: Option<String>) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url,
            auth_token,
        })
    }
}

#[async_trait]
impl PhotoUploader for HttpUploader {
    async fn upload(&self, artifact: &CapturedArtifact) -> Result<UploadReceipt, UploadError> {
        let image = reqwest::multipart::Part::bytes(artifact.stamped_jpeg.clone())
            .file_name(artifact.upload_filename())
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new()
            .part("image", image)
            .text("latitude", artifact.location.latitude.to_string())
            .text("longitude", artifact.location.longitude.to_string())
            .text("accuracy", artifact.location.accuracy_m.to_string())
            .text("address", artifact.address.text.clone())
            .text("camera_type", artifact.facing.as_param());

        let mut request = self
            .http
            .post(format!("{}/photos/upload", self.base_url))
            .multipart(form);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            info!(status = status.as_u16(), "photo upload accepted");
            return Ok(response.json().await.unwrap_or_default());
        }

        let body = response.text().await.unwrap_or_default();
        Err(UploadError::Rejected {
            status: status.as_u16(),
            message: rejection_message(status.as_u16(), &body),
        })
    }
}

/// Rejections usually carry a `{"message": ...}` body; fall back to the raw
/// body text, then to a generic status line.
fn rejection_message(status: u16, body: &str) -> String {
    if let Some(message) = serde_json::from_str::<ApiMessage>(body)
        .ok()
        .and_then(|api| api.message)
    {
        return message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("Upload failed with status {status}")
    } else {
        trimmed.to_string()
    }
}
