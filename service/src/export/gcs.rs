//! Google Cloud Storage sink using the JSON API media upload.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use super::sink::{ArtifactHandle, ArtifactSink, SinkError};

/// Default Cloud Storage endpoint.
pub const GCS_BASE_URL: &str = "https://storage.googleapis.com";

/// Uploads snapshots as objects of a Cloud Storage bucket.
///
/// The container passed to [`ArtifactSink::upload`] is the bucket name.
/// Authentication is a pre-issued OAuth access token sent as a bearer token.
pub struct GcsSink {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

/// Fields of the object resource returned after an upload.
#[derive(Debug, Deserialize)]
struct UploadedObject {
    bucket: String,
    name: String,
}

impl GcsSink {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, access_token)
    }

    /// Create a sink with a custom `reqwest::Client`.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl ArtifactSink for GcsSink {
    async fn upload(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactHandle, SinkError> {
        let url = format!("{}/upload/storage/v1/b/{}/o", self.base_url, container);
        let size = bytes.len();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "media"), ("name", name)])
            .header(CONTENT_TYPE, "text/csv")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let object: UploadedObject = response.json().await?;
        Ok(ArtifactHandle {
            container: object.bucket.clone(),
            name: object.name.clone(),
            location: format!("gs://{}/{}", object.bucket, object.name),
            size,
        })
    }
}
