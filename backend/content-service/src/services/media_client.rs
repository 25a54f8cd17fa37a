//! Client for media-service's ingest endpoint

use crate::models::MediaUpload;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use resilience::{with_timeout, Elapsed};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum MediaClientError {
    #[error("media request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("media service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Timeout(#[from] Elapsed),

    #[error("invalid media response: {0}")]
    InvalidResponse(String),
}

/// The saga's remote step: store files for a post, return their public URLs
#[async_trait]
pub trait MediaClient: Send + Sync {
    async fn ingest(&self, post_id: Uuid, files: Vec<MediaUpload>) -> Result<Vec<String>, MediaClientError>;
}

#[derive(Debug, Deserialize)]
struct IngestResponse {
    urls: Vec<String>,
}

pub struct HttpMediaClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpMediaClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn ingest_url(&self) -> String {
        format!("{}/api/v1/media/ingest", self.base_url)
    }

    fn form(post_id: Uuid, files: Vec<MediaUpload>) -> Result<Form, MediaClientError> {
        let mut form = Form::new().text("postId", post_id.to_string());
        for file in files {
            let part = Part::bytes(file.data.to_vec())
                .file_name(file.filename)
                .mime_str(&file.content_type)?;
            form = form.part("files", part);
        }
        Ok(form)
    }
}

#[async_trait]
impl MediaClient for HttpMediaClient {
    async fn ingest(&self, post_id: Uuid, files: Vec<MediaUpload>) -> Result<Vec<String>, MediaClientError> {
        let expected = files.len();
        let form = Self::form(post_id, files)?;
        let request = self.http.post(self.ingest_url()).multipart(form).send();

        let response = with_timeout("media ingest", self.timeout, request).await??;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: IngestResponse = with_timeout("media ingest", self.timeout, response.json())
            .await?
            .map_err(|e| MediaClientError::InvalidResponse(e.to_string()))?;

        if body.urls.len() != expected {
            return Err(MediaClientError::InvalidResponse(format!(
                "expected {} urls, got {}",
                expected,
                body.urls.len()
            )));
        }
        Ok(body.urls)
    }
}

/// Scripted media client for tests
#[cfg(any(test, feature = "test-support"))]
pub struct StubMediaClient {
    fail_with: Option<String>,
    calls: parking_lot::Mutex<Vec<(Uuid, usize)>>,
}

#[cfg(any(test, feature = "test-support"))]
impl StubMediaClient {
    pub fn succeeding() -> Self {
        Self {
            fail_with: None,
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// `(post_id, file_count)` per ingest call
    pub fn calls(&self) -> Vec<(Uuid, usize)> {
        self.calls.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl MediaClient for StubMediaClient {
    async fn ingest(&self, post_id: Uuid, files: Vec<MediaUpload>) -> Result<Vec<String>, MediaClientError> {
        self.calls.lock().push((post_id, files.len()));
        match &self.fail_with {
            Some(reason) => Err(MediaClientError::Status {
                status: 500,
                body: reason.clone(),
            }),
            None => Ok(files
                .iter()
                .map(|file| format!("https://media.test/{}/{}", post_id, file.filename))
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_url_strips_trailing_slash() {
        let client = HttpMediaClient::new("http://media:8082/", Duration::from_secs(1));
        assert_eq!(client.ingest_url(), "http://media:8082/api/v1/media/ingest");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_request_error() {
        // Port 9 (discard) is closed on test hosts
        let client = HttpMediaClient::new("http://127.0.0.1:9", Duration::from_secs(2));
        let err = client
            .ingest(
                Uuid::new_v4(),
                vec![MediaUpload {
                    filename: "a.png".into(),
                    content_type: "image/png".into(),
                    data: bytes::Bytes::from_static(b"png"),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaClientError::Request(_)));
    }
}
