//! The remote background-removal capability.
//!
//! ## Why a trait seam?
//!
//! The production implementation is one HTTP call, but hiding it behind
//! [`BackgroundRemover`] keeps the pipeline testable without a live
//! endpoint (or an API credential): tests inject mock removers, callers can
//! wrap the client with middleware, and the session never knows which it
//! got.
//!
//! ## Wire contract
//!
//! `POST` to the endpoint with the static credential in the `X-Api-Key`
//! header and the image bytes as the single multipart part `image_file`.
//! A success response body is the matted image (PNG). An error response
//! body is JSON of the shape `{"errors":[{"title":"..."}]}`; the first
//! title is the message shown to the user, with [`GENERIC_FAILURE`] as the
//! fallback when the body doesn't parse or carries no title.
//!
//! There is deliberately no request timeout: the call rides on the
//! transport's own behavior, and the operation guard already keeps a slow
//! call from stacking up work behind it.

use crate::error::CutoutError;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// The production background-removal endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.remove.bg/v1.0/removebg";

/// Header carrying the static API credential.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Multipart field name the service expects the image under.
pub const IMAGE_FIELD: &str = "image_file";

/// Fallback user-facing message when the service gives us nothing better.
pub const GENERIC_FAILURE: &str = "Background removal failed";

/// Strips the background from an image, returning the matted image bytes.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Submit `image` and return the processed bytes.
    ///
    /// Errors are [`CutoutError::RemoteService`] with a message that is
    /// already user-presentable.
    async fn remove(&self, image: &[u8]) -> Result<Vec<u8>, CutoutError>;
}

/// HTTP client for the remove.bg v1.0 API.
pub struct RemoveBgClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl RemoveBgClient {
    /// Create a client for the given credential against [`DEFAULT_ENDPOINT`].
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(api_key, DEFAULT_ENDPOINT)
    }

    /// Create a client against a custom endpoint (self-hosted proxy, test
    /// server).
    pub fn with_endpoint(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl BackgroundRemover for RemoveBgClient {
    async fn remove(&self, image: &[u8]) -> Result<Vec<u8>, CutoutError> {
        debug!("submitting {} bytes to {}", image.len(), self.endpoint);

        let form = reqwest::multipart::Form::new()
            .part(IMAGE_FIELD, reqwest::multipart::Part::bytes(image.to_vec()));

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!("transport error talking to {}: {e}", self.endpoint);
                CutoutError::RemoteService {
                    message: GENERIC_FAILURE.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_title(&body);
            warn!("service returned HTTP {status}: {message}");
            return Err(CutoutError::RemoteService { message });
        }

        let bytes = response.bytes().await.map_err(|e| {
            warn!("failed reading response body: {e}");
            CutoutError::RemoteService {
                message: GENERIC_FAILURE.to_string(),
            }
        })?;

        debug!("received {} matted bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Structured error body the service returns on non-success statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    title: Option<String>,
}

/// Pull the first error title out of an error body, falling back to
/// [`GENERIC_FAILURE`] when the body is unparseable or titleless.
pub fn extract_error_title(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.errors.into_iter().next())
        .and_then(|e| e.title)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}
