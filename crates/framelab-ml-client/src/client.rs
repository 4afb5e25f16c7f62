//! Inference service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{MlError, MlResult};
use crate::traits::{Detector, Embedder};
use crate::types::{
    Detection, EmbedImagesRequest, EmbedImagesResponse, EmbedTextRequest, EmbedTextResponse,
    SegmentRequest, SegmentResponse,
};

/// Configuration for ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of the inference service
    pub base_url: String,
    /// Request timeout for detection and image embedding
    pub timeout: Duration,
    /// Timeout for the interactive text embedding call
    pub text_embed_timeout: Duration,
    /// Max retries
    pub max_retries: u32,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(300),
            text_embed_timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ML_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            timeout: Duration::from_secs(
                std::env::var("ML_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            text_embed_timeout: Duration::from_secs(
                std::env::var("ML_TEXT_EMBED_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            max_retries: std::env::var("ML_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}

/// Client for the inference service.
#[derive(Clone)]
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    /// Create a new ML client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> MlResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("Sending inference request to {}", url);

        let response = self
            .with_retry(|| async {
                let response = self.http.post(&url).json(body).send().await?;
                let status = response.status();

                if status.is_success() {
                    return Ok(response);
                }

                let text = response.text().await.unwrap_or_default();
                if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::BAD_GATEWAY {
                    Err(MlError::ServiceUnavailable(format!("{}: {}", status, text)))
                } else {
                    Err(MlError::RequestFailed(format!(
                        "ML service returned {}: {}",
                        status, text
                    )))
                }
            })
            .await?;

        Ok(response.json::<T>().await?)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "ML request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(MlError::RequestFailed("Unknown error".to_string())))
    }
}

#[async_trait]
impl Detector for MlClient {
    async fn segment(&self, image: &[u8], prompt: &str) -> MlResult<Vec<Detection>> {
        let request = SegmentRequest {
            image: BASE64.encode(image),
            prompt,
        };
        let response: SegmentResponse = self.post_json("/segment", &request).await?;
        Ok(response.detections.into_iter().map(Detection::from).collect())
    }
}

#[async_trait]
impl Embedder for MlClient {
    async fn embed_images(&self, images: &[Vec<u8>]) -> MlResult<Vec<Vec<f32>>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedImagesRequest {
            images: images.iter().map(|img| BASE64.encode(img)).collect(),
        };
        let response: EmbedImagesResponse = self.post_json("/embed/images", &request).await?;

        if response.embeddings.len() != images.len() {
            return Err(MlError::invalid_response(format!(
                "expected {} embeddings, got {}",
                images.len(),
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }

    /// Single attempt bounded by `text_embed_timeout`. Callers on the search
    /// path surface the timeout instead of waiting on retries.
    async fn embed_text(&self, query: &str) -> MlResult<Vec<f32>> {
        let url = format!("{}/embed/text", self.config.base_url);
        let limit = self.config.text_embed_timeout;

        let request = self
            .http
            .post(&url)
            .timeout(limit)
            .json(&EmbedTextRequest { text: query })
            .send();

        let response = match tokio::time::timeout(limit, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => return Err(MlError::Timeout(limit.as_secs())),
            Ok(Err(e)) => return Err(MlError::Network(e)),
            Err(_) => return Err(MlError::Timeout(limit.as_secs())),
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::RequestFailed(format!(
                "ML service returned {}: {}",
                status, body
            )));
        }

        let body: EmbedTextResponse = response.json().await?;
        Ok(body.embedding)
    }
}
