//! HTTP clients for the external intelligence services
//!
//! One client per provider, each implementing the matching `outcall-core`
//! trait. Selection happens once at construction; the engine never branches
//! on provider identity per call. Every client carries a request-level
//! timeout in its `reqwest::Client`; callers wrap calls in their own
//! `tokio::time::timeout` as the authoritative bound.

pub mod emotion;
pub mod generation;
pub mod synthesis;
pub mod transcription;

pub use emotion::EmotionServiceClient;
pub use generation::GenerationServiceClient;
pub use synthesis::SynthesisServiceClient;
pub use transcription::TranscriptionServiceClient;

use std::time::Duration;

/// Shared client construction options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }
}

/// Client construction errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

pub(crate) fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| ServiceError::Build(e.to_string()))
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
