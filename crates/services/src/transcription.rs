//! Transcription service client
//!
//! Wire contract: `POST /transcribe` with a raw audio body → `{text}`.

use async_trait::async_trait;
use serde::Deserialize;

use outcall_core::{Error, Result, Transcriber};

use crate::{build_http_client, endpoint, ClientConfig, ServiceError};

#[derive(Debug, Deserialize)]
struct TranscribeResponseBody {
    text: String,
}

/// Client for the external transcription service
pub struct TranscriptionServiceClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl TranscriptionServiceClient {
    pub fn new(config: ClientConfig) -> std::result::Result<Self, ServiceError> {
        let http = build_http_client(&config)?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl Transcriber for TranscriptionServiceClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        let url = endpoint(&self.config.base_url, "transcribe");
        let mut request = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(audio.to_vec());
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transcription(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Transcription(format!(
                "transcription service returned {}",
                response.status()
            )));
        }

        let body: TranscribeResponseBody = response
            .json()
            .await
            .map_err(|e| Error::Transcription(format!("malformed payload: {}", e)))?;

        Ok(body.text)
    }

    fn name(&self) -> &str {
        "transcription-http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shape() {
        let body: TranscribeResponseBody =
            serde_json::from_str(r#"{"text": "hello there"}"#).unwrap();
        assert_eq!(body.text, "hello there");
    }
}
