//! Speech-synthesis service client
//!
//! Two modes per the provider contract: buffered `POST /synthesize` returns
//! the whole utterance as bytes; streaming `POST /synthesize/stream` returns
//! a chunked body that is forwarded chunk by chunk as it arrives. Streaming
//! is the primary path; the pipeline falls back to buffered on failure.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;

use outcall_core::{Error, Result, SpeechSynthesizer, SynthesisParams};

use crate::{build_http_client, endpoint, ClientConfig, ServiceError};

#[derive(Debug, Serialize)]
struct SynthesizeRequestBody<'a> {
    text: &'a str,
    persona: &'a str,
    stability: f32,
    style: f32,
    speed_min: f32,
    speed_max: f32,
}

impl<'a> SynthesizeRequestBody<'a> {
    fn new(text: &'a str, persona_id: &'a str, params: &SynthesisParams) -> Self {
        Self {
            text,
            persona: persona_id,
            stability: params.stability,
            style: params.style,
            speed_min: params.speed_min,
            speed_max: params.speed_max,
        }
    }
}

/// Client for the external speech-synthesis service
pub struct SynthesisServiceClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl SynthesisServiceClient {
    pub fn new(config: ClientConfig) -> std::result::Result<Self, ServiceError> {
        let http = build_http_client(&config)?;
        Ok(Self { http, config })
    }

    fn request(
        &self,
        path: &str,
        body: &SynthesizeRequestBody<'_>,
    ) -> reqwest::RequestBuilder {
        let url = endpoint(&self.config.base_url, path);
        let mut request = self.http.post(url).json(body);
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }
        request
    }
}

#[async_trait]
impl SpeechSynthesizer for SynthesisServiceClient {
    async fn synthesize(
        &self,
        text: &str,
        persona_id: &str,
        params: &SynthesisParams,
    ) -> Result<Vec<u8>> {
        let body = SynthesizeRequestBody::new(text, persona_id, params);
        let response = self
            .request("synthesize", &body)
            .send()
            .await
            .map_err(|e| Error::BufferedSynthesis(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::BufferedSynthesis(format!(
                "synthesis service returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::BufferedSynthesis(e.to_string()))?;

        if bytes.is_empty() {
            return Err(Error::BufferedSynthesis("empty audio".to_string()));
        }

        Ok(bytes.to_vec())
    }

    async fn stream_synthesize(
        &self,
        text: &str,
        persona_id: &str,
        params: &SynthesisParams,
        chunks: mpsc::Sender<Vec<u8>>,
    ) -> Result<()> {
        let body = SynthesizeRequestBody::new(text, persona_id, params);
        let response = self
            .request("synthesize/stream", &body)
            .send()
            .await
            .map_err(|e| Error::StreamingSynthesis(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::StreamingSynthesis(format!(
                "synthesis service returned {}",
                response.status()
            )));
        }

        let mut stream = response.bytes_stream();
        let mut forwarded = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::StreamingSynthesis(e.to_string()))?;
            if chunk.is_empty() {
                continue;
            }
            forwarded += chunk.len();
            if chunks.send(chunk.to_vec()).await.is_err() {
                // Receiver gone: the call ended or fell back mid-stream.
                tracing::debug!(persona = persona_id, "stream receiver dropped");
                return Ok(());
            }
        }

        if forwarded == 0 {
            return Err(Error::StreamingSynthesis("empty stream".to_string()));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "synthesis-http"
    }
}
