//! Emotion-classification service client
//!
//! Wire contract: `POST /classify {text, audio_features?}` →
//! `{emotion, confidence, all_scores, model_used}`. Intensity is optional
//! on the wire; when absent it defaults to the reported confidence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use outcall_core::{EmotionClassifier, EmotionScores, Error, Result};

use crate::{build_http_client, endpoint, ClientConfig, ServiceError};

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_features: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    emotion: String,
    confidence: f32,
    #[serde(default)]
    intensity: Option<f32>,
    #[serde(default)]
    all_scores: HashMap<String, f32>,
    #[serde(default)]
    model_used: String,
}

/// Client for the external emotion-classification service
pub struct EmotionServiceClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl EmotionServiceClient {
    pub fn new(config: ClientConfig) -> std::result::Result<Self, ServiceError> {
        let http = build_http_client(&config)?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl EmotionClassifier for EmotionServiceClient {
    async fn classify(&self, text: &str) -> Result<EmotionScores> {
        let url = endpoint(&self.config.base_url, "classify");
        let mut request = self.http.post(&url).json(&ClassifyRequest {
            text,
            audio_features: None,
        });
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Classification(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Classification(format!(
                "classification service returned {}",
                response.status()
            )));
        }

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| Error::Classification(format!("malformed payload: {}", e)))?;

        Ok(EmotionScores {
            confidence: body.confidence,
            intensity: body.intensity.unwrap_or(body.confidence),
            emotion: body.emotion,
            all_scores: body.all_scores,
            model_used: body.model_used,
        })
    }

    fn name(&self) -> &str {
        "emotion-http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_deserializes_service_shape() {
        let json = r#"{
            "emotion": "anger",
            "confidence": 0.82,
            "all_scores": {"anger": 0.82, "neutral": 0.1},
            "model_used": "text_emotion_optimized"
        }"#;
        let body: ClassifyResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.emotion, "anger");
        assert_eq!(body.model_used, "text_emotion_optimized");
        // Intensity absent on the wire
        assert!(body.intensity.is_none());
        assert_eq!(body.all_scores.len(), 2);
    }

    #[test]
    fn test_response_tolerates_minimal_payload() {
        let body: ClassifyResponse =
            serde_json::from_str(r#"{"emotion": "neutral", "confidence": 0.5}"#).unwrap();
        assert!(body.all_scores.is_empty());
        assert!(body.model_used.is_empty());
    }
}
