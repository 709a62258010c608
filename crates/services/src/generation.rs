//! Text-generation service client
//!
//! Wire contract: `POST /generate {history, decision_hint, persona, locale}`
//! → `{text}`. The decision hint conditions the generator; the dialogue
//! policy decides, the service writes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use outcall_core::{Error, GenerationRequest, Result, TextGenerator, TurnSnapshot};

use crate::{build_http_client, endpoint, ClientConfig, ServiceError};

#[derive(Debug, Serialize)]
struct GenerateRequestBody<'a> {
    history: &'a [TurnSnapshot],
    decision_hint: &'a str,
    persona: &'a str,
    locale: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    script: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponseBody {
    text: String,
}

/// Client for the external text-generation service
pub struct GenerationServiceClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl GenerationServiceClient {
    pub fn new(config: ClientConfig) -> std::result::Result<Self, ServiceError> {
        let http = build_http_client(&config)?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl TextGenerator for GenerationServiceClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = endpoint(&self.config.base_url, "generate");
        let body = GenerateRequestBody {
            history: &request.history,
            decision_hint: &request.decision_hint,
            persona: &request.persona_id,
            locale: &request.locale,
            script: request.script.as_deref(),
        };

        let mut http_request = self.http.post(&url).json(&body);
        if let Some(ref key) = self.config.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Generation(format!(
                "generation service returned {}",
                response.status()
            )));
        }

        let body: GenerateResponseBody = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("malformed payload: {}", e)))?;

        if body.text.trim().is_empty() {
            return Err(Error::Generation("empty reply".to_string()));
        }

        Ok(body.text)
    }

    fn name(&self) -> &str {
        "generation-http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outcall_core::{ConversationTurn, Speaker};

    #[test]
    fn test_request_serializes_contract_shape() {
        let history = vec![
            TurnSnapshot::from(&ConversationTurn::agent("hello")),
            TurnSnapshot::from(&ConversationTurn::customer("who is this?")),
        ];
        let body = GenerateRequestBody {
            history: &history,
            decision_hint: "provide_info: introduce the offer briefly",
            persona: "formal",
            locale: "en",
            script: Some("intro script"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["persona"], "formal");
        assert_eq!(json["history"][1]["speaker"], "customer");
        assert_eq!(json["script"], "intro script");

        let history_turn: TurnSnapshot =
            serde_json::from_value(json["history"][0].clone()).unwrap();
        assert_eq!(history_turn.speaker, Speaker::Agent);
    }
}
