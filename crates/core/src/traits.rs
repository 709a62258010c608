//! Traits for the external intelligence services
//!
//! The three providers (emotion classification, text generation, speech
//! synthesis) plus transcription are consumed as black boxes behind these
//! traits. One implementation per provider is selected at construction
//! time; the engine never branches on provider identity per call.
//!
//! Callers own timeouts: every call site wraps these futures in
//! `tokio::time::timeout` and treats a timeout identically to an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::conversation::{ConversationTurn, Speaker};
use crate::error::Result;
use crate::persona::SynthesisParams;

/// Raw classifier output, before validation into an `EmotionSample`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionScores {
    /// Label string in the service's own vocabulary
    pub emotion: String,
    pub confidence: f32,
    pub intensity: f32,
    /// Full score distribution, when the service provides one
    #[serde(default)]
    pub all_scores: HashMap<String, f32>,
    /// Which model produced the result, for observability
    #[serde(default)]
    pub model_used: String,
}

/// Emotion classification service
#[async_trait]
pub trait EmotionClassifier: Send + Sync + 'static {
    /// Classify one utterance. May fail or stall; the resolver above this
    /// trait guarantees a well-formed sample regardless.
    async fn classify(&self, text: &str) -> Result<EmotionScores>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// A minimal turn view sent to the generation service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnSnapshot {
    pub speaker: Speaker,
    pub text: String,
}

impl From<&ConversationTurn> for TurnSnapshot {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            speaker: turn.speaker,
            text: turn.text.clone(),
        }
    }
}

/// Request for the text-generation service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub history: Vec<TurnSnapshot>,
    /// Conditioning hint from the dialogue policy; the policy steers the
    /// generator, it does not implement it.
    pub decision_hint: String,
    pub persona_id: String,
    pub locale: String,
    /// Campaign script text assigned to this call's variant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

/// Text-generation service
#[async_trait]
pub trait TextGenerator: Send + Sync + 'static {
    /// Generate the next agent reply
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Speech-synthesis service
///
/// Two modes: buffered (whole utterance) and streaming (chunks forwarded as
/// produced, the primary latency win). Streaming implementations send each
/// audio chunk into `chunks` as soon as it is available and return once the
/// utterance is complete.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + 'static {
    async fn synthesize(
        &self,
        text: &str,
        persona_id: &str,
        params: &SynthesisParams,
    ) -> Result<Vec<u8>>;

    async fn stream_synthesize(
        &self,
        text: &str,
        persona_id: &str,
        params: &SynthesisParams,
        chunks: mpsc::Sender<Vec<u8>>,
    ) -> Result<()>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Transcription service
#[async_trait]
pub trait Transcriber: Send + Sync + 'static {
    /// Transcribe an accumulated inbound audio buffer
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct MockClassifier;

    #[async_trait]
    impl EmotionClassifier for MockClassifier {
        async fn classify(&self, text: &str) -> Result<EmotionScores> {
            if text.is_empty() {
                return Err(Error::Classification("empty utterance".to_string()));
            }
            Ok(EmotionScores {
                emotion: "neutral".to_string(),
                confidence: 0.8,
                intensity: 0.3,
                all_scores: HashMap::new(),
                model_used: "mock".to_string(),
            })
        }

        fn name(&self) -> &str {
            "mock-classifier"
        }
    }

    #[tokio::test]
    async fn test_classifier_trait_object() {
        let classifier: Box<dyn EmotionClassifier> = Box::new(MockClassifier);
        let scores = classifier.classify("hello").await.unwrap();
        assert_eq!(scores.emotion, "neutral");
        assert!(classifier.classify("").await.is_err());
    }

    #[test]
    fn test_turn_snapshot_from_turn() {
        let turn = ConversationTurn::customer("hello there");
        let snapshot = TurnSnapshot::from(&turn);
        assert_eq!(snapshot.speaker, Speaker::Customer);
        assert_eq!(snapshot.text, "hello there");
    }
}
