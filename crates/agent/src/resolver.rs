//! Emotion resolution
//!
//! Wraps the classification service so that, from the session's point of
//! view, classification is total: every call returns a well-formed
//! `EmotionSample`. Timeouts, errors, and malformed payloads each produce a
//! fallback sample tagged with its failure path.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use outcall_core::{EmotionClassifier, EmotionLabel, EmotionSample, EmotionScores, SampleSource};

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub classify_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            classify_timeout: Duration::from_secs(5),
        }
    }
}

/// Total-function facade over the emotion classification service
pub struct EmotionResolver {
    classifier: Arc<dyn EmotionClassifier>,
    config: ResolverConfig,
}

impl EmotionResolver {
    pub fn new(classifier: Arc<dyn EmotionClassifier>, config: ResolverConfig) -> Self {
        Self { classifier, config }
    }

    /// Classify one utterance. Never fails; every failure path yields a
    /// tagged fallback sample instead.
    pub async fn classify(&self, utterance: &str) -> EmotionSample {
        let result = timeout(
            self.config.classify_timeout,
            self.classifier.classify(utterance),
        )
        .await;

        match result {
            Ok(Ok(scores)) => match Self::validate(&scores) {
                Some(sample) => {
                    tracing::debug!(
                        label = %sample.label,
                        confidence = sample.confidence,
                        model = %scores.model_used,
                        "emotion classified"
                    );
                    sample
                },
                None => {
                    tracing::warn!(
                        provider = self.classifier.name(),
                        label = %scores.emotion,
                        "malformed classification payload, using fallback sample"
                    );
                    Self::fallback(SampleSource::FallbackMalformed)
                },
            },
            Ok(Err(e)) => {
                tracing::warn!(
                    provider = self.classifier.name(),
                    error = %e,
                    "classification failed, using fallback sample"
                );
                Self::fallback(SampleSource::FallbackError)
            },
            Err(_) => {
                tracing::warn!(
                    provider = self.classifier.name(),
                    timeout_ms = self.config.classify_timeout.as_millis() as u64,
                    "classification timed out, using fallback sample"
                );
                Self::fallback(SampleSource::FallbackTimeout)
            },
        }
    }

    /// Validate raw scores into a sample. Unknown labels and non-finite or
    /// out-of-range numbers are rejected wholesale rather than patched.
    fn validate(scores: &EmotionScores) -> Option<EmotionSample> {
        let label = EmotionLabel::from_service_label(&scores.emotion)?;
        if !scores.confidence.is_finite() || !scores.intensity.is_finite() {
            return None;
        }
        if !(0.0..=1.0).contains(&scores.confidence) || !(0.0..=1.0).contains(&scores.intensity) {
            return None;
        }
        Some(EmotionSample::new(
            label,
            scores.confidence,
            scores.intensity,
            SampleSource::Model,
        ))
    }

    /// Neutral-weighted pseudo-random fallback. Mostly neutral so a flaky
    /// classifier does not whipsaw the dialogue policy, with a small spread
    /// across the other labels so fallback traffic is distinguishable from
    /// a stuck classifier in the logs.
    fn fallback(source: SampleSource) -> EmotionSample {
        let mut rng = rand::thread_rng();
        let label = if rng.gen::<f32>() < 0.7 {
            EmotionLabel::Neutral
        } else {
            let others: Vec<EmotionLabel> = EmotionLabel::ALL
                .iter()
                .copied()
                .filter(|l| *l != EmotionLabel::Neutral)
                .collect();
            others[rng.gen_range(0..others.len())]
        };
        EmotionSample::new(label, rng.gen_range(0.3..0.5), rng.gen_range(0.1..0.3), source)
    }
}
