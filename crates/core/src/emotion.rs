//! Emotion types
//!
//! The engine works with a fixed emotion vocabulary. Classifier output is
//! parsed into this vocabulary at the edge; anything that does not parse is
//! treated as a classification failure and replaced by a fallback sample,
//! so every `EmotionSample` in the system is well-formed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed emotion vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Frustrated,
    Confused,
    Interested,
    Excited,
    Fearful,
    Surprised,
}

impl EmotionLabel {
    /// All labels, in declaration order
    pub const ALL: [EmotionLabel; 10] = [
        EmotionLabel::Neutral,
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Angry,
        EmotionLabel::Frustrated,
        EmotionLabel::Confused,
        EmotionLabel::Interested,
        EmotionLabel::Excited,
        EmotionLabel::Fearful,
        EmotionLabel::Surprised,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Neutral => "neutral",
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Angry => "angry",
            EmotionLabel::Frustrated => "frustrated",
            EmotionLabel::Confused => "confused",
            EmotionLabel::Interested => "interested",
            EmotionLabel::Excited => "excited",
            EmotionLabel::Fearful => "fearful",
            EmotionLabel::Surprised => "surprised",
        }
    }

    /// Parse a label string as emitted by the classification service.
    ///
    /// The service vocabulary is wider than the engine's; labels the
    /// dialogue policy cannot act on are folded into their nearest kept
    /// label. Unknown strings return `None` and the caller falls back.
    pub fn from_service_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        let parsed = match label.as_str() {
            "neutral" => EmotionLabel::Neutral,
            "happy" | "happiness" | "joy" => EmotionLabel::Happy,
            "sad" | "sadness" => EmotionLabel::Sad,
            "angry" | "anger" => EmotionLabel::Angry,
            "frustrated" | "frustration" => EmotionLabel::Frustrated,
            "confused" | "confusion" => EmotionLabel::Confused,
            "interested" | "interest" | "love" | "desire" => EmotionLabel::Interested,
            "excited" | "excitement" => EmotionLabel::Excited,
            "fear" | "fearful" => EmotionLabel::Fearful,
            "surprise" | "surprised" => EmotionLabel::Surprised,
            "disgust" => EmotionLabel::Angry,
            "shame" | "guilt" => EmotionLabel::Sad,
            _ => return None,
        };
        Some(parsed)
    }

    /// Labels that indicate the callee is engaging positively
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            EmotionLabel::Happy | EmotionLabel::Interested | EmotionLabel::Excited
        )
    }

    /// Labels that warrant an empathetic handling path
    pub fn is_distressed(&self) -> bool {
        matches!(
            self,
            EmotionLabel::Frustrated | EmotionLabel::Confused | EmotionLabel::Angry
        )
    }
}

impl std::fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provenance of an emotion sample
///
/// Fallback samples are synthetic and must never be presented as real
/// classifications; the tag is logged for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSource {
    /// Produced by the classification service
    Model,
    /// Classification call exceeded its timeout
    FallbackTimeout,
    /// Classification call returned an error
    FallbackError,
    /// Classification call returned an unparseable or out-of-range payload
    FallbackMalformed,
}

impl SampleSource {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, SampleSource::Model)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SampleSource::Model => "model",
            SampleSource::FallbackTimeout => "fallback_timeout",
            SampleSource::FallbackError => "fallback_error",
            SampleSource::FallbackMalformed => "fallback_malformed",
        }
    }
}

/// One emotion observation for a customer utterance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionSample {
    pub label: EmotionLabel,
    /// Classifier confidence, clamped to [0, 1]
    pub confidence: f32,
    /// Expressed intensity, clamped to [0, 1]
    pub intensity: f32,
    pub source: SampleSource,
    pub timestamp: DateTime<Utc>,
}

impl EmotionSample {
    /// Create a sample, clamping confidence and intensity into [0, 1]
    pub fn new(label: EmotionLabel, confidence: f32, intensity: f32, source: SampleSource) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            intensity: intensity.clamp(0.0, 1.0),
            source,
            timestamp: Utc::now(),
        }
    }

    /// A calm neutral sample from the model path
    pub fn neutral() -> Self {
        Self::new(EmotionLabel::Neutral, 0.5, 0.3, SampleSource::Model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_clamps_ranges() {
        let sample = EmotionSample::new(EmotionLabel::Angry, 1.7, -0.4, SampleSource::Model);
        assert_eq!(sample.confidence, 1.0);
        assert_eq!(sample.intensity, 0.0);
    }

    #[test]
    fn test_service_label_parsing() {
        assert_eq!(
            EmotionLabel::from_service_label("Anger"),
            Some(EmotionLabel::Angry)
        );
        assert_eq!(
            EmotionLabel::from_service_label("confusion"),
            Some(EmotionLabel::Confused)
        );
        // Wider classifier vocabulary folds into the kept labels
        assert_eq!(
            EmotionLabel::from_service_label("love"),
            Some(EmotionLabel::Interested)
        );
        assert_eq!(
            EmotionLabel::from_service_label("guilt"),
            Some(EmotionLabel::Sad)
        );
        assert_eq!(EmotionLabel::from_service_label("sarcasm"), None);
        assert_eq!(EmotionLabel::from_service_label(""), None);
    }

    #[test]
    fn test_source_tags() {
        assert!(!SampleSource::Model.is_fallback());
        assert!(SampleSource::FallbackTimeout.is_fallback());
        assert_eq!(SampleSource::FallbackMalformed.as_str(), "fallback_malformed");
    }
}
