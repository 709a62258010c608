//! Conversation turns and the call stage machine

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::emotion::EmotionSample;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Agent,
    Customer,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Agent => "agent",
            Speaker::Customer => "customer",
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single turn in the conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Emotion snapshot for customer turns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<EmotionSample>,
    /// Persona used for agent turns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,
    /// Whether audio was actually delivered for this turn. A turn with all
    /// synthesis tiers failed is still recorded, with this set to false.
    pub audio_present: bool,
}

impl ConversationTurn {
    pub fn customer(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Customer,
            text: text.into(),
            timestamp: Utc::now(),
            emotion: None,
            persona_id: None,
            audio_present: true,
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Agent,
            text: text.into(),
            timestamp: Utc::now(),
            emotion: None,
            persona_id: None,
            audio_present: true,
        }
    }

    pub fn with_emotion(mut self, emotion: EmotionSample) -> Self {
        self.emotion = Some(emotion);
        self
    }

    pub fn with_persona(mut self, persona_id: impl Into<String>) -> Self {
        self.persona_id = Some(persona_id.into());
        self
    }

    pub fn with_audio(mut self, audio_present: bool) -> Self {
        self.audio_present = audio_present;
        self
    }
}

/// Call stages
///
/// `Ended` and `Failed` are absorbing: no transition leaves them.
/// Re-entrant transitions between the live stages are allowed (an objection
/// can be resolved back into discovery).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Introduction,
    Discovery,
    ObjectionHandling,
    Closing,
    Ended,
    Failed,
}

static STAGE_TRANSITIONS: Lazy<HashMap<Stage, &'static [Stage]>> = Lazy::new(|| {
    use Stage::*;
    let mut map = HashMap::new();
    map.insert(
        Introduction,
        &[Discovery, ObjectionHandling, Closing, Ended, Failed] as &[_],
    );
    map.insert(
        Discovery,
        &[Discovery, ObjectionHandling, Closing, Ended, Failed] as &[_],
    );
    map.insert(
        ObjectionHandling,
        &[Discovery, ObjectionHandling, Closing, Ended, Failed] as &[_],
    );
    map.insert(Closing, &[ObjectionHandling, Closing, Ended, Failed] as &[_]);
    map.insert(Ended, &[] as &[_]);
    map.insert(Failed, &[] as &[_]);
    map
});

impl Stage {
    /// Allowed transitions out of this stage
    pub fn allowed_transitions(&self) -> &'static [Stage] {
        STAGE_TRANSITIONS.get(self).copied().unwrap_or(&[])
    }

    pub fn can_transition_to(&self, target: Stage) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Ended | Stage::Failed)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Introduction => "introduction",
            Stage::Discovery => "discovery",
            Stage::ObjectionHandling => "objection_handling",
            Stage::Closing => "closing",
            Stage::Ended => "ended",
            Stage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::{EmotionLabel, SampleSource};

    #[test]
    fn test_terminal_stages_are_absorbing() {
        for target in [
            Stage::Introduction,
            Stage::Discovery,
            Stage::ObjectionHandling,
            Stage::Closing,
            Stage::Ended,
            Stage::Failed,
        ] {
            assert!(!Stage::Ended.can_transition_to(target));
            assert!(!Stage::Failed.can_transition_to(target));
        }
        assert!(Stage::Ended.is_terminal());
        assert!(Stage::Failed.is_terminal());
    }

    #[test]
    fn test_every_live_stage_can_fail_or_end() {
        for stage in [
            Stage::Introduction,
            Stage::Discovery,
            Stage::ObjectionHandling,
            Stage::Closing,
        ] {
            assert!(stage.can_transition_to(Stage::Ended));
            assert!(stage.can_transition_to(Stage::Failed));
        }
    }

    #[test]
    fn test_objection_is_reentrant() {
        assert!(Stage::ObjectionHandling.can_transition_to(Stage::Discovery));
        assert!(Stage::Closing.can_transition_to(Stage::ObjectionHandling));
    }

    #[test]
    fn test_turn_builders() {
        let sample = EmotionSample::new(EmotionLabel::Happy, 0.9, 0.5, SampleSource::Model);
        let turn = ConversationTurn::customer("sounds great").with_emotion(sample);
        assert_eq!(turn.speaker, Speaker::Customer);
        assert!(turn.emotion.is_some());

        let turn = ConversationTurn::agent("glad to hear it")
            .with_persona("friendly")
            .with_audio(false);
        assert_eq!(turn.persona_id.as_deref(), Some("friendly"));
        assert!(!turn.audio_present);
    }
}
