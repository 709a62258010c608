//! Dialogue policy
//!
//! Pure function of (history, current emotion, persona, turn count) to a
//! decision. The policy steers the external text generator with an action
//! and a strategy hint; it never generates text itself. Keeping it free of
//! hidden state means every rule is testable in isolation.

use outcall_core::{
    ConversationTurn, EmotionLabel, EmotionSample, Persona, Speaker, Tone, EMPATHETIC_PERSONA,
    FRIENDLY_PERSONA,
};

/// Action the session should take next turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    AskQuestion,
    ProvideInfo,
    HandleObjection,
    CloseCall,
    ScheduleCallback,
}

impl NextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextAction::AskQuestion => "ask_question",
            NextAction::ProvideInfo => "provide_info",
            NextAction::HandleObjection => "handle_objection",
            NextAction::CloseCall => "close_call",
            NextAction::ScheduleCallback => "schedule_callback",
        }
    }

    /// Actions that move the call toward wrap-up
    pub fn is_closing(&self) -> bool {
        matches!(self, NextAction::CloseCall | NextAction::ScheduleCallback)
    }
}

/// One policy decision
#[derive(Debug, Clone)]
pub struct Decision {
    pub action: NextAction,
    /// Persona id to switch to before replying, when a switch rule fired
    pub persona_switch: Option<String>,
    /// Conditioning hint forwarded to the text generator
    pub strategy_hint: String,
}

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Emotion intensity above which a distressed callee forces the
    /// empathetic persona
    pub intensity_switch_threshold: f32,
    /// Consecutive neutral customer turns before the anti-stall switch
    pub stagnation_turns: usize,
    /// Turn count after which sustained positive emotion closes the call
    pub closing_turn_threshold: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            intensity_switch_threshold: 0.7,
            stagnation_turns: 10,
            closing_turn_threshold: 8,
        }
    }
}

const DISINTEREST_MARKERS: &[&str] = &[
    "not interested",
    "no thanks",
    "no thank you",
    "stop calling",
    "don't call",
    "remove me",
];

/// Stateless dialogue policy
pub struct DialoguePolicy {
    config: PolicyConfig,
}

impl DialoguePolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Decide the next action and any persona switch.
    ///
    /// `turn_count` is the number of completed customer turns including the
    /// one carrying `emotion`.
    pub fn decide(
        &self,
        history: &[ConversationTurn],
        emotion: &EmotionSample,
        persona: &Persona,
        turn_count: usize,
    ) -> Decision {
        let persona_switch = self.persona_switch(history, emotion, persona);
        let action = self.next_action(history, emotion, turn_count);
        let strategy_hint = Self::strategy_hint(action, emotion).to_string();

        Decision {
            action,
            persona_switch,
            strategy_hint,
        }
    }

    fn persona_switch(
        &self,
        history: &[ConversationTurn],
        emotion: &EmotionSample,
        persona: &Persona,
    ) -> Option<String> {
        if emotion.label.is_distressed()
            && emotion.intensity > self.config.intensity_switch_threshold
            && persona.tone != Tone::Empathetic
        {
            return Some(EMPATHETIC_PERSONA.to_string());
        }

        if matches!(
            emotion.label,
            EmotionLabel::Interested | EmotionLabel::Excited
        ) && persona.tone == Tone::Formal
        {
            return Some(FRIENDLY_PERSONA.to_string());
        }

        // Anti-stall: a long run of neutral turns means the current voice
        // is not landing; force a tone change.
        if Self::trailing_neutral_turns(history) >= self.config.stagnation_turns {
            let target = if persona.tone == Tone::Friendly {
                EMPATHETIC_PERSONA
            } else {
                FRIENDLY_PERSONA
            };
            return Some(target.to_string());
        }

        None
    }

    fn next_action(
        &self,
        history: &[ConversationTurn],
        emotion: &EmotionSample,
        turn_count: usize,
    ) -> NextAction {
        if Self::last_customer_text_signals_disinterest(history)
            && turn_count >= self.config.stagnation_turns
        {
            return NextAction::ScheduleCallback;
        }

        if emotion.label.is_distressed() {
            return NextAction::HandleObjection;
        }

        if emotion.label.is_positive() && turn_count >= self.config.closing_turn_threshold {
            return NextAction::CloseCall;
        }

        if emotion.label == EmotionLabel::Confused || emotion.label.is_positive() {
            return NextAction::ProvideInfo;
        }

        NextAction::AskQuestion
    }

    fn strategy_hint(action: NextAction, emotion: &EmotionSample) -> &'static str {
        match action {
            NextAction::HandleObjection => {
                if emotion.label == EmotionLabel::Angry {
                    "acknowledge_and_deescalate"
                } else {
                    "empathize_and_address_concern"
                }
            },
            NextAction::CloseCall => "summarize_value_and_close",
            NextAction::ScheduleCallback => "offer_callback_politely",
            NextAction::ProvideInfo => "present_relevant_value",
            NextAction::AskQuestion => "build_rapport_and_discover",
        }
    }

    /// Count the trailing run of customer turns classified neutral
    fn trailing_neutral_turns(history: &[ConversationTurn]) -> usize {
        history
            .iter()
            .rev()
            .filter(|turn| turn.speaker == Speaker::Customer)
            .take_while(|turn| {
                turn.emotion
                    .as_ref()
                    .map(|e| e.label == EmotionLabel::Neutral)
                    .unwrap_or(false)
            })
            .count()
    }

    fn last_customer_text_signals_disinterest(history: &[ConversationTurn]) -> bool {
        let Some(turn) = history
            .iter()
            .rev()
            .find(|turn| turn.speaker == Speaker::Customer)
        else {
            return false;
        };
        let text = turn.text.to_lowercase();
        DISINTEREST_MARKERS.iter().any(|marker| text.contains(marker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outcall_core::{PersonaCatalog, SampleSource};

    fn policy() -> DialoguePolicy {
        DialoguePolicy::new(PolicyConfig::default())
    }

    fn sample(label: EmotionLabel, intensity: f32) -> EmotionSample {
        EmotionSample::new(label, 0.9, intensity, SampleSource::Model)
    }

    fn neutral_history(customer_turns: usize) -> Vec<ConversationTurn> {
        let mut history = Vec::new();
        for i in 0..customer_turns {
            history.push(
                ConversationTurn::customer(format!("okay {}", i))
                    .with_emotion(sample(EmotionLabel::Neutral, 0.2)),
            );
            history.push(ConversationTurn::agent("I see.").with_persona("formal"));
        }
        history
    }

    #[test]
    fn test_intense_distress_forces_empathetic_switch() {
        let catalog = PersonaCatalog::standard();
        let emotion = sample(EmotionLabel::Frustrated, 0.85);

        let decision = policy().decide(&[], &emotion, &catalog.formal(), 3);
        assert_eq!(decision.persona_switch.as_deref(), Some(EMPATHETIC_PERSONA));
        assert_eq!(decision.action, NextAction::HandleObjection);

        // Already empathetic: no redundant switch
        let decision = policy().decide(&[], &emotion, &catalog.empathetic(), 3);
        assert_eq!(decision.persona_switch, None);
        assert_eq!(decision.action, NextAction::HandleObjection);
    }

    #[test]
    fn test_mild_distress_keeps_persona() {
        let catalog = PersonaCatalog::standard();
        let emotion = sample(EmotionLabel::Frustrated, 0.4);
        let decision = policy().decide(&[], &emotion, &catalog.formal(), 3);
        assert_eq!(decision.persona_switch, None);
        // Still handled as an objection, just without the voice change
        assert_eq!(decision.action, NextAction::HandleObjection);
    }

    #[test]
    fn test_interest_moves_formal_to_friendly() {
        let catalog = PersonaCatalog::standard();
        let emotion = sample(EmotionLabel::Interested, 0.5);

        let decision = policy().decide(&[], &emotion, &catalog.formal(), 3);
        assert_eq!(decision.persona_switch.as_deref(), Some(FRIENDLY_PERSONA));
        assert_eq!(decision.action, NextAction::ProvideInfo);

        let decision = policy().decide(&[], &emotion, &catalog.friendly(), 3);
        assert_eq!(decision.persona_switch, None);
    }

    #[test]
    fn test_stagnation_forces_a_switch() {
        let catalog = PersonaCatalog::standard();
        let history = neutral_history(10);
        let emotion = sample(EmotionLabel::Neutral, 0.2);

        let decision = policy().decide(&history, &emotion, &catalog.formal(), 10);
        assert_eq!(decision.persona_switch.as_deref(), Some(FRIENDLY_PERSONA));

        // Friendly already in use rotates to empathetic instead
        let decision = policy().decide(&history, &emotion, &catalog.friendly(), 10);
        assert_eq!(decision.persona_switch.as_deref(), Some(EMPATHETIC_PERSONA));

        // One non-neutral turn resets the streak
        let short = neutral_history(9);
        let decision = policy().decide(&short, &emotion, &catalog.formal(), 9);
        assert_eq!(decision.persona_switch, None);
    }

    #[test]
    fn test_late_positive_emotion_closes() {
        let catalog = PersonaCatalog::standard();
        let emotion = sample(EmotionLabel::Excited, 0.6);

        let decision = policy().decide(&[], &emotion, &catalog.friendly(), 9);
        assert_eq!(decision.action, NextAction::CloseCall);
        assert!(decision.action.is_closing());

        // Too early to close, keep informing
        let decision = policy().decide(&[], &emotion, &catalog.friendly(), 4);
        assert_eq!(decision.action, NextAction::ProvideInfo);
    }

    #[test]
    fn test_late_disinterest_schedules_callback() {
        let catalog = PersonaCatalog::standard();
        let mut history = neutral_history(10);
        history.push(
            ConversationTurn::customer("Look, I'm not interested right now.")
                .with_emotion(sample(EmotionLabel::Neutral, 0.3)),
        );
        let emotion = sample(EmotionLabel::Neutral, 0.3);

        let decision = policy().decide(&history, &emotion, &catalog.formal(), 11);
        assert_eq!(decision.action, NextAction::ScheduleCallback);

        // Early disinterest is still worked as discovery
        let early = vec![ConversationTurn::customer("no thanks")
            .with_emotion(sample(EmotionLabel::Neutral, 0.3))];
        let decision = policy().decide(&early, &emotion, &catalog.formal(), 1);
        assert_ne!(decision.action, NextAction::ScheduleCallback);
    }

    #[test]
    fn test_decision_is_pure() {
        let catalog = PersonaCatalog::standard();
        let history = neutral_history(4);
        let emotion = sample(EmotionLabel::Confused, 0.5);
        let persona = catalog.formal();

        let first = policy().decide(&history, &emotion, &persona, 4);
        let second = policy().decide(&history, &emotion, &persona, 4);
        assert_eq!(first.action, second.action);
        assert_eq!(first.persona_switch, second.persona_switch);
        assert_eq!(first.strategy_hint, second.strategy_hint);
    }
}
