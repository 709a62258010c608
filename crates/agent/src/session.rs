//! Per-call conversation session
//!
//! Owns the turn history, the stage machine, and the active persona for one
//! live call, and drives the sequential turn loop: wait for an utterance,
//! classify, decide, generate, speak. Exactly one execution context owns a
//! session; there are no concurrent writers. The only concurrent side
//! effect is the fire-and-forget filler acknowledgment inside the pipeline.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use uuid::Uuid;

use outcall_core::{
    ConversationTurn, EmotionLabel, EmotionSample, GenerationRequest, Persona, PersonaCatalog,
    Stage, TextGenerator, TurnSnapshot,
};
use outcall_pipeline::{AudioStreamPipeline, PipelineError, SynthesisTier};

use crate::policy::{DialoguePolicy, NextAction};
use crate::resolver::EmotionResolver;

/// Variant data assigned by the dispatcher, copied into the session at
/// creation so sessions never share mutable campaign state.
#[derive(Debug, Clone)]
pub struct VariantContext {
    pub campaign_id: String,
    pub variant_id: String,
    pub persona_id: String,
    pub script: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Silence on the inbound side longer than this ends the call
    pub idle_timeout: Duration,
    pub generate_timeout: Duration,
    /// Hard cap on customer turns; the call wraps up when reached
    pub max_turns: usize,
    pub locale: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            generate_timeout: Duration::from_secs(8),
            max_turns: 40,
            locale: "en".to_string(),
        }
    }
}

/// Lifecycle events broadcast to observers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Started {
        session_id: String,
        call_id: String,
        variant_id: String,
    },
    TurnCompleted {
        session_id: String,
        turn_count: usize,
        stage: Stage,
        persona_id: String,
        action: NextAction,
        emotion: EmotionLabel,
        tier: SynthesisTier,
    },
    StageChanged {
        session_id: String,
        from: Stage,
        to: Stage,
    },
    PersonaSwitched {
        session_id: String,
        from: String,
        to: String,
    },
    Ended {
        session_id: String,
        outcome: SessionOutcome,
    },
}

/// Final result of a session, reported back to the dispatcher
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub lead_id: String,
    pub campaign_id: String,
    pub variant_id: String,
    /// The call ran to a normal end rather than dropping or erroring
    pub completed: bool,
    /// The callee's final classified emotion was positive
    pub positive_emotion: bool,
    /// The call closed successfully (reached a close, not a callback)
    pub converted: bool,
    pub turns: usize,
    pub persona_switches: usize,
    pub final_stage: Stage,
}

/// State machine for one call
pub struct ConversationSession {
    id: String,
    lead_id: String,
    variant: VariantContext,
    catalog: PersonaCatalog,
    persona: Arc<Persona>,
    history: Vec<ConversationTurn>,
    emotions: Vec<EmotionSample>,
    stage: Stage,
    turn_count: usize,
    persona_switches: usize,
    converted: bool,
    completed: bool,

    resolver: EmotionResolver,
    policy: DialoguePolicy,
    generator: Arc<dyn TextGenerator>,
    pipeline: AudioStreamPipeline,
    config: SessionConfig,

    events: broadcast::Sender<SessionEvent>,
    shutdown: broadcast::Receiver<()>,
}

impl ConversationSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lead_id: impl Into<String>,
        variant: VariantContext,
        catalog: PersonaCatalog,
        resolver: EmotionResolver,
        policy: DialoguePolicy,
        generator: Arc<dyn TextGenerator>,
        pipeline: AudioStreamPipeline,
        config: SessionConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        let persona = catalog
            .get(&variant.persona_id)
            .unwrap_or_else(|| catalog.formal());
        let (events, _) = broadcast::channel(64);
        Self {
            id: Uuid::new_v4().to_string(),
            lead_id: lead_id.into(),
            variant,
            catalog,
            persona,
            history: Vec::new(),
            emotions: Vec::new(),
            stage: Stage::default(),
            turn_count: 0,
            persona_switches: 0,
            converted: false,
            completed: false,
            resolver,
            policy,
            generator,
            pipeline,
            config,
            events,
            shutdown,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn active_persona(&self) -> &Arc<Persona> {
        &self.persona
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Completes only when a shutdown was actually signalled. A dropped
    /// sender means no shutdown will ever arrive, so the call runs on; a
    /// lagged receiver still saw a signal and treats it as one.
    async fn shutdown_signal(shutdown: &mut broadcast::Receiver<()>) {
        match shutdown.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {},
            Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
        }
    }

    /// Run the call to completion and report the outcome
    pub async fn run(mut self) -> SessionOutcome {
        // Taken out of self so turn steps can race it without aliasing the
        // session borrow. The replacement receiver is never polled.
        let mut shutdown =
            std::mem::replace(&mut self.shutdown, broadcast::channel::<()>(1).1);
        let call_id = self.pipeline.transport().call_id().to_string();
        tracing::info!(
            session_id = %self.id,
            call_id = %call_id,
            lead_id = %self.lead_id,
            variant = %self.variant.variant_id,
            persona = %self.persona.id,
            "session started"
        );
        let _ = self.events.send(SessionEvent::Started {
            session_id: self.id.clone(),
            call_id,
            variant_id: self.variant.variant_id.clone(),
        });

        self.open_with_greeting().await;

        while !self.stage.is_terminal() {
            if self.turn_count >= self.config.max_turns {
                tracing::info!(session_id = %self.id, "turn cap reached, ending call");
                self.transition(Stage::Ended);
                self.completed = true;
                break;
            }
            match self.one_turn(&mut shutdown).await {
                TurnControl::Continue => {},
                TurnControl::IdleTimeout => {
                    // Pure-system transition, no turns appended
                    tracing::info!(session_id = %self.id, "idle timeout, ending call");
                    self.transition(Stage::Ended);
                },
                TurnControl::TransportLost => {
                    tracing::warn!(session_id = %self.id, "transport lost, failing call");
                    self.transition(Stage::Failed);
                },
                TurnControl::ShutDown => {
                    tracing::info!(session_id = %self.id, "shutdown requested, ending call");
                    self.transition(Stage::Ended);
                },
            }
        }

        self.pipeline.transport().close();
        let outcome = self.outcome();
        tracing::info!(
            session_id = %self.id,
            completed = outcome.completed,
            converted = outcome.converted,
            turns = outcome.turns,
            final_stage = %outcome.final_stage,
            "session ended"
        );
        let _ = self.events.send(SessionEvent::Ended {
            session_id: self.id.clone(),
            outcome: outcome.clone(),
        });
        outcome
    }

    /// The agent speaks first on an outbound call
    async fn open_with_greeting(&mut self) {
        let greeting = self
            .persona
            .phrasing_for(&self.config.locale)
            .greeting
            .clone();
        match self.pipeline.speak(&greeting, &self.persona).await {
            Ok(outcome) => {
                self.history.push(
                    ConversationTurn::agent(greeting)
                        .with_persona(self.persona.id.clone())
                        .with_audio(outcome.tier.delivered_audio()),
                );
            },
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "greeting failed, failing call");
                self.transition(Stage::Failed);
            },
        }
    }

    async fn one_turn(&mut self, shutdown: &mut broadcast::Receiver<()>) -> TurnControl {
        // Every await in the loop races the shutdown broadcast; a call that
        // ends mid-generation stops generating instead of finishing the
        // reply first. The inbound wait additionally races the idle timeout.
        let utterance = tokio::select! {
            biased;
            _ = Self::shutdown_signal(shutdown) => return TurnControl::ShutDown,
            result = timeout(self.config.idle_timeout, self.pipeline.next_utterance()) => {
                match result {
                    Ok(Ok(utterance)) => utterance,
                    Ok(Err(PipelineError::TransportClosed)) => return TurnControl::TransportLost,
                    Ok(Err(PipelineError::Transport(e))) => {
                        tracing::warn!(session_id = %self.id, error = %e, "transport error");
                        return TurnControl::TransportLost;
                    },
                    Err(_) => return TurnControl::IdleTimeout,
                }
            },
        };

        self.pipeline.maybe_send_filler(&self.persona, &utterance.text);

        let emotion = tokio::select! {
            biased;
            _ = Self::shutdown_signal(shutdown) => return TurnControl::ShutDown,
            sample = self.resolver.classify(&utterance.text) => sample,
        };
        self.emotions.push(emotion.clone());
        self.history.push(
            ConversationTurn::customer(utterance.text)
                .with_emotion(emotion.clone())
                .with_audio(utterance.heard),
        );
        self.turn_count += 1;

        let decision =
            self.policy
                .decide(&self.history, &emotion, &self.persona, self.turn_count);
        tracing::debug!(
            session_id = %self.id,
            action = decision.action.as_str(),
            hint = %decision.strategy_hint,
            emotion = %emotion.label,
            "policy decision"
        );

        if let Some(target) = decision.persona_switch.as_deref() {
            self.switch_persona(target);
        }
        self.apply_action_stage(decision.action);

        let reply = tokio::select! {
            biased;
            _ = Self::shutdown_signal(shutdown) => return TurnControl::ShutDown,
            reply = self.generate_reply(&decision.strategy_hint, decision.action) => reply,
        };
        let spoken = tokio::select! {
            biased;
            _ = Self::shutdown_signal(shutdown) => return TurnControl::ShutDown,
            result = self.pipeline.speak(&reply, &self.persona) => result,
        };
        match spoken {
            Ok(outcome) => {
                self.history.push(
                    ConversationTurn::agent(reply)
                        .with_persona(self.persona.id.clone())
                        .with_audio(outcome.tier.delivered_audio()),
                );
                tracing::info!(
                    session_id = %self.id,
                    turn = self.turn_count,
                    stage = %self.stage,
                    persona = %self.persona.id,
                    action = decision.action.as_str(),
                    emotion = %emotion.label,
                    emotion_source = emotion.source.as_str(),
                    tier = outcome.tier.as_str(),
                    "turn completed"
                );
                let _ = self.events.send(SessionEvent::TurnCompleted {
                    session_id: self.id.clone(),
                    turn_count: self.turn_count,
                    stage: self.stage,
                    persona_id: self.persona.id.clone(),
                    action: decision.action,
                    emotion: emotion.label,
                    tier: outcome.tier,
                });
            },
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "outbound send failed");
                return TurnControl::TransportLost;
            },
        }

        if decision.action.is_closing() {
            self.converted = decision.action == NextAction::CloseCall;
            self.completed = true;
            self.transition(Stage::Ended);
        }

        TurnControl::Continue
    }

    async fn generate_reply(&self, hint: &str, action: NextAction) -> String {
        let request = GenerationRequest {
            history: self.history.iter().map(TurnSnapshot::from).collect(),
            decision_hint: format!("{}: {}", action.as_str(), hint),
            persona_id: self.persona.id.clone(),
            locale: self.config.locale.clone(),
            script: Some(self.variant.script.clone()),
        };

        match timeout(
            self.config.generate_timeout,
            self.generator.generate(&request),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::warn!(session_id = %self.id, error = %e, "generation failed, using stock reply");
                self.persona
                    .phrasing_for(&self.config.locale)
                    .fallback_reply
                    .clone()
            },
            Err(_) => {
                tracing::warn!(session_id = %self.id, "generation timed out, using stock reply");
                self.persona
                    .phrasing_for(&self.config.locale)
                    .fallback_reply
                    .clone()
            },
        }
    }

    fn switch_persona(&mut self, target: &str) {
        let Some(next) = self.catalog.get(target) else {
            tracing::warn!(session_id = %self.id, target, "unknown persona switch target, keeping current");
            return;
        };
        if next.id == self.persona.id {
            return;
        }
        let from = self.persona.id.clone();
        tracing::info!(session_id = %self.id, %from, to = %next.id, "persona switched");
        let _ = self.events.send(SessionEvent::PersonaSwitched {
            session_id: self.id.clone(),
            from,
            to: next.id.clone(),
        });
        self.persona = next;
        self.persona_switches += 1;
    }

    /// Map the policy action onto the stage machine. Question/info actions
    /// stay within the current stage, except that the first customer turn
    /// moves introduction into discovery.
    fn apply_action_stage(&mut self, action: NextAction) {
        let target = match action {
            NextAction::AskQuestion | NextAction::ProvideInfo => {
                if self.stage == Stage::Introduction {
                    Some(Stage::Discovery)
                } else {
                    None
                }
            },
            NextAction::HandleObjection => Some(Stage::ObjectionHandling),
            NextAction::CloseCall | NextAction::ScheduleCallback => Some(Stage::Closing),
        };
        if let Some(target) = target {
            self.transition(target);
        }
    }

    /// Attempt a stage transition, enforcing the absorbing terminal states
    fn transition(&mut self, target: Stage) {
        if self.stage == target {
            return;
        }
        if !self.stage.can_transition_to(target) {
            tracing::warn!(
                session_id = %self.id,
                from = %self.stage,
                to = %target,
                "stage transition rejected"
            );
            return;
        }
        let from = self.stage;
        self.stage = target;
        let _ = self.events.send(SessionEvent::StageChanged {
            session_id: self.id.clone(),
            from,
            to: target,
        });
    }

    fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            session_id: self.id.clone(),
            lead_id: self.lead_id.clone(),
            campaign_id: self.variant.campaign_id.clone(),
            variant_id: self.variant.variant_id.clone(),
            completed: self.completed && self.stage == Stage::Ended,
            positive_emotion: self
                .emotions
                .last()
                .map(|sample| sample.label.is_positive())
                .unwrap_or(false),
            converted: self.converted,
            turns: self.turn_count,
            persona_switches: self.persona_switches,
            final_stage: self.stage,
        }
    }
}

enum TurnControl {
    Continue,
    IdleTimeout,
    TransportLost,
    ShutDown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use outcall_core::{EmotionLabel, SampleSource};

    fn bare_session_state() -> (Stage, Vec<ConversationTurn>) {
        (Stage::default(), Vec::new())
    }

    #[test]
    fn test_initial_stage_is_introduction() {
        let (stage, history) = bare_session_state();
        assert_eq!(stage, Stage::Introduction);
        assert!(history.is_empty());
    }

    #[test]
    fn test_terminal_stages_reject_everything() {
        // Absorbing-state property over all action-driven targets
        for terminal in [Stage::Ended, Stage::Failed] {
            for target in [
                Stage::Introduction,
                Stage::Discovery,
                Stage::ObjectionHandling,
                Stage::Closing,
                Stage::Ended,
                Stage::Failed,
            ] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn test_outcome_positive_emotion_uses_last_sample() {
        let emotions = vec![
            EmotionSample::new(EmotionLabel::Angry, 0.9, 0.9, SampleSource::Model),
            EmotionSample::new(EmotionLabel::Interested, 0.8, 0.5, SampleSource::Model),
        ];
        assert!(emotions.last().map(|s| s.label.is_positive()).unwrap_or(false));
    }
}
