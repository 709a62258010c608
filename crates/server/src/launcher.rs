//! Session launching
//!
//! `SessionLauncher` is the bridge between the dispatcher and the session
//! engine: for each assigned lead it dials a transport, assembles the
//! per-call pipeline and session from the shared service clients, runs the
//! call, and maps the session outcome back into dispatcher terms.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

use outcall_agent::{
    ConversationSession, DialoguePolicy, EmotionResolver, PolicyConfig, ResolverConfig,
    SessionConfig, VariantContext,
};
use outcall_campaign::{CallLauncher, CallOutcome, CampaignError, Lead, VariantAssignment};
use outcall_config::Settings;
use outcall_core::{
    EmotionClassifier, PersonaCatalog, SpeechSynthesizer, TextGenerator, Transcriber,
};
use outcall_pipeline::{AudioStreamPipeline, PipelineConfig, ResponseCache};
use outcall_transport::{CallTransport, ChannelTransport};

/// Produces a live transport for a lead. Implemented by the telephony
/// adapter in a real deployment.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    async fn dial(&self, lead: &Lead) -> Result<Arc<dyn CallTransport>, CampaignError>;
}

/// In-process dialer for dry runs: the far side drains outbound audio and
/// never speaks, so every call ends on the idle timeout. Useful for
/// exercising the full wiring without a telephony gateway.
pub struct LoopbackDialer;

#[async_trait]
impl Dialer for LoopbackDialer {
    async fn dial(&self, lead: &Lead) -> Result<Arc<dyn CallTransport>, CampaignError> {
        let call_id = format!("loopback-{}", lead.id);
        let conversation_id = format!("conv-{}", lead.id);
        let (transport, mut peer) = ChannelTransport::pair(call_id, conversation_id, 64);
        tokio::spawn(async move {
            while peer.recv_outbound().await.is_some() {}
        });
        Ok(Arc::new(transport))
    }
}

/// Builds and runs one session per launched call
pub struct SessionLauncher {
    dialer: Arc<dyn Dialer>,
    classifier: Arc<dyn EmotionClassifier>,
    generator: Arc<dyn TextGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    transcriber: Arc<dyn Transcriber>,
    cache: Arc<ResponseCache>,
    catalog: PersonaCatalog,
    settings: Settings,
    shutdown: broadcast::Sender<()>,
}

impl SessionLauncher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dialer: Arc<dyn Dialer>,
        classifier: Arc<dyn EmotionClassifier>,
        generator: Arc<dyn TextGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        transcriber: Arc<dyn Transcriber>,
        cache: Arc<ResponseCache>,
        catalog: PersonaCatalog,
        settings: Settings,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            dialer,
            classifier,
            generator,
            synthesizer,
            transcriber,
            cache,
            catalog,
            settings,
            shutdown,
        }
    }

    fn pipeline_config(&self, locale: &str) -> PipelineConfig {
        PipelineConfig {
            min_chunk_bytes: self.settings.pipeline.min_chunk_bytes,
            filler_threshold_chars: self.settings.pipeline.filler_threshold_chars,
            cacheable_phrase_max_chars: self.settings.pipeline.cacheable_phrase_max_chars,
            transcribe_timeout: self.settings.timeouts.transcribe(),
            synthesize_timeout: self.settings.timeouts.synthesize(),
            locale: locale.to_string(),
            ..PipelineConfig::default()
        }
    }
}

#[async_trait]
impl CallLauncher for SessionLauncher {
    async fn launch(
        &self,
        lead: Lead,
        assignment: VariantAssignment,
    ) -> Result<CallOutcome, CampaignError> {
        let transport = self.dialer.dial(&lead).await?;

        let pipeline = AudioStreamPipeline::new(
            transport,
            self.transcriber.clone(),
            self.synthesizer.clone(),
            self.cache.clone(),
            self.pipeline_config(&assignment.locale),
        );
        let resolver = EmotionResolver::new(
            self.classifier.clone(),
            ResolverConfig {
                classify_timeout: self.settings.timeouts.classify(),
            },
        );
        let policy = DialoguePolicy::new(PolicyConfig {
            intensity_switch_threshold: self.settings.dialogue.intensity_switch_threshold,
            stagnation_turns: self.settings.dialogue.stagnation_turns,
            closing_turn_threshold: self.settings.dialogue.closing_turn_threshold,
        });

        let session = ConversationSession::new(
            lead.id.clone(),
            VariantContext {
                campaign_id: assignment.campaign_id,
                variant_id: assignment.variant_id,
                persona_id: assignment.persona_id,
                script: assignment.script,
            },
            self.catalog.clone(),
            resolver,
            policy,
            self.generator.clone(),
            pipeline,
            SessionConfig {
                idle_timeout: self.settings.session.idle_timeout(),
                generate_timeout: self.settings.timeouts.generate(),
                max_turns: self.settings.session.max_turns,
                locale: assignment.locale,
            },
            self.shutdown.subscribe(),
        );

        let outcome = session.run().await;
        Ok(CallOutcome {
            completed: outcome.completed,
            positive_emotion: outcome.positive_emotion,
            converted: outcome.converted,
        })
    }
}
