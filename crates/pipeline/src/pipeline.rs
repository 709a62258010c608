//! Per-call audio stream pipeline
//!
//! Turn algorithm:
//! 1. Accumulate inbound bytes until the minimum chunk threshold.
//! 2. Transcribe; on failure substitute a placeholder so the turn advances.
//! 3. For long transcripts, fire a cached filler acknowledgment while the
//!    real reply generates (non-blocking, does not touch session state).
//! 4. Speak the reply through fallback tiers:
//!    cache → streaming synthesis → buffered synthesis → pre-baked phrase
//!    → silent. Each tier gets exactly one attempt, no retries.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

use outcall_core::{AudioFrame, Error, Persona};
use outcall_transport::CallTransport;

use crate::cache::ResponseCache;
use crate::PipelineError;

/// Pipeline configuration for one call
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum accumulated inbound bytes before transcription fires.
    /// Bounds both latency and the rate of transcription calls.
    pub min_chunk_bytes: usize,
    /// Transcript length past which a filler acknowledgment is emitted
    pub filler_threshold_chars: usize,
    /// Synthesized phrases up to this length are cached opportunistically
    pub cacheable_phrase_max_chars: usize,
    pub transcribe_timeout: Duration,
    pub synthesize_timeout: Duration,
    /// Substituted transcript when transcription fails or times out
    pub placeholder_transcript: String,
    /// Locale used for persona stock phrasing
    pub locale: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_chunk_bytes: 4096,
            filler_threshold_chars: 50,
            cacheable_phrase_max_chars: 48,
            transcribe_timeout: Duration::from_secs(5),
            synthesize_timeout: Duration::from_secs(10),
            placeholder_transcript: "Sorry, I could not hear you clearly.".to_string(),
            locale: "en".to_string(),
        }
    }
}

/// A transcribed customer utterance
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    /// False when the text is the placeholder substituted after a
    /// transcription failure
    pub heard: bool,
}

/// Which fallback tier produced the outbound audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisTier {
    Cache,
    Streaming,
    Buffered,
    Prebaked,
    /// All tiers failed; the turn proceeds with text only
    Silent,
}

impl SynthesisTier {
    pub fn delivered_audio(&self) -> bool {
        !matches!(self, SynthesisTier::Silent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SynthesisTier::Cache => "cache",
            SynthesisTier::Streaming => "streaming",
            SynthesisTier::Buffered => "buffered",
            SynthesisTier::Prebaked => "prebaked",
            SynthesisTier::Silent => "silent",
        }
    }
}

/// Result of speaking one reply
#[derive(Debug, Clone, Copy)]
pub struct SpeakOutcome {
    pub tier: SynthesisTier,
    pub bytes_sent: usize,
}

/// Outcome of one synthesis tier attempt: either audio went out, or the
/// tier failed in a way the next tier can absorb. A tier that failed after
/// sending audio is reported separately: the callee has already heard part
/// of the utterance, so replaying it through a lower tier is not an option.
/// Transport failures are surfaced separately and are fatal.
enum TierAttempt {
    Sent(usize),
    Failed(Error),
    FailedPartial { sent: usize, error: Error },
}

/// Duplex audio pipeline for one call
pub struct AudioStreamPipeline {
    transport: Arc<dyn CallTransport>,
    transcriber: Arc<dyn outcall_core::Transcriber>,
    synthesizer: Arc<dyn outcall_core::SpeechSynthesizer>,
    cache: Arc<ResponseCache>,
    config: PipelineConfig,
    /// Inbound accumulation buffer; drained whole at each threshold crossing
    pending: Vec<u8>,
}

impl AudioStreamPipeline {
    pub fn new(
        transport: Arc<dyn CallTransport>,
        transcriber: Arc<dyn outcall_core::Transcriber>,
        synthesizer: Arc<dyn outcall_core::SpeechSynthesizer>,
        cache: Arc<ResponseCache>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            transport,
            transcriber,
            synthesizer,
            cache,
            config,
            pending: Vec::new(),
        }
    }

    pub fn transport(&self) -> &Arc<dyn CallTransport> {
        &self.transport
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Accumulate inbound audio to the chunk threshold and transcribe it.
    ///
    /// Transcription failure or timeout substitutes the placeholder text;
    /// only transport loss is an error.
    pub async fn next_utterance(&mut self) -> Result<Utterance, PipelineError> {
        while self.pending.len() < self.config.min_chunk_bytes {
            match self.transport.recv_frame().await {
                Some(frame) => self.pending.extend_from_slice(&frame.bytes),
                None => return Err(PipelineError::TransportClosed),
            }
        }
        let buffer = std::mem::take(&mut self.pending);

        match timeout(
            self.config.transcribe_timeout,
            self.transcriber.transcribe(&buffer),
        )
        .await
        {
            Ok(Ok(text)) if !text.trim().is_empty() => Ok(Utterance { text, heard: true }),
            Ok(Ok(_)) => {
                tracing::warn!(call_id = %self.transport.call_id(), "empty transcript, substituting placeholder");
                Ok(self.placeholder())
            },
            Ok(Err(e)) => {
                tracing::warn!(call_id = %self.transport.call_id(), error = %e, "transcription failed, substituting placeholder");
                Ok(self.placeholder())
            },
            Err(_) => {
                tracing::warn!(call_id = %self.transport.call_id(), "transcription timed out, substituting placeholder");
                Ok(self.placeholder())
            },
        }
    }

    fn placeholder(&self) -> Utterance {
        Utterance {
            text: self.config.placeholder_transcript.clone(),
            heard: false,
        }
    }

    /// For long transcripts, send a short acknowledgment immediately while
    /// the real reply is generated. Fire-and-forget: failures are logged
    /// and dropped, session state is untouched. Returns whether a filler
    /// was dispatched.
    pub fn maybe_send_filler(&self, persona: &Arc<Persona>, transcript: &str) -> bool {
        if transcript.chars().count() <= self.config.filler_threshold_chars {
            return false;
        }

        let ack = persona
            .phrasing_for(&self.config.locale)
            .acknowledgment
            .clone();
        let persona = persona.clone();
        let transport = self.transport.clone();
        let synthesizer = self.synthesizer.clone();
        let cache = self.cache.clone();
        let synthesize_timeout = self.config.synthesize_timeout;

        tokio::spawn(async move {
            let bytes = match cache.get(&persona.id, &ack) {
                Some(bytes) => bytes,
                None => {
                    match timeout(
                        synthesize_timeout,
                        synthesizer.synthesize(&ack, &persona.id, &persona.synthesis),
                    )
                    .await
                    {
                        Ok(Ok(bytes)) => cache.put(&persona.id, &ack, bytes),
                        Ok(Err(e)) => {
                            tracing::debug!(error = %e, "filler synthesis failed, skipping");
                            return;
                        },
                        Err(_) => {
                            tracing::debug!("filler synthesis timed out, skipping");
                            return;
                        },
                    }
                },
            };
            if let Err(e) = transport.send_frame(AudioFrame::new(bytes.to_vec())).await {
                tracing::debug!(error = %e, "filler send failed");
            }
        });
        true
    }

    /// Speak a reply through the fallback ladder.
    ///
    /// Only transport loss is an error; a fully failed ladder returns a
    /// `Silent` outcome and the caller records a text-only turn.
    pub async fn speak(
        &self,
        text: &str,
        persona: &Persona,
    ) -> Result<SpeakOutcome, PipelineError> {
        // Tier 0: pre-synthesized audio
        if let Some(bytes) = self.cache.get(&persona.id, text) {
            let sent = self.send(&bytes).await?;
            return Ok(SpeakOutcome {
                tier: SynthesisTier::Cache,
                bytes_sent: sent,
            });
        }

        // Tier 1: streaming synthesis, chunks forwarded as they arrive
        match self.stream_tier(text, persona).await? {
            TierAttempt::Sent(sent) => {
                return Ok(SpeakOutcome {
                    tier: SynthesisTier::Streaming,
                    bytes_sent: sent,
                })
            },
            TierAttempt::Failed(e) => {
                tracing::warn!(persona = %persona.id, error = %e, "streaming synthesis failed, trying buffered");
            },
            TierAttempt::FailedPartial { sent, error } => {
                // Part of the reply already reached the callee; the turn
                // ends here rather than repeating the utterance.
                tracing::warn!(
                    persona = %persona.id,
                    error = %error,
                    bytes_sent = sent,
                    "streaming synthesis died after partial audio, skipping fallback"
                );
                return Ok(SpeakOutcome {
                    tier: SynthesisTier::Streaming,
                    bytes_sent: sent,
                });
            },
        }

        // Tier 2: buffered synthesis
        match self.buffered_tier(text, persona).await {
            Ok(bytes) => {
                let sent = self.send(&bytes).await?;
                if text.chars().count() <= self.config.cacheable_phrase_max_chars {
                    // Short phrases recur across calls; keep them for next time
                    self.cache.put(&persona.id, text, bytes);
                }
                return Ok(SpeakOutcome {
                    tier: SynthesisTier::Buffered,
                    bytes_sent: sent,
                });
            },
            Err(e) => {
                tracing::warn!(persona = %persona.id, error = %e, "buffered synthesis failed, trying pre-baked phrase");
            },
        }

        // Tier 3: minimal pre-baked phrase from the warm-up set
        let phrasing = persona.phrasing_for(&self.config.locale);
        for phrase in [&phrasing.acknowledgment, &phrasing.greeting] {
            if let Some(bytes) = self.cache.get(&persona.id, phrase) {
                let sent = self.send(&bytes).await?;
                return Ok(SpeakOutcome {
                    tier: SynthesisTier::Prebaked,
                    bytes_sent: sent,
                });
            }
        }

        // Tier 4: silent turn; text is still recorded by the caller
        tracing::warn!(
            call_id = %self.transport.call_id(),
            persona = %persona.id,
            "all synthesis tiers failed, turn proceeds silently"
        );
        Ok(SpeakOutcome {
            tier: SynthesisTier::Silent,
            bytes_sent: 0,
        })
    }

    async fn send(&self, bytes: &[u8]) -> Result<usize, PipelineError> {
        self.transport
            .send_frame(AudioFrame::new(bytes.to_vec()))
            .await
            .map_err(|e| PipelineError::Transport(e.to_string()))?;
        Ok(bytes.len())
    }

    async fn stream_tier(
        &self,
        text: &str,
        persona: &Persona,
    ) -> Result<TierAttempt, PipelineError> {
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(32);
        let synthesizer = self.synthesizer.clone();
        let text_owned = text.to_string();
        let persona_id = persona.id.clone();
        let params = persona.synthesis.clone();

        let synth_task = tokio::spawn(async move {
            synthesizer
                .stream_synthesize(&text_owned, &persona_id, &params, tx)
                .await
        });

        let deadline = tokio::time::sleep(self.config.synthesize_timeout);
        tokio::pin!(deadline);

        let mut sent = 0usize;
        loop {
            tokio::select! {
                chunk = rx.recv() => match chunk {
                    Some(chunk) => {
                        sent += self.send(&chunk).await?;
                    },
                    None => break,
                },
                _ = &mut deadline => {
                    synth_task.abort();
                    let error = Error::Timeout(self.config.synthesize_timeout);
                    return Ok(if sent > 0 {
                        TierAttempt::FailedPartial { sent, error }
                    } else {
                        TierAttempt::Failed(error)
                    });
                },
            }
        }

        let error = match synth_task.await {
            Ok(Ok(())) if sent > 0 => return Ok(TierAttempt::Sent(sent)),
            Ok(Ok(())) => Error::StreamingSynthesis("no audio produced".to_string()),
            Ok(Err(e)) => e,
            Err(e) => Error::StreamingSynthesis(format!("synthesis task failed: {}", e)),
        };
        Ok(if sent > 0 {
            TierAttempt::FailedPartial { sent, error }
        } else {
            TierAttempt::Failed(error)
        })
    }

    async fn buffered_tier(&self, text: &str, persona: &Persona) -> Result<Vec<u8>, Error> {
        match timeout(
            self.config.synthesize_timeout,
            self.synthesizer
                .synthesize(text, &persona.id, &persona.synthesis),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.config.synthesize_timeout)),
        }
    }
}
