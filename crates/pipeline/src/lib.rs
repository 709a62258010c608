//! Audio pipeline for one live call
//!
//! Owns the duplex transport for a call: accumulates inbound audio to a
//! minimum chunk size, transcribes it, masks generation latency with filler
//! acknowledgments, and streams synthesized speech back through a ladder of
//! fallback tiers. Nothing here blocks past its configured timeout; a
//! stalled downstream call degrades audio quality, never the connection.

pub mod cache;
pub mod pipeline;

pub use cache::ResponseCache;
pub use pipeline::{
    AudioStreamPipeline, PipelineConfig, SpeakOutcome, SynthesisTier, Utterance,
};

/// Pipeline errors. Transport loss is the only error the pipeline cannot
/// absorb; everything else falls back internally.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("transport closed")]
    TransportClosed,

    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<PipelineError> for outcall_core::Error {
    fn from(err: PipelineError) -> Self {
        outcall_core::Error::Transport(err.to_string())
    }
}
