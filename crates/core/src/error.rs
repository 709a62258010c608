//! Error taxonomy shared across the engine
//!
//! Intelligence-service failures (classification, generation, synthesis,
//! transcription) are recovered locally with a fallback tier and never
//! surface to the callee. Transport failures are fatal to the session.
//! Persistence failures are retried at the dispatcher's batch boundary only.

use std::time::Duration;

/// Engine-wide error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("classification failure: {0}")]
    Classification(String),

    #[error("generation failure: {0}")]
    Generation(String),

    #[error("streaming synthesis failure: {0}")]
    StreamingSynthesis(String),

    #[error("buffered synthesis failure: {0}")]
    BufferedSynthesis(String),

    #[error("transcription failure: {0}")]
    Transcription(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Whether this failure ends the session (vs. falling back locally)
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
