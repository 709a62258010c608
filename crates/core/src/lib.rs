//! Core traits and types for the outbound calling engine
//!
//! This crate provides foundational types used across all other crates:
//! - Emotion samples and the fixed emotion vocabulary
//! - Personas and the static persona catalog
//! - Conversation turns and the call stage machine
//! - Audio frame types
//! - Traits for the external intelligence services
//! - Error types

pub mod audio;
pub mod conversation;
pub mod emotion;
pub mod error;
pub mod persona;
pub mod traits;

pub use audio::AudioFrame;
pub use conversation::{ConversationTurn, Speaker, Stage};
pub use emotion::{EmotionLabel, EmotionSample, SampleSource};
pub use error::{Error, Result};
pub use persona::{
    Persona, PersonaCatalog, Phrasing, SynthesisParams, Tone, EMPATHETIC_PERSONA, FORMAL_PERSONA,
    FRIENDLY_PERSONA,
};
pub use traits::{
    EmotionClassifier, EmotionScores, GenerationRequest, SpeechSynthesizer, Transcriber,
    TextGenerator, TurnSnapshot,
};
