//! Conversation session engine
//!
//! One `ConversationSession` per active call. The session composes the
//! emotion resolver, the dialogue policy, and the audio pipeline into a
//! strictly sequential turn loop: transcribe, classify, decide, generate,
//! speak. Sessions share nothing mutable; personas and variant data are
//! copied in at assignment.

pub mod policy;
pub mod resolver;
pub mod session;

pub use policy::{Decision, DialoguePolicy, NextAction, PolicyConfig};
pub use resolver::{EmotionResolver, ResolverConfig};
pub use session::{
    ConversationSession, SessionConfig, SessionEvent, SessionOutcome, VariantContext,
};
