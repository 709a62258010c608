//! Wiring for the outbound calling engine binary

pub mod launcher;
pub mod manifest;

pub use launcher::{Dialer, LoopbackDialer, SessionLauncher};
pub use manifest::CampaignManifest;
