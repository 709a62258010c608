//! Configuration for the outbound calling engine

pub mod settings;

pub use settings::{
    DialogueSettings, DispatcherSettings, PipelineSettings, RuntimeEnvironment, ServiceSettings,
    SessionSettings, Settings, TimeoutSettings,
};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
