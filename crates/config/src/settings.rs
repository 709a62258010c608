//! Main settings module
//!
//! Settings are layered: built-in defaults, then an optional TOML file,
//! then `OUTCALL_`-prefixed environment variables (double underscore as the
//! section separator, e.g. `OUTCALL_SERVICES__EMOTION_URL`).

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Endpoints for the external intelligence services
    #[serde(default)]
    pub services: ServiceSettings,

    /// Per-call-type timeouts
    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// Audio pipeline thresholds
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Dialogue policy knobs
    #[serde(default)]
    pub dialogue: DialogueSettings,

    /// Per-session limits
    #[serde(default)]
    pub session: SessionSettings,

    /// Campaign dispatcher cadence
    #[serde(default)]
    pub dispatcher: DispatcherSettings,
}

/// External service endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(default = "default_emotion_url")]
    pub emotion_url: String,
    #[serde(default = "default_generation_url")]
    pub generation_url: String,
    #[serde(default = "default_synthesis_url")]
    pub synthesis_url: String,
    #[serde(default = "default_transcription_url")]
    pub transcription_url: String,
    /// Bearer token shared by the provider deployment, if required
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_emotion_url() -> String {
    "http://localhost:8091".to_string()
}
fn default_generation_url() -> String {
    "http://localhost:8092".to_string()
}
fn default_synthesis_url() -> String {
    "http://localhost:8093".to_string()
}
fn default_transcription_url() -> String {
    "http://localhost:8094".to_string()
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            emotion_url: default_emotion_url(),
            generation_url: default_generation_url(),
            synthesis_url: default_synthesis_url(),
            transcription_url: default_transcription_url(),
            api_key: None,
        }
    }
}

/// Timeouts for external calls. A timed-out call falls back exactly like a
/// failed call; nothing in the live pipeline blocks past these bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_classify_ms")]
    pub classify_ms: u64,
    #[serde(default = "default_generate_ms")]
    pub generate_ms: u64,
    #[serde(default = "default_synthesize_ms")]
    pub synthesize_ms: u64,
    #[serde(default = "default_transcribe_ms")]
    pub transcribe_ms: u64,
}

fn default_classify_ms() -> u64 {
    5_000
}
fn default_generate_ms() -> u64 {
    8_000
}
fn default_synthesize_ms() -> u64 {
    10_000
}
fn default_transcribe_ms() -> u64 {
    5_000
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            classify_ms: default_classify_ms(),
            generate_ms: default_generate_ms(),
            synthesize_ms: default_synthesize_ms(),
            transcribe_ms: default_transcribe_ms(),
        }
    }
}

impl TimeoutSettings {
    pub fn classify(&self) -> Duration {
        Duration::from_millis(self.classify_ms)
    }
    pub fn generate(&self) -> Duration {
        Duration::from_millis(self.generate_ms)
    }
    pub fn synthesize(&self) -> Duration {
        Duration::from_millis(self.synthesize_ms)
    }
    pub fn transcribe(&self) -> Duration {
        Duration::from_millis(self.transcribe_ms)
    }
}

/// Audio pipeline thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Minimum accumulated inbound bytes before transcription fires
    #[serde(default = "default_min_chunk_bytes")]
    pub min_chunk_bytes: usize,
    /// Transcript length past which a filler acknowledgment is emitted
    /// while the real reply generates
    #[serde(default = "default_filler_threshold_chars")]
    pub filler_threshold_chars: usize,
    /// Synthesized phrases up to this length are cached opportunistically
    #[serde(default = "default_cacheable_phrase_max_chars")]
    pub cacheable_phrase_max_chars: usize,
    /// Bound on the per-session inbound frame queue
    #[serde(default = "default_inbound_queue_frames")]
    pub inbound_queue_frames: usize,
}

fn default_min_chunk_bytes() -> usize {
    4096
}
fn default_filler_threshold_chars() -> usize {
    50
}
fn default_cacheable_phrase_max_chars() -> usize {
    48
}
fn default_inbound_queue_frames() -> usize {
    64
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            min_chunk_bytes: default_min_chunk_bytes(),
            filler_threshold_chars: default_filler_threshold_chars(),
            cacheable_phrase_max_chars: default_cacheable_phrase_max_chars(),
            inbound_queue_frames: default_inbound_queue_frames(),
        }
    }
}

/// Dialogue policy knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueSettings {
    /// Emotion intensity above which a distressed label forces the
    /// empathetic persona
    #[serde(default = "default_intensity_switch_threshold")]
    pub intensity_switch_threshold: f32,
    /// Turns of flat neutral emotion before a persona switch is forced
    #[serde(default = "default_stagnation_turns")]
    pub stagnation_turns: usize,
    /// Earliest turn at which sustained positive emotion triggers a close
    #[serde(default = "default_closing_turn_threshold")]
    pub closing_turn_threshold: usize,
}

fn default_intensity_switch_threshold() -> f32 {
    0.7
}
fn default_stagnation_turns() -> usize {
    10
}
fn default_closing_turn_threshold() -> usize {
    8
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self {
            intensity_switch_threshold: default_intensity_switch_threshold(),
            stagnation_turns: default_stagnation_turns(),
            closing_turn_threshold: default_closing_turn_threshold(),
        }
    }
}

/// Per-session limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Idle time with no inbound audio before the call ends
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Hard cap on turns per call
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Default locale for personas and scripts
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_idle_timeout_ms() -> u64 {
    30_000
}
fn default_max_turns() -> usize {
    40
}
fn default_locale() -> String {
    "en".to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout_ms(),
            max_turns: default_max_turns(),
            locale: default_locale(),
        }
    }
}

impl SessionSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// Campaign dispatcher cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherSettings {
    /// Interval between lead batches
    #[serde(default = "default_batch_interval_secs")]
    pub batch_interval_secs: u64,
    /// Backoff after a failed batch (store unavailable etc.)
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
    /// Leads pulled per batch
    #[serde(default = "default_lead_batch_size")]
    pub lead_batch_size: usize,
    /// Explore phase: minimum calls per variant before exploitation
    #[serde(default = "default_explore_rounds_per_variant")]
    pub explore_rounds_per_variant: u64,
}

fn default_batch_interval_secs() -> u64 {
    30
}
fn default_error_backoff_secs() -> u64 {
    60
}
fn default_lead_batch_size() -> usize {
    10
}
fn default_explore_rounds_per_variant() -> u64 {
    10
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            batch_interval_secs: default_batch_interval_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            lead_batch_size: default_lead_batch_size(),
            explore_rounds_per_variant: default_explore_rounds_per_variant(),
        }
    }
}

impl DispatcherSettings {
    pub fn batch_interval(&self) -> Duration {
        Duration::from_secs(self.batch_interval_secs)
    }
    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from an optional file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let config = builder
            .add_source(Environment::with_prefix("OUTCALL").separator("__"))
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, url) in [
            ("services.emotion_url", &self.services.emotion_url),
            ("services.generation_url", &self.services.generation_url),
            ("services.synthesis_url", &self.services.synthesis_url),
            (
                "services.transcription_url",
                &self.services.transcription_url,
            ),
        ] {
            if url.is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
            }
        }

        if !(0.0..=1.0).contains(&self.dialogue.intensity_switch_threshold) {
            return Err(ConfigError::Invalid(
                "dialogue.intensity_switch_threshold must be in [0, 1]".to_string(),
            ));
        }
        if self.pipeline.min_chunk_bytes == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.min_chunk_bytes must be positive".to_string(),
            ));
        }
        if self.pipeline.inbound_queue_frames == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.inbound_queue_frames must be positive".to_string(),
            ));
        }
        if self.dispatcher.lead_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "dispatcher.lead_batch_size must be positive".to_string(),
            ));
        }
        if self.session.max_turns == 0 {
            return Err(ConfigError::Invalid(
                "session.max_turns must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.timeouts.classify(), Duration::from_secs(5));
        assert_eq!(settings.pipeline.min_chunk_bytes, 4096);
        assert_eq!(settings.dialogue.stagnation_turns, 10);
        assert_eq!(settings.dispatcher.batch_interval(), Duration::from_secs(30));
        assert_eq!(settings.dispatcher.error_backoff(), Duration::from_secs(60));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
environment = "production"

[services]
emotion_url = "http://emotion.internal:9000"

[pipeline]
min_chunk_bytes = 8192

[dispatcher]
lead_batch_size = 25
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert!(settings.environment.is_production());
        assert_eq!(settings.services.emotion_url, "http://emotion.internal:9000");
        // Untouched sections keep defaults
        assert_eq!(settings.services.generation_url, default_generation_url());
        assert_eq!(settings.pipeline.min_chunk_bytes, 8192);
        assert_eq!(settings.dispatcher.lead_batch_size, 25);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let settings = Settings::load(Some(Path::new("/nonexistent/outcall.toml"))).unwrap();
        assert_eq!(settings.pipeline.min_chunk_bytes, 4096);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.services.emotion_url.clear();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.dialogue.intensity_switch_threshold = 1.5;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.pipeline.min_chunk_bytes = 0;
        assert!(settings.validate().is_err());
    }
}
