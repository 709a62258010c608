//! Response cache for synthesized audio
//!
//! Keyed by `(persona id, normalized text)`. Entries are write-once: a hit
//! always returns byte-identical audio for the same key, and racing
//! duplicate synthesis simply keeps the first entry. Pre-warmed at startup
//! with each persona's stock greeting/acknowledgment phrases so the first
//! response never waits on live synthesis; a miss just routes to synthesis,
//! so the cache is never a correctness dependency.

use dashmap::DashMap;
use std::sync::Arc;

use outcall_core::{PersonaCatalog, SpeechSynthesizer};

/// Normalize text for cache keying: case, surrounding space, and internal
/// whitespace runs are not significant.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Write-once audio cache shared across sessions
#[derive(Default)]
pub struct ResponseCache {
    entries: DashMap<(String, String), Arc<Vec<u8>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up cached audio for an exact (persona, normalized text) key
    pub fn get(&self, persona_id: &str, text: &str) -> Option<Arc<Vec<u8>>> {
        self.entries
            .get(&(persona_id.to_string(), normalize(text)))
            .map(|entry| entry.value().clone())
    }

    /// Insert audio for a key. If the key already exists the existing bytes
    /// are kept and returned; duplicate computation is harmless by design.
    pub fn put(&self, persona_id: &str, text: &str, bytes: Vec<u8>) -> Arc<Vec<u8>> {
        self.entries
            .entry((persona_id.to_string(), normalize(text)))
            .or_insert_with(|| Arc::new(bytes))
            .value()
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pre-synthesize each persona's stock phrases for the given locale.
    ///
    /// Failures are logged and skipped; warm-up is a latency optimization
    /// and must never block startup on a flaky synthesis service. Returns
    /// the number of entries warmed.
    pub async fn warm(
        &self,
        synthesizer: &dyn SpeechSynthesizer,
        catalog: &PersonaCatalog,
        locale: &str,
    ) -> usize {
        let mut warmed = 0;
        for persona in catalog.all() {
            for phrase in persona.phrasing_for(locale).stock_phrases() {
                if self.get(&persona.id, phrase).is_some() {
                    continue;
                }
                match synthesizer
                    .synthesize(phrase, &persona.id, &persona.synthesis)
                    .await
                {
                    Ok(bytes) => {
                        self.put(&persona.id, phrase, bytes);
                        warmed += 1;
                    },
                    Err(e) => {
                        tracing::warn!(
                            persona = %persona.id,
                            error = %e,
                            "cache warm-up synthesis failed, skipping phrase"
                        );
                    },
                }
            }
        }
        tracing::info!(warmed, total = self.len(), "response cache warmed");
        warmed
    }
}
