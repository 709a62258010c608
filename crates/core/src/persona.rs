//! Voice personas and the static catalog
//!
//! A persona bundles tone, per-locale phrasing, and synthesis parameters.
//! Personas are immutable after load and shared read-only across sessions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Tone descriptor for a persona
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Formal,
    Empathetic,
    Friendly,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Formal => "formal",
            Tone::Empathetic => "empathetic",
            Tone::Friendly => "friendly",
        }
    }
}

/// Synthesis parameters handed to the speech-synthesis service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisParams {
    /// Voice stability (0.0 = variable, 1.0 = monotone)
    pub stability: f32,
    /// Style exaggeration (0.0 = plain, 1.0 = expressive)
    pub style: f32,
    /// Minimum speaking speed multiplier
    pub speed_min: f32,
    /// Maximum speaking speed multiplier
    pub speed_max: f32,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            stability: 0.6,
            style: 0.3,
            speed_min: 0.9,
            speed_max: 1.1,
        }
    }
}

/// Per-locale stock phrasing for a persona
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phrasing {
    pub greeting: String,
    pub acknowledgment: String,
    pub farewell: String,
    /// Spoken when reply generation fails; keeps the turn moving
    pub fallback_reply: String,
}

impl Phrasing {
    /// Phrases worth pre-synthesizing into the response cache
    pub fn stock_phrases(&self) -> [&str; 3] {
        [&self.greeting, &self.acknowledgment, &self.farewell]
    }
}

/// A named voice persona
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub display_name: String,
    pub tone: Tone,
    /// Locale code → phrasing table
    pub phrasing: HashMap<String, Phrasing>,
    pub synthesis: SynthesisParams,
}

static BARE_PHRASING: once_cell::sync::Lazy<Phrasing> = once_cell::sync::Lazy::new(|| Phrasing {
    greeting: "Hello, thank you for taking my call.".to_string(),
    acknowledgment: "I see.".to_string(),
    farewell: "Thank you for your time. Goodbye.".to_string(),
    fallback_reply: "Could you tell me a little more about that?".to_string(),
});

impl Persona {
    /// Phrasing for a locale, falling back to English, then to the first
    /// available table. A persona with no phrasing at all gets a bare
    /// default rather than a panic.
    pub fn phrasing_for(&self, locale: &str) -> &Phrasing {
        self.phrasing
            .get(locale)
            .or_else(|| self.phrasing.get("en"))
            .or_else(|| self.phrasing.values().next())
            .unwrap_or(&BARE_PHRASING)
    }
}

/// Read-only registry of available personas
///
/// Built once at startup and shared across all sessions. Lookup is by id;
/// the three standard roles are also reachable directly so the dialogue
/// policy can name its switch targets without string constants.
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    personas: Vec<Arc<Persona>>,
}

pub const FORMAL_PERSONA: &str = "formal";
pub const EMPATHETIC_PERSONA: &str = "empathetic";
pub const FRIENDLY_PERSONA: &str = "friendly";

impl PersonaCatalog {
    /// The standard three-persona catalog
    pub fn standard() -> Self {
        Self {
            personas: vec![
                Arc::new(formal_persona()),
                Arc::new(empathetic_persona()),
                Arc::new(friendly_persona()),
            ],
        }
    }

    /// Build a catalog from explicit personas (configuration-driven setups)
    pub fn from_personas(personas: Vec<Persona>) -> Self {
        Self {
            personas: personas.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Persona>> {
        self.personas.iter().find(|p| p.id == id).cloned()
    }

    pub fn all(&self) -> &[Arc<Persona>] {
        &self.personas
    }

    /// Role accessors fall back to the first catalog entry, and for a
    /// catalog loaded with no personas at all, to the built-in standard
    /// persona for that role.
    pub fn formal(&self) -> Arc<Persona> {
        self.get(FORMAL_PERSONA)
            .or_else(|| self.personas.first().cloned())
            .unwrap_or_else(|| Arc::new(formal_persona()))
    }

    pub fn empathetic(&self) -> Arc<Persona> {
        self.get(EMPATHETIC_PERSONA)
            .or_else(|| self.personas.first().cloned())
            .unwrap_or_else(|| Arc::new(empathetic_persona()))
    }

    pub fn friendly(&self) -> Arc<Persona> {
        self.get(FRIENDLY_PERSONA)
            .or_else(|| self.personas.first().cloned())
            .unwrap_or_else(|| Arc::new(friendly_persona()))
    }
}

fn formal_persona() -> Persona {
    let mut phrasing = HashMap::new();
    phrasing.insert(
        "en".to_string(),
        Phrasing {
            greeting: "Good day. Thank you for taking my call.".to_string(),
            acknowledgment: "I see, thank you.".to_string(),
            farewell: "Thank you for your time. Goodbye.".to_string(),
            fallback_reply: "Understood. Could you tell me a little more about that?".to_string(),
        },
    );
    phrasing.insert(
        "es".to_string(),
        Phrasing {
            greeting: "Buenos días. Gracias por atender mi llamada.".to_string(),
            acknowledgment: "Entiendo, gracias.".to_string(),
            farewell: "Gracias por su tiempo. Adiós.".to_string(),
            fallback_reply: "Entendido. ¿Podría contarme un poco más?".to_string(),
        },
    );
    Persona {
        id: FORMAL_PERSONA.to_string(),
        display_name: "Morgan".to_string(),
        tone: Tone::Formal,
        phrasing,
        synthesis: SynthesisParams {
            stability: 0.8,
            style: 0.15,
            speed_min: 0.9,
            speed_max: 1.0,
        },
    }
}

fn empathetic_persona() -> Persona {
    let mut phrasing = HashMap::new();
    phrasing.insert(
        "en".to_string(),
        Phrasing {
            greeting: "Hi there, thanks so much for picking up.".to_string(),
            acknowledgment: "I completely understand.".to_string(),
            farewell: "Thanks again for your patience. Take care.".to_string(),
            fallback_reply: "I hear you. Let me make sure I understand what matters to you."
                .to_string(),
        },
    );
    phrasing.insert(
        "es".to_string(),
        Phrasing {
            greeting: "Hola, muchas gracias por contestar.".to_string(),
            acknowledgment: "Lo entiendo perfectamente.".to_string(),
            farewell: "Gracias de nuevo por su paciencia. Cuídese.".to_string(),
            fallback_reply: "Le escucho. Quiero asegurarme de entender lo que le importa."
                .to_string(),
        },
    );
    Persona {
        id: EMPATHETIC_PERSONA.to_string(),
        display_name: "Sam".to_string(),
        tone: Tone::Empathetic,
        phrasing,
        synthesis: SynthesisParams {
            stability: 0.5,
            style: 0.45,
            speed_min: 0.85,
            speed_max: 1.0,
        },
    }
}

fn friendly_persona() -> Persona {
    let mut phrasing = HashMap::new();
    phrasing.insert(
        "en".to_string(),
        Phrasing {
            greeting: "Hey! Great to reach you.".to_string(),
            acknowledgment: "Got it!".to_string(),
            farewell: "Awesome talking with you. Bye for now!".to_string(),
            fallback_reply: "Nice! Tell me more about what you're looking for.".to_string(),
        },
    );
    phrasing.insert(
        "es".to_string(),
        Phrasing {
            greeting: "¡Hola! Qué bueno poder hablar con usted.".to_string(),
            acknowledgment: "¡Perfecto!".to_string(),
            farewell: "¡Un gusto hablar con usted! Hasta luego.".to_string(),
            fallback_reply: "¡Genial! Cuénteme más sobre lo que busca.".to_string(),
        },
    );
    Persona {
        id: FRIENDLY_PERSONA.to_string(),
        display_name: "Alex".to_string(),
        tone: Tone::Friendly,
        phrasing,
        synthesis: SynthesisParams {
            stability: 0.45,
            style: 0.6,
            speed_min: 1.0,
            speed_max: 1.15,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_roles() {
        let catalog = PersonaCatalog::standard();
        assert_eq!(catalog.all().len(), 3);
        assert_eq!(catalog.formal().tone, Tone::Formal);
        assert_eq!(catalog.empathetic().tone, Tone::Empathetic);
        assert_eq!(catalog.friendly().tone, Tone::Friendly);
        assert!(catalog.get("nonexistent").is_none());
    }

    #[test]
    fn test_empty_catalog_role_accessors_use_built_ins() {
        let catalog = PersonaCatalog::from_personas(vec![]);
        assert_eq!(catalog.formal().id, FORMAL_PERSONA);
        assert_eq!(catalog.empathetic().id, EMPATHETIC_PERSONA);
        assert_eq!(catalog.friendly().id, FRIENDLY_PERSONA);
    }

    #[test]
    fn test_partial_catalog_role_accessors_use_first_entry() {
        let catalog = PersonaCatalog::from_personas(vec![formal_persona()]);
        assert_eq!(catalog.empathetic().id, FORMAL_PERSONA);
        assert_eq!(catalog.friendly().id, FORMAL_PERSONA);
    }

    #[test]
    fn test_phrasing_locale_fallback() {
        let catalog = PersonaCatalog::standard();
        let persona = catalog.formal();
        // Unknown locale falls back to English
        let phrasing = persona.phrasing_for("fr");
        assert_eq!(phrasing.greeting, persona.phrasing_for("en").greeting);
        // Known locale is used as-is
        assert_ne!(
            persona.phrasing_for("es").greeting,
            persona.phrasing_for("en").greeting
        );
    }

    #[test]
    fn test_stock_phrases_cover_warmup_set() {
        let catalog = PersonaCatalog::standard();
        for persona in catalog.all() {
            let phrases = persona.phrasing_for("en").stock_phrases();
            assert_eq!(phrases.len(), 3);
            assert!(phrases.iter().all(|p| !p.is_empty()));
        }
    }
}
