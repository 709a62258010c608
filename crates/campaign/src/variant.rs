//! Campaigns, script variants, and per-variant counters

use serde::{Deserialize, Serialize};

/// One script/persona combination under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignVariant {
    pub id: String,
    pub persona_id: String,
    pub script: String,
}

/// Outcome counters for one variant. Updated only under the campaign lock.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VariantStats {
    pub calls: u64,
    pub completions: u64,
    pub positive_emotion: u64,
    pub conversions: u64,
}

impl VariantStats {
    /// Conversion rate over calls made so far
    pub fn conversion_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.conversions as f64 / self.calls as f64
        }
    }
}

/// An outbound campaign and its variants under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub locale: String,
    /// Declaration order matters: explore-phase ties break toward the
    /// earlier variant.
    pub variants: Vec<CampaignVariant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_rate() {
        let mut stats = VariantStats::default();
        assert_eq!(stats.conversion_rate(), 0.0);

        stats.calls = 20;
        stats.conversions = 5;
        assert!((stats.conversion_rate() - 0.25).abs() < 1e-9);
    }
}
