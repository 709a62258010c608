//! Campaign manifest
//!
//! Local deployments describe their campaigns and seed leads in one TOML
//! file loaded at startup. A production deployment would register
//! campaigns against an external store instead.

use serde::Deserialize;
use std::path::Path;

use outcall_campaign::{Campaign, Lead};

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignManifest {
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub leads: Vec<Lead>,
}

impl CampaignManifest {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let manifest: CampaignManifest = toml::from_str(&raw)?;
        for campaign in &manifest.campaigns {
            anyhow::ensure!(
                !campaign.variants.is_empty(),
                "campaign {} has no variants",
                campaign.id
            );
        }
        Ok(manifest)
    }
}
