//! Campaign-level call dispatch
//!
//! Pulls eligible leads in batches, assigns each a script/persona variant
//! via an explore/exploit bandit, launches calls, and folds call outcomes
//! back into per-variant statistics.

pub mod bandit;
pub mod dispatcher;
pub mod store;
pub mod variant;

pub use bandit::VariantSampler;
pub use dispatcher::{
    CallLauncher, CallOutcome, CampaignDispatcher, DispatcherConfig, VariantAssignment,
};
pub use store::{InMemoryLeadStore, Lead, LeadStore};
pub use variant::{Campaign, CampaignVariant, VariantStats};

#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error("unknown campaign: {0}")]
    UnknownCampaign(String),

    #[error("unknown variant {variant} in campaign {campaign}")]
    UnknownVariant { campaign: String, variant: String },

    #[error("campaign {0} has no variants")]
    NoVariants(String),

    #[error("lead store error: {0}")]
    Store(String),

    #[error("call launch failed: {0}")]
    Launch(String),
}

impl From<CampaignError> for outcall_core::Error {
    fn from(err: CampaignError) -> Self {
        outcall_core::Error::Persistence(err.to_string())
    }
}
