//! Campaign dispatcher
//!
//! Periodically pulls a batch of eligible leads per campaign, assigns each
//! a variant, and launches the calls. Call outcomes update the variant
//! counters under the campaign lock; the conversion rate is recomputed from
//! the committed counters, never from a snapshot taken before the write.

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::bandit::VariantSampler;
use crate::store::{Lead, LeadStore};
use crate::variant::{Campaign, VariantStats};
use crate::CampaignError;

/// Variant data copied out for one call. Sessions hold this snapshot, not
/// a reference into campaign state.
#[derive(Debug, Clone)]
pub struct VariantAssignment {
    pub campaign_id: String,
    pub variant_id: String,
    pub persona_id: String,
    pub script: String,
    pub locale: String,
}

/// What a finished call reports back
#[derive(Debug, Clone, Copy)]
pub struct CallOutcome {
    pub completed: bool,
    pub positive_emotion: bool,
    pub converted: bool,
}

/// Places a call for a lead and runs it to completion
#[async_trait::async_trait]
pub trait CallLauncher: Send + Sync + 'static {
    async fn launch(
        &self,
        lead: Lead,
        assignment: VariantAssignment,
    ) -> Result<CallOutcome, CampaignError>;
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub batch_interval: Duration,
    /// Wait after a failed batch before the next attempt
    pub error_backoff: Duration,
    pub lead_batch_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_interval: Duration::from_secs(30),
            error_backoff: Duration::from_secs(60),
            lead_batch_size: 10,
        }
    }
}

struct CampaignState {
    campaign: Campaign,
    /// Parallel to `campaign.variants`
    stats: Vec<VariantStats>,
    rng: StdRng,
}

/// Outcome write that failed at the store; retried at the next batch
struct PendingWrite {
    lead_id: String,
    completed: bool,
    converted: bool,
}

pub struct CampaignDispatcher {
    campaigns: DashMap<String, Mutex<CampaignState>>,
    store: Arc<dyn LeadStore>,
    launcher: Arc<dyn CallLauncher>,
    sampler: VariantSampler,
    config: DispatcherConfig,
    /// Leads with a call currently in flight, excluded from batches
    in_flight: DashSet<String>,
    pending_writes: Mutex<Vec<PendingWrite>>,
}

impl CampaignDispatcher {
    pub fn new(
        store: Arc<dyn LeadStore>,
        launcher: Arc<dyn CallLauncher>,
        sampler: VariantSampler,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            campaigns: DashMap::new(),
            store,
            launcher,
            sampler,
            config,
            in_flight: DashSet::new(),
            pending_writes: Mutex::new(Vec::new()),
        }
    }

    /// Register a campaign for dispatching. A campaign with no variants has
    /// nothing to assign and is rejected up front.
    pub fn register_campaign(&self, campaign: Campaign) -> Result<(), CampaignError> {
        if campaign.variants.is_empty() {
            return Err(CampaignError::NoVariants(campaign.id));
        }
        let stats = vec![VariantStats::default(); campaign.variants.len()];
        tracing::info!(
            campaign_id = %campaign.id,
            variants = campaign.variants.len(),
            "campaign registered"
        );
        self.campaigns.insert(
            campaign.id.clone(),
            Mutex::new(CampaignState {
                campaign,
                stats,
                rng: StdRng::from_entropy(),
            }),
        );
        Ok(())
    }

    pub fn variant_stats(&self, campaign_id: &str) -> Option<Vec<VariantStats>> {
        self.campaigns
            .get(campaign_id)
            .map(|state| state.lock().stats.clone())
    }

    /// Assign a variant for the next call. The variant's call counter is
    /// incremented at assignment time so the explore phase sees in-flight
    /// calls.
    pub fn select_variant(&self, campaign_id: &str) -> Result<VariantAssignment, CampaignError> {
        let state = self
            .campaigns
            .get(campaign_id)
            .ok_or_else(|| CampaignError::UnknownCampaign(campaign_id.to_string()))?;
        let mut state = state.lock();

        let exploring = self.sampler.is_exploring(&state.stats);
        let index = {
            let CampaignState { stats, rng, .. } = &mut *state;
            self.sampler.select(stats, rng)
        };
        state.stats[index].calls += 1;

        let variant = &state.campaign.variants[index];
        tracing::debug!(
            campaign_id,
            variant_id = %variant.id,
            exploring,
            calls = state.stats[index].calls,
            "variant assigned"
        );
        Ok(VariantAssignment {
            campaign_id: state.campaign.id.clone(),
            variant_id: variant.id.clone(),
            persona_id: variant.persona_id.clone(),
            script: variant.script.clone(),
            locale: state.campaign.locale.clone(),
        })
    }

    /// Fold one call outcome into the variant counters
    pub fn record_outcome(
        &self,
        campaign_id: &str,
        variant_id: &str,
        outcome: CallOutcome,
    ) -> Result<(), CampaignError> {
        let state = self
            .campaigns
            .get(campaign_id)
            .ok_or_else(|| CampaignError::UnknownCampaign(campaign_id.to_string()))?;
        let mut state = state.lock();

        let index = state
            .campaign
            .variants
            .iter()
            .position(|v| v.id == variant_id)
            .ok_or_else(|| CampaignError::UnknownVariant {
                campaign: campaign_id.to_string(),
                variant: variant_id.to_string(),
            })?;

        let stats = &mut state.stats[index];
        if outcome.completed {
            stats.completions += 1;
        }
        if outcome.positive_emotion {
            stats.positive_emotion += 1;
        }
        if outcome.converted {
            stats.conversions += 1;
        }
        // Rate read happens after the counter writes commit, under the
        // same lock hold.
        let rate = stats.conversion_rate();
        tracing::info!(
            campaign_id,
            variant_id,
            completed = outcome.completed,
            converted = outcome.converted,
            conversion_rate = rate,
            "call outcome recorded"
        );
        Ok(())
    }

    /// Run batches until shutdown. A failing batch backs off and retries
    /// rather than exiting.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.config.batch_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("dispatcher shutting down");
                    return;
                },
                _ = interval.tick() => {},
            }

            if let Err(e) = self.clone().run_batch().await {
                tracing::warn!(error = %e, backoff_secs = self.config.error_backoff.as_secs(), "batch failed, backing off");
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => return,
                    _ = tokio::time::sleep(self.config.error_backoff) => {},
                }
            }
        }
    }

    /// Pull one batch of leads per campaign and launch their calls.
    /// Returns the number of calls launched.
    pub async fn run_batch(self: Arc<Self>) -> Result<usize, CampaignError> {
        self.flush_pending_writes().await;

        let campaign_ids: Vec<String> =
            self.campaigns.iter().map(|entry| entry.key().clone()).collect();
        let mut launched = 0;

        for campaign_id in campaign_ids {
            let locale = match self.campaigns.get(&campaign_id) {
                Some(state) => state.lock().campaign.locale.clone(),
                None => continue,
            };
            let exclude: Vec<String> = self
                .in_flight
                .iter()
                .map(|entry| entry.key().clone())
                .collect();
            let leads = self
                .store
                .get_leads_for_calling(self.config.lead_batch_size, &locale, &exclude)
                .await?;
            tracing::debug!(campaign_id = %campaign_id, leads = leads.len(), "batch pulled");

            for lead in leads {
                let assignment = self.select_variant(&campaign_id)?;
                if !self.in_flight.insert(lead.id.clone()) {
                    continue;
                }
                launched += 1;
                let dispatcher = self.clone();
                tokio::spawn(async move {
                    dispatcher.call_lead(lead, assignment).await;
                });
            }
        }
        Ok(launched)
    }

    async fn call_lead(&self, lead: Lead, assignment: VariantAssignment) {
        let lead_id = lead.id.clone();
        let campaign_id = assignment.campaign_id.clone();
        let variant_id = assignment.variant_id.clone();

        match self.launcher.launch(lead, assignment).await {
            Ok(outcome) => {
                if let Err(e) = self.record_outcome(&campaign_id, &variant_id, outcome) {
                    tracing::warn!(error = %e, "failed to record call outcome");
                }
                if let Err(e) = self
                    .store
                    .record_call_outcome(&lead_id, outcome.completed, outcome.converted)
                    .await
                {
                    tracing::warn!(lead_id = %lead_id, error = %e, "store write failed, queued for retry");
                    self.pending_writes.lock().push(PendingWrite {
                        lead_id: lead_id.clone(),
                        completed: outcome.completed,
                        converted: outcome.converted,
                    });
                }
            },
            Err(e) => {
                tracing::warn!(lead_id = %lead_id, error = %e, "call launch failed");
            },
        }
        self.in_flight.remove(&lead_id);
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    async fn flush_pending_writes(&self) {
        let pending: Vec<PendingWrite> = std::mem::take(&mut *self.pending_writes.lock());
        for write in pending {
            if let Err(e) = self
                .store
                .record_call_outcome(&write.lead_id, write.completed, write.converted)
                .await
            {
                tracing::warn!(lead_id = %write.lead_id, error = %e, "retried store write failed, re-queued");
                self.pending_writes.lock().push(write);
            }
        }
    }
}
