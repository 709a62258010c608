//! Lead storage
//!
//! The dispatcher only needs two operations from the document store, so it
//! talks to this trait; the in-memory implementation backs tests and local
//! runs, and a production store client is a drop-in.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::CampaignError;

/// A callable lead
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub phone: String,
    #[serde(default)]
    pub name: String,
    pub locale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_called_at: Option<DateTime<Utc>>,
    /// Leads that asked not to be called again
    #[serde(default)]
    pub do_not_call: bool,
}

impl Lead {
    pub fn new(id: impl Into<String>, phone: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            phone: phone.into(),
            name: String::new(),
            locale: locale.into(),
            last_called_at: None,
            do_not_call: false,
        }
    }
}

#[async_trait]
pub trait LeadStore: Send + Sync + 'static {
    /// Fetch up to `count` leads eligible for calling in `locale`,
    /// excluding ids already in flight.
    async fn get_leads_for_calling(
        &self,
        count: usize,
        locale: &str,
        exclude: &[String],
    ) -> Result<Vec<Lead>, CampaignError>;

    /// Persist the outcome of a finished call
    async fn record_call_outcome(
        &self,
        lead_id: &str,
        completed: bool,
        converted: bool,
    ) -> Result<(), CampaignError>;
}

/// In-memory lead store for tests and local runs
#[derive(Default)]
pub struct InMemoryLeadStore {
    leads: DashMap<String, Lead>,
    /// Minimum gap before a lead may be re-called
    recall_cooldown: Option<Duration>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cooldown(recall_cooldown: Duration) -> Self {
        Self {
            leads: DashMap::new(),
            recall_cooldown: Some(recall_cooldown),
        }
    }

    pub fn insert(&self, lead: Lead) {
        self.leads.insert(lead.id.clone(), lead);
    }

    pub fn get(&self, lead_id: &str) -> Option<Lead> {
        self.leads.get(lead_id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn get_leads_for_calling(
        &self,
        count: usize,
        locale: &str,
        exclude: &[String],
    ) -> Result<Vec<Lead>, CampaignError> {
        let now = Utc::now();
        let mut eligible: Vec<Lead> = self
            .leads
            .iter()
            .filter(|entry| {
                let lead = entry.value();
                if lead.do_not_call || lead.locale != locale {
                    return false;
                }
                if exclude.contains(&lead.id) {
                    return false;
                }
                match (self.recall_cooldown, lead.last_called_at) {
                    (Some(cooldown), Some(last)) => now - last >= cooldown,
                    _ => true,
                }
            })
            .map(|entry| entry.value().clone())
            .collect();

        // Never-called leads first, then longest-waiting
        eligible.sort_by_key(|lead| lead.last_called_at);
        eligible.truncate(count);
        Ok(eligible)
    }

    async fn record_call_outcome(
        &self,
        lead_id: &str,
        completed: bool,
        converted: bool,
    ) -> Result<(), CampaignError> {
        let mut entry = self
            .leads
            .get_mut(lead_id)
            .ok_or_else(|| CampaignError::Store(format!("unknown lead: {}", lead_id)))?;
        entry.last_called_at = Some(Utc::now());
        if converted {
            // Converted leads leave the calling pool
            entry.do_not_call = true;
        }
        tracing::debug!(lead_id, completed, converted, "call outcome recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_eligibility_filters() {
        let store = InMemoryLeadStore::new();
        store.insert(Lead::new("a", "+15550001", "en"));
        store.insert(Lead::new("b", "+15550002", "es"));
        let mut opted_out = Lead::new("c", "+15550003", "en");
        opted_out.do_not_call = true;
        store.insert(opted_out);

        let leads = store.get_leads_for_calling(10, "en", &[]).await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].id, "a");

        let leads = store
            .get_leads_for_calling(10, "en", &["a".to_string()])
            .await
            .unwrap();
        assert!(leads.is_empty());
    }

    #[tokio::test]
    async fn test_conversion_removes_lead_from_pool() {
        let store = InMemoryLeadStore::new();
        store.insert(Lead::new("a", "+15550001", "en"));

        store.record_call_outcome("a", true, true).await.unwrap();
        let leads = store.get_leads_for_calling(10, "en", &[]).await.unwrap();
        assert!(leads.is_empty());

        assert!(store.record_call_outcome("ghost", true, false).await.is_err());
    }

    #[tokio::test]
    async fn test_never_called_leads_come_first() {
        let store = InMemoryLeadStore::new();
        let mut called = Lead::new("old", "+15550001", "en");
        called.last_called_at = Some(Utc::now());
        store.insert(called);
        store.insert(Lead::new("fresh", "+15550002", "en"));

        let leads = store.get_leads_for_calling(1, "en", &[]).await.unwrap();
        assert_eq!(leads[0].id, "fresh");
    }
}
