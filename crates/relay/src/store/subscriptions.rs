//! Local subscription registry.
//!
//! All records live in one JSON document under `subscription_list`. The
//! registry serializes its own read-modify-write cycles on that document; it
//! does not lock across the remote create call, so two concurrent identical
//! subscribes can still both reach Azure DevOps.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use devops_relay_core::{ChannelId, EventType, ServiceType, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{SUBSCRIPTION_LIST_KEY, StoreError, load_json, store_json};
use crate::kv::KvStore;

/// Filter values a subscription was created with.
///
/// Which fields are populated depends on the event type. Empty means
/// "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionFilters {
    pub repository: String,
    pub target_branch: String,
    pub pull_request_created_by: String,
    pub pull_request_reviewers_contains: String,
    pub pushed_by: String,
    pub merge_result: String,
    pub notification_type: String,
    pub area_path: String,
    pub build_pipeline: String,
    pub build_status: String,
    pub release_pipeline: String,
    pub stage_name: String,
    pub approval_type: String,
    pub approval_status: String,
    pub release_status: String,
    pub run_pipeline: String,
    pub run_stage: String,
    pub run_environment: String,
    pub run_stage_id: String,
    pub run_stage_state_id: String,
    pub run_stage_result_id: String,
    pub run_state_id: String,
    pub run_result_id: String,
}

/// Display names for filter values, shown in listings only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterDisplayNames {
    pub repository_name: String,
    pub pull_request_created_by_name: String,
    pub pull_request_reviewers_contains_name: String,
    pub pushed_by_name: String,
    pub merge_result_name: String,
    pub notification_type_name: String,
    pub build_status_name: String,
    pub release_pipeline_name: String,
    pub stage_name_value: String,
    pub approval_type_name: String,
    pub approval_status_name: String,
    pub release_status_name: String,
    pub run_pipeline_name: String,
    pub run_stage_state_id_name: String,
    pub run_state_id_name: String,
}

/// One registered service hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    #[serde(rename = "subscriptionID")]
    pub subscription_id: String,
    #[serde(rename = "mattermostUserID")]
    pub owner_user_id: UserId,
    pub organization: String,
    pub project_name: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
    pub event_type: EventType,
    pub service_type: ServiceType,
    #[serde(rename = "channelID")]
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub channel_type: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub filters: SubscriptionFilters,
    #[serde(default)]
    pub filter_names: FilterDisplayNames,
}

/// Identity of a subscription before it has a remote id.
///
/// Two subscriptions are duplicates when every field here matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionCandidate {
    pub owner_user_id: UserId,
    pub organization: String,
    pub project_name: String,
    pub event_type: EventType,
    pub channel_id: ChannelId,
    pub filters: SubscriptionFilters,
}

impl SubscriptionRecord {
    /// Whether this record has the candidate's identity.
    ///
    /// Organization and project names compare case-insensitively, as Azure
    /// DevOps resolves them.
    #[must_use]
    pub fn matches(&self, candidate: &SubscriptionCandidate) -> bool {
        self.owner_user_id == candidate.owner_user_id
            && self.organization.eq_ignore_ascii_case(&candidate.organization)
            && self.project_name.eq_ignore_ascii_case(&candidate.project_name)
            && self.event_type == candidate.event_type
            && self.channel_id == candidate.channel_id
            && self.filters == candidate.filters
    }
}

/// Registry of subscription records.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    kv: Arc<dyn KvStore>,
    write_lock: Arc<Mutex<()>>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_all(&self) -> Result<Vec<SubscriptionRecord>, StoreError> {
        Ok(load_json(self.kv.as_ref(), SUBSCRIPTION_LIST_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Records owned by `owner`, or every record when `owner` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails or the list is corrupt.
    pub async fn list(&self, owner: Option<&UserId>) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let mut records = self.load_all().await?;
        if let Some(owner) = owner {
            records.retain(|record| &record.owner_user_id == owner);
        }
        Ok(records)
    }

    /// The existing record with the candidate's identity, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails or the list is corrupt.
    pub async fn find_duplicate(
        &self,
        candidate: &SubscriptionCandidate,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        Ok(self
            .list(Some(&candidate.owner_user_id))
            .await?
            .into_iter()
            .find(|record| record.matches(candidate)))
    }

    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails or the list is corrupt.
    pub async fn find_by_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .find(|record| record.subscription_id == subscription_id))
    }

    /// Persist a record confirmed by Azure DevOps. Replaces a record with the
    /// same subscription id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails or the list is corrupt.
    pub async fn create(&self, record: SubscriptionRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load_all().await?;
        records.retain(|existing| existing.subscription_id != record.subscription_id);
        records.push(record);
        store_json(self.kv.as_ref(), SUBSCRIPTION_LIST_KEY, &records).await
    }

    /// Remove the record with `subscription_id`. Returns whether one was removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails or the list is corrupt.
    pub async fn delete(&self, subscription_id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load_all().await?;
        let before = records.len();
        records.retain(|record| record.subscription_id != subscription_id);
        if records.len() == before {
            return Ok(false);
        }
        store_json(self.kv.as_ref(), SUBSCRIPTION_LIST_KEY, &records).await?;
        Ok(true)
    }
}

/// Who a listing should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatedByFilter {
    Me,
    Anyone,
}

/// Criteria for [`filter_for_visibility`].
#[derive(Debug, Clone)]
pub struct VisibilityQuery<'a> {
    /// Restrict to one channel; `None` means every accessible channel
    pub channel_id: Option<&'a ChannelId>,
    pub created_by: CreatedByFilter,
    pub requesting_user: &'a UserId,
    pub service_type: Option<ServiceType>,
    /// Restrict to one project (case-insensitive)
    pub project: Option<&'a str>,
}

/// Records the requesting user may see: in a channel they can access, and
/// matching every restriction in `query`.
#[must_use]
pub fn filter_for_visibility(
    records: Vec<SubscriptionRecord>,
    accessible_channels: &HashSet<ChannelId>,
    query: &VisibilityQuery<'_>,
) -> Vec<SubscriptionRecord> {
    records
        .into_iter()
        .filter(|record| accessible_channels.contains(&record.channel_id))
        .filter(|record| query.channel_id.is_none_or(|id| &record.channel_id == id))
        .filter(|record| match query.created_by {
            CreatedByFilter::Me => &record.owner_user_id == query.requesting_user,
            CreatedByFilter::Anyone => true,
        })
        .filter(|record| {
            query
                .service_type
                .is_none_or(|service| record.service_type == service)
        })
        .filter(|record| {
            query
                .project
                .is_none_or(|project| record.project_name.eq_ignore_ascii_case(project))
        })
        .collect()
}
