//! Azure DevOps gateway.
//!
//! Every call is made on behalf of a chat user with their OAuth token. An
//! expired token is refreshed once before the call; when refresh fails the
//! user's credentials are removed and they are told to reconnect.

pub mod auth;
mod client;
mod error;
mod types;

use async_trait::async_trait;
use devops_relay_core::{ApprovalDecision, UserId};

use crate::store::UserToken;

pub use client::DevOpsClient;
pub use error::DevOpsError;
pub use types::{
    Build, FilterValues, FilterValuesRequest, Href, IdentityRef, NamedRef, PossibleValue,
    PullRequest, Release, ReleaseApproval, RemoteProject, RemoteSubscription, RunApproval,
    RunApprovalStep, SubscriptionRequest, WebLinks, WorkItem, WorkItemFields, WorkItemRequest,
    notification_callback_url,
};

/// Remote operations the relay performs against Azure DevOps.
#[async_trait]
pub trait DevOpsApi: Send + Sync {
    /// Register a service hook.
    async fn create_subscription(
        &self,
        user_id: &UserId,
        request: &SubscriptionRequest,
    ) -> Result<RemoteSubscription, DevOpsError>;

    /// Remove a service hook.
    async fn delete_subscription(
        &self,
        user_id: &UserId,
        organization: &str,
        subscription_id: &str,
    ) -> Result<(), DevOpsError>;

    /// Legal values for subscription filters.
    async fn subscription_filter_values(
        &self,
        user_id: &UserId,
        request: &FilterValuesRequest,
    ) -> Result<FilterValues, DevOpsError>;

    async fn get_project(
        &self,
        user_id: &UserId,
        organization: &str,
        project: &str,
    ) -> Result<RemoteProject, DevOpsError>;

    /// Approve or reject a release deployment approval.
    async fn update_release_approval(
        &self,
        user_id: &UserId,
        organization: &str,
        project: &str,
        approval_id: i64,
        decision: ApprovalDecision,
    ) -> Result<(), DevOpsError>;

    async fn get_release_approval(
        &self,
        user_id: &UserId,
        organization: &str,
        project: &str,
        approval_id: i64,
    ) -> Result<ReleaseApproval, DevOpsError>;

    /// Approve or reject a pipeline run stage approval.
    async fn update_run_approval(
        &self,
        user_id: &UserId,
        organization: &str,
        project_id: &str,
        approval_id: &str,
        decision: ApprovalDecision,
    ) -> Result<RunApproval, DevOpsError>;

    /// Run stage approval with its steps expanded.
    async fn get_run_approval(
        &self,
        user_id: &UserId,
        organization: &str,
        project_id: &str,
        approval_id: &str,
    ) -> Result<RunApproval, DevOpsError>;

    /// Create a work item from `request`.
    async fn create_work_item(
        &self,
        user_id: &UserId,
        request: &WorkItemRequest,
    ) -> Result<WorkItem, DevOpsError>;

    async fn get_work_item(
        &self,
        user_id: &UserId,
        organization: &str,
        work_item_id: i64,
    ) -> Result<WorkItem, DevOpsError>;

    async fn get_pull_request(
        &self,
        user_id: &UserId,
        organization: &str,
        project: &str,
        pull_request_id: i64,
    ) -> Result<PullRequest, DevOpsError>;

    async fn get_build(
        &self,
        user_id: &UserId,
        organization: &str,
        project: &str,
        build_id: i64,
    ) -> Result<Build, DevOpsError>;

    /// Classic release, from the release management host.
    async fn get_release(
        &self,
        user_id: &UserId,
        organization: &str,
        project: &str,
        release_id: i64,
    ) -> Result<Release, DevOpsError>;

    /// Exchange an OAuth authorization code for a token pair.
    async fn exchange_code(&self, code: &str) -> Result<UserToken, DevOpsError>;
}
