//! Azure DevOps REST request and response types.

use std::collections::BTreeMap;

use devops_relay_core::{ChannelId, EventType, FilterBucket};
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{
    CONSUMER_ACTION_ID, CONSUMER_ID, FILTER_RELEASE_DEFINITION_ID, FILTER_RELEASE_ENVIRONMENT_ID,
    INPUT_VALUES_QUERY_SCOPE, PATH_NOTIFICATION, QUERY_PARAM_CHANNEL_ID,
    QUERY_PARAM_WEBHOOK_SECRET,
};
use crate::store::SubscriptionFilters;

// =============================================================================
// Service hook subscriptions
// =============================================================================

/// Everything needed to register one service hook.
#[derive(Debug, Clone)]
pub struct SubscriptionRequest {
    pub organization: String,
    pub project_id: String,
    pub event_type: EventType,
    pub filters: SubscriptionFilters,
    pub channel_id: ChannelId,
    /// Relay URL Azure DevOps calls back into
    pub public_url: String,
    /// Sealed webhook secret for the callback URL
    pub sealed_secret: String,
}

/// Subscription as returned by Azure DevOps. Only the id is read.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteSubscription {
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubscriptionBody {
    pub publisher_id: &'static str,
    pub event_type: &'static str,
    pub consumer_id: &'static str,
    pub consumer_action_id: &'static str,
    pub publisher_inputs: BTreeMap<&'static str, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer_inputs: Option<ConsumerInputs>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ConsumerInputs {
    pub url: String,
}

/// `{public_url}/notification?channelID=..&webhookSecret=..`
///
/// # Errors
///
/// Returns an error if `public_url` is not an absolute URL.
pub fn notification_callback_url(
    public_url: &str,
    channel_id: &ChannelId,
    sealed_secret: &str,
) -> Result<String, url::ParseError> {
    let mut url = url::Url::parse(&format!(
        "{}{PATH_NOTIFICATION}",
        public_url.trim_end_matches('/')
    ))?;
    url.query_pairs_mut()
        .append_pair(QUERY_PARAM_CHANNEL_ID, channel_id.as_str())
        .append_pair(QUERY_PARAM_WEBHOOK_SECRET, sealed_secret);
    Ok(url.into())
}

/// Publisher inputs for a subscription, omitting empty filters.
pub(crate) fn publisher_inputs(
    project_id: &str,
    filters: &SubscriptionFilters,
) -> BTreeMap<&'static str, String> {
    let pairs: &[(&'static str, &str)] = &[
        ("projectId", project_id),
        ("areaPath", &filters.area_path),
        ("repository", &filters.repository),
        ("branch", &filters.target_branch),
        ("pushedBy", &filters.pushed_by),
        ("mergeResult", &filters.merge_result),
        ("pullrequestCreatedBy", &filters.pull_request_created_by),
        (
            "pullrequestReviewersContains",
            &filters.pull_request_reviewers_contains,
        ),
        ("notificationType", &filters.notification_type),
        ("buildStatus", &filters.build_status),
        ("definitionName", &filters.build_pipeline),
        ("releaseEnvironmentId", &filters.stage_name),
        ("releaseDefinitionId", &filters.release_pipeline),
        ("releaseEnvironmentStatus", &filters.release_status),
        ("releaseApprovalType", &filters.approval_type),
        ("releaseApprovalStatus", &filters.approval_status),
        ("pipelineId", &filters.run_pipeline),
        ("stageName", &filters.run_stage),
        ("environmentName", &filters.run_environment),
        ("stageNameId", &filters.run_stage_id),
        ("stageStateId", &filters.run_stage_state_id),
        ("stageResultId", &filters.run_stage_result_id),
        ("runStateId", &filters.run_state_id),
        ("runResultId", &filters.run_result_id),
    ];

    pairs
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|&(key, value)| (key, value.to_string()))
        .collect()
}

impl SubscriptionBody {
    pub(crate) fn for_request(request: &SubscriptionRequest) -> Result<Self, url::ParseError> {
        let url = notification_callback_url(
            &request.public_url,
            &request.channel_id,
            &request.sealed_secret,
        )?;
        Ok(Self {
            publisher_id: request.event_type.publisher().as_str(),
            event_type: request.event_type.as_str(),
            consumer_id: CONSUMER_ID,
            consumer_action_id: CONSUMER_ACTION_ID,
            publisher_inputs: publisher_inputs(&request.project_id, &request.filters),
            consumer_inputs: Some(ConsumerInputs { url }),
        })
    }
}

// =============================================================================
// Filter possible values
// =============================================================================

/// Ask Azure DevOps which values are legal for some subscription filters.
#[derive(Debug, Clone)]
pub struct FilterValuesRequest {
    pub organization: String,
    pub project_id: String,
    pub event_type: EventType,
    /// Filter input ids to ask about
    pub filters: Vec<String>,
    pub repository_id: String,
    pub release_pipeline_id: String,
    pub run_pipeline: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PossibleValue {
    #[serde(default)]
    pub display_value: String,
    pub value: String,
}

/// Legal values keyed by filter input id.
pub type FilterValues = BTreeMap<String, Vec<PossibleValue>>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InputValuesQuery {
    pub subscription: SubscriptionBody,
    pub input_values: Vec<InputValueId>,
    pub scope: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InputValueId {
    pub input_id: String,
}

impl InputValuesQuery {
    pub(crate) fn new(request: &FilterValuesRequest) -> Self {
        let event_type = request.event_type;
        let bucket = event_type.filter_bucket();
        let mut publisher_inputs = BTreeMap::from([("projectId", request.project_id.clone())]);
        match bucket {
            FilterBucket::Repo => {
                publisher_inputs.insert("repository", request.repository_id.clone());
            }
            FilterBucket::Release => {
                publisher_inputs.insert("releaseDefinitionId", request.release_pipeline_id.clone());
            }
            FilterBucket::Run => {
                publisher_inputs.insert("pipelineId", request.run_pipeline.clone());
            }
            FilterBucket::Generic => {}
        }

        let input_values = request
            .filters
            .iter()
            .filter(|filter| {
                bucket != FilterBucket::Release
                    || *filter == FILTER_RELEASE_DEFINITION_ID
                    || *filter == FILTER_RELEASE_ENVIRONMENT_ID
            })
            .map(|filter| InputValueId {
                input_id: filter.clone(),
            })
            .collect();

        Self {
            subscription: SubscriptionBody {
                publisher_id: event_type.publisher().as_str(),
                event_type: event_type.as_str(),
                consumer_id: CONSUMER_ID,
                consumer_action_id: CONSUMER_ACTION_ID,
                publisher_inputs,
                consumer_inputs: None,
            },
            input_values,
            scope: INPUT_VALUES_QUERY_SCOPE,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct InputValuesQueryResponse {
    pub input_values: Vec<InputValues>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct InputValues {
    pub input_id: String,
    pub possible_values: Vec<PossibleValue>,
}

impl From<InputValuesQueryResponse> for FilterValues {
    fn from(response: InputValuesQueryResponse) -> Self {
        response
            .input_values
            .into_iter()
            .map(|input| (input.input_id, input.possible_values))
            .collect()
    }
}

// =============================================================================
// Projects
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteProject {
    pub id: String,
    pub name: String,
}

// =============================================================================
// Approvals
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityRef {
    pub display_name: String,
}

/// Classic release deployment approval.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseApproval {
    pub id: i64,
    pub status: String,
    #[serde(default)]
    pub approver: IdentityRef,
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReleaseApprovalUpdate<'a> {
    pub status: &'a str,
    pub comments: &'a str,
}

/// YAML pipeline run stage approval.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunApproval {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub min_required_approvers: u32,
    #[serde(default)]
    pub steps: Vec<RunApprovalStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunApprovalStep {
    #[serde(default)]
    pub assigned_approver: IdentityRef,
    #[serde(default)]
    pub actual_approver: Option<IdentityRef>,
    pub status: String,
    #[serde(default)]
    pub comment: String,
}

impl RunApprovalStep {
    /// Who acted on the step, falling back to who it was assigned to.
    #[must_use]
    pub fn approver_name(&self) -> &str {
        self.actual_approver
            .as_ref()
            .filter(|identity| !identity.display_name.is_empty())
            .map_or(&self.assigned_approver.display_name, |identity| {
                &identity.display_name
            })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RunApprovalUpdate<'a> {
    pub approval_id: &'a str,
    pub status: &'a str,
    pub comment: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunApprovalsResponse {
    #[serde(default)]
    pub value: Vec<RunApproval>,
}

// =============================================================================
// Work items, pull requests, builds, releases
// =============================================================================

/// A work item to create in a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkItemRequest {
    pub organization: String,
    pub project: String,
    /// Work item type, e.g. `Task` or `Bug`.
    pub work_item_type: String,
    pub title: String,
    pub description: String,
    pub area_path: String,
}

impl WorkItemRequest {
    /// JSON Patch document setting the non-empty fields.
    pub(crate) fn patch(&self) -> Vec<WorkItemPatch<'_>> {
        [
            ("/fields/System.Title", self.title.as_str()),
            ("/fields/System.Description", self.description.as_str()),
            ("/fields/System.AreaPath", self.area_path.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(path, value)| WorkItemPatch {
            op: "add",
            path,
            from: "",
            value,
        })
        .collect()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct WorkItemPatch<'a> {
    pub op: &'static str,
    pub path: &'static str,
    pub from: &'static str,
    pub value: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WebLinks {
    pub html: Href,
    pub web: Href,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Href {
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkItem {
    pub id: i64,
    #[serde(default)]
    pub fields: WorkItemFields,
    #[serde(default, rename = "_links")]
    pub links: WebLinks,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkItemFields {
    #[serde(rename = "System.Title")]
    pub title: String,
    #[serde(rename = "System.WorkItemType")]
    pub work_item_type: String,
    #[serde(rename = "System.State")]
    pub state: String,
    #[serde(rename = "System.AreaPath")]
    pub area_path: String,
    #[serde(rename = "System.AssignedTo")]
    pub assigned_to: Option<IdentityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub pull_request_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source_ref_name: String,
    #[serde(default)]
    pub target_ref_name: String,
    #[serde(default)]
    pub merge_status: String,
    #[serde(default)]
    pub repository: NamedRef,
    #[serde(default)]
    pub reviewers: Vec<IdentityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: i64,
    #[serde(default)]
    pub build_number: String,
    #[serde(default)]
    pub source_branch: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub repository: NamedRef,
    #[serde(default)]
    pub requested_by: IdentityRef,
    #[serde(default)]
    pub definition: NamedRef,
    #[serde(default, rename = "_links")]
    pub links: WebLinks,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub environments: Vec<NamedRef>,
    #[serde(default)]
    pub release_definition: NamedRef,
    #[serde(default, rename = "_links")]
    pub links: WebLinks,
}

// =============================================================================
// OAuth
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(deserialize_with = "number_or_string")]
    pub expires_in: i64,
}

/// Azure DevOps sends `expires_in` as a JSON string.
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Error body returned by the REST API.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ApiErrorBody {
    pub message: String,
}
