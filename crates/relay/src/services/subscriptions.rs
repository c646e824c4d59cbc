//! Subscribe, unsubscribe and list.
//!
//! Subscribe flow:
//! 1. Validate the payload and require the project to be linked
//! 2. Reject duplicates before calling Azure DevOps
//! 3. Register the service hook with the sealed webhook secret in its URL
//! 4. Store the secret and channel mapping, then the record

use std::collections::HashSet;

use chrono::Utc;
use devops_relay_core::{ChannelId, EventType, ServiceType, TeamId, UserId};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::constants::{
    CHANNEL_ID_REQUIRED, DEFAULT_PER_PAGE, ERROR_ADMIN_ACCESS, ERROR_ADMIN_ACCESS_CREATE,
    EVENT_TYPE_REQUIRED, FILTER_ALL_CHANNELS, FILTER_CREATED_BY_ANYONE, FILTER_CREATED_BY_ME,
    FILTERS_REQUIRED, MM_USER_ID_REQUIRED, ORGANIZATION_REQUIRED, PROJECT_ID_REQUIRED,
    PROJECT_NOT_LINKED, PROJECT_REQUIRED, SERVICE_TYPE_REQUIRED, SUBSCRIPTION_ALREADY_PRESENT,
    SUBSCRIPTION_NOT_FOUND, TEAM_ID_REQUIRED,
};
use crate::devops::{DevOpsError, FilterValues, FilterValuesRequest, SubscriptionRequest};
use crate::error::AppError;
use crate::state::AppState;
use crate::store::{
    CreatedByFilter, FilterDisplayNames, SubscriptionCandidate, SubscriptionFilters,
    SubscriptionRecord, VisibilityQuery, filter_for_visibility,
};

/// Body of `POST /subscriptions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionPayload {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub service_type: String,
    #[serde(default, rename = "channelID")]
    pub channel_id: String,
    #[serde(flatten)]
    pub filters: SubscriptionFilters,
    #[serde(flatten)]
    pub filter_names: FilterDisplayNames,
}

/// Body of `DELETE /subscriptions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSubscriptionPayload {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub service_type: String,
    #[serde(default, rename = "channelID")]
    pub channel_id: String,
    #[serde(default, rename = "mmUserID")]
    pub mm_user_id: String,
    #[serde(flatten)]
    pub filters: SubscriptionFilters,
}

/// Body of `POST /subscriptions/filters`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterValuesPayload {
    pub organization: String,
    pub project_id: String,
    pub event_type: String,
    /// Absent is an error; empty asks for nothing
    pub filters: Option<Vec<String>>,
    pub repository_id: String,
    pub release_pipeline_id: String,
    pub run_pipeline: String,
}

/// Query of `GET /subscriptions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub project: Option<String>,
    pub channel_id: Option<String>,
    pub created_by: Option<String>,
    pub service_type: Option<String>,
    pub team_id: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

fn require(value: &str, message: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        Err(AppError::Validation(message.to_string()))
    } else {
        Ok(())
    }
}

fn parse_event_type(value: &str) -> Result<EventType, AppError> {
    require(value, EVENT_TYPE_REQUIRED)?;
    value.parse().map_err(AppError::Validation)
}

fn parse_service_type(value: &str) -> Result<ServiceType, AppError> {
    require(value, SERVICE_TYPE_REQUIRED)?;
    value.parse().map_err(AppError::Validation)
}

/// Map an Azure DevOps 403 to the admin access message.
fn admin_access(error: DevOpsError, message: &str) -> AppError {
    if error.status() == Some(403) {
        AppError::Permission(message.to_string())
    } else {
        AppError::DevOps(error)
    }
}

struct ValidSubscribe {
    event_type: EventType,
    service_type: ServiceType,
    channel_id: ChannelId,
}

impl CreateSubscriptionPayload {
    fn validate(&self) -> Result<ValidSubscribe, AppError> {
        require(&self.organization, ORGANIZATION_REQUIRED)?;
        require(&self.project, PROJECT_REQUIRED)?;
        let event_type = parse_event_type(&self.event_type)?;
        let service_type = parse_service_type(&self.service_type)?;
        require(&self.channel_id, CHANNEL_ID_REQUIRED)?;

        if event_type.service_type() != service_type {
            return Err(AppError::Validation(format!(
                "event type {event_type} is not a {service_type} event"
            )));
        }

        Ok(ValidSubscribe {
            event_type,
            service_type,
            channel_id: ChannelId::new(self.channel_id.trim()),
        })
    }
}

/// Register a subscription for `user_id`.
///
/// # Errors
///
/// Returns a validation error for bad input, a bad request for an unlinked
/// project or a duplicate, and server errors for remote or store failures.
#[instrument(skip(state, payload), fields(user_id = %user_id, event_type = %payload.event_type))]
pub async fn subscribe(
    state: &AppState,
    user_id: &UserId,
    payload: CreateSubscriptionPayload,
) -> Result<SubscriptionRecord, AppError> {
    let valid = payload.validate()?;

    let project = state
        .projects()
        .find(user_id, &payload.organization, &payload.project)
        .await?
        .ok_or_else(|| AppError::BadRequest(PROJECT_NOT_LINKED.to_string()))?;

    let candidate = SubscriptionCandidate {
        owner_user_id: user_id.clone(),
        organization: project.organization_name.clone(),
        project_name: project.project_name.clone(),
        event_type: valid.event_type,
        channel_id: valid.channel_id.clone(),
        filters: payload.filters.clone(),
    };
    if state
        .subscriptions()
        .find_duplicate(&candidate)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest(SUBSCRIPTION_ALREADY_PRESENT.to_string()));
    }

    let channel = state.chat().get_channel(&valid.channel_id).await?;
    let creator = state.chat().get_user(user_id).await?;

    let config = state.config();
    let sealed_secret = state
        .cipher()
        .seal(config.webhook_secret.expose_secret())?;

    let request = SubscriptionRequest {
        organization: project.organization_name.clone(),
        project_id: project.project_id.clone(),
        event_type: valid.event_type,
        filters: payload.filters.clone(),
        channel_id: valid.channel_id.clone(),
        public_url: config.public_url().to_string(),
        sealed_secret,
    };
    let remote = state
        .devops()
        .create_subscription(user_id, &request)
        .await
        .map_err(|e| admin_access(e, ERROR_ADMIN_ACCESS_CREATE))?;

    state
        .secrets()
        .put(&remote.id, &valid.channel_id, &request.sealed_secret)
        .await?;

    let record = SubscriptionRecord {
        subscription_id: remote.id,
        owner_user_id: user_id.clone(),
        organization: project.organization_name,
        project_name: project.project_name,
        project_id: project.project_id,
        event_type: valid.event_type,
        service_type: valid.service_type,
        channel_id: valid.channel_id,
        channel_name: channel.display_name,
        channel_type: channel.channel_type,
        created_by: creator.display_name(),
        created_at: Utc::now(),
        filters: payload.filters,
        filter_names: payload.filter_names,
    };
    state.subscriptions().create(record.clone()).await?;

    info!(subscription_id = %record.subscription_id, "Subscription created");
    Ok(record)
}

/// Remove one subscription remotely and locally, with its secret.
///
/// # Errors
///
/// Returns `AppError::Permission` when Azure DevOps answers 403.
pub async fn delete_subscription(
    state: &AppState,
    user_id: &UserId,
    record: &SubscriptionRecord,
) -> Result<(), AppError> {
    state
        .devops()
        .delete_subscription(user_id, &record.organization, &record.subscription_id)
        .await
        .map_err(|e| admin_access(e, ERROR_ADMIN_ACCESS))?;

    state
        .subscriptions()
        .delete(&record.subscription_id)
        .await?;
    state.secrets().delete(&record.subscription_id).await?;

    info!(subscription_id = %record.subscription_id, "Subscription deleted");
    Ok(())
}

/// Delete the subscription identified by `payload`.
///
/// # Errors
///
/// Returns a validation error for bad input and `AppError::NotFound` when no
/// subscription matches.
#[instrument(skip(state, payload), fields(user_id = %user_id))]
pub async fn unsubscribe(
    state: &AppState,
    user_id: &UserId,
    payload: DeleteSubscriptionPayload,
) -> Result<(), AppError> {
    require(&payload.organization, ORGANIZATION_REQUIRED)?;
    require(&payload.project, PROJECT_REQUIRED)?;
    let event_type = parse_event_type(&payload.event_type)?;
    require(&payload.channel_id, CHANNEL_ID_REQUIRED)?;
    require(&payload.mm_user_id, MM_USER_ID_REQUIRED)?;

    let candidate = SubscriptionCandidate {
        owner_user_id: UserId::new(payload.mm_user_id.trim()),
        organization: payload.organization,
        project_name: payload.project,
        event_type,
        channel_id: ChannelId::new(payload.channel_id.trim()),
        filters: payload.filters,
    };
    let record = state
        .subscriptions()
        .find_duplicate(&candidate)
        .await?
        .ok_or_else(|| AppError::NotFound(SUBSCRIPTION_NOT_FOUND.to_string()))?;

    delete_subscription(state, user_id, &record).await
}

/// `(offset, limit)` for the `page` and `per_page` query values.
///
/// `page` is zero-based. An unparsable `per_page` falls back to the default
/// size and an unparsable `page` to the first page.
#[must_use]
pub fn pagination(page: Option<&str>, per_page: Option<&str>) -> (usize, usize) {
    let limit = per_page
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_PER_PAGE);
    let page = page
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    (page.saturating_mul(limit), limit)
}

fn created_by_filter(value: Option<&str>) -> Result<CreatedByFilter, AppError> {
    match value.map(str::trim) {
        None | Some("" | FILTER_CREATED_BY_ANYONE) => Ok(CreatedByFilter::Anyone),
        Some(FILTER_CREATED_BY_ME) => Ok(CreatedByFilter::Me),
        Some(other) => Err(AppError::Validation(format!(
            "invalid created_by filter: {other}"
        ))),
    }
}

/// The page of subscriptions `user_id` may see.
///
/// # Errors
///
/// Returns a validation error for a missing team or malformed filters.
#[instrument(skip(state, query), fields(user_id = %user_id))]
pub async fn list_subscriptions(
    state: &AppState,
    user_id: &UserId,
    query: &ListQuery,
) -> Result<Vec<SubscriptionRecord>, AppError> {
    let team_id = query
        .team_id
        .as_deref()
        .map(str::trim)
        .filter(|team| !team.is_empty())
        .map(TeamId::new)
        .ok_or_else(|| AppError::Validation(TEAM_ID_REQUIRED.to_string()))?;
    let created_by = created_by_filter(query.created_by.as_deref())?;
    let service_type = query
        .service_type
        .as_deref()
        .filter(|service| !service.trim().is_empty())
        .map(parse_service_type)
        .transpose()?;
    let channel_id = query
        .channel_id
        .as_deref()
        .filter(|channel| !channel.is_empty() && *channel != FILTER_ALL_CHANNELS)
        .map(ChannelId::new);

    let accessible: HashSet<ChannelId> = state
        .chat()
        .get_channels_for_user(&team_id, user_id)
        .await?
        .into_iter()
        .map(|channel| channel.id)
        .collect();

    let records = state.subscriptions().list(None).await?;
    let visible = filter_for_visibility(
        records,
        &accessible,
        &VisibilityQuery {
            channel_id: channel_id.as_ref(),
            created_by,
            requesting_user: user_id,
            service_type,
            project: query.project.as_deref().filter(|project| !project.is_empty()),
        },
    );

    let (offset, limit) = pagination(query.page.as_deref(), query.per_page.as_deref());
    Ok(visible.into_iter().skip(offset).take(limit).collect())
}

/// Markdown table of `records` of one service type.
#[must_use]
pub fn subscriptions_table(service_type: ServiceType, records: &[SubscriptionRecord]) -> String {
    let rows: Vec<&SubscriptionRecord> = records
        .iter()
        .filter(|record| record.service_type == service_type)
        .collect();
    if rows.is_empty() {
        return format!(
            "No {} subscription exists",
            service_type.title().to_lowercase()
        );
    }

    let mut table = format!(
        "###### {} subscription(s)\n\
         | Subscription ID | Organization | Project | Event Type | Created By | Channel |\n\
         | :-------------- | :----------- | :------ | :--------- | :--------- | :------ |\n",
        service_type.title()
    );
    for record in rows {
        table.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            record.subscription_id,
            record.organization,
            record.project_name,
            record.event_type.label(),
            record.created_by,
            record.channel_name,
        ));
    }
    table
}

/// Legal values for the requested filters.
///
/// # Errors
///
/// Returns a validation error for missing fields.
#[instrument(skip(state, payload), fields(user_id = %user_id))]
pub async fn filter_values(
    state: &AppState,
    user_id: &UserId,
    payload: FilterValuesPayload,
) -> Result<FilterValues, AppError> {
    require(&payload.organization, ORGANIZATION_REQUIRED)?;
    require(&payload.project_id, PROJECT_ID_REQUIRED)?;
    let event_type = parse_event_type(&payload.event_type)?;
    let filters = payload
        .filters
        .ok_or_else(|| AppError::Validation(FILTERS_REQUIRED.to_string()))?;

    let request = FilterValuesRequest {
        organization: payload.organization,
        project_id: payload.project_id,
        event_type,
        filters,
        repository_id: payload.repository_id,
        release_pipeline_id: payload.release_pipeline_id,
        run_pipeline: payload.run_pipeline,
    };
    Ok(state
        .devops()
        .subscription_filter_values(user_id, &request)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::subscriptions::tests::record;
    use crate::testing::{TestRelay, channel, user};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alice() -> UserId {
        UserId::new("u1")
    }

    async fn relay(server: &MockServer) -> TestRelay {
        let relay = TestRelay::new(&server.uri()).expect("relay");
        relay.connect(&alice()).await.expect("connect");
        relay
            .link_project(&alice(), "Org1", "Proj1", "project-guid")
            .await
            .expect("link");
        relay.chat.add_channel(channel("C1", "T1"));
        relay.chat.add_user(user("u1", "Alice", "Smith"));
        relay
    }

    fn work_item_payload() -> CreateSubscriptionPayload {
        CreateSubscriptionPayload {
            organization: "Org1".to_string(),
            project: "Proj1".to_string(),
            event_type: "workitem.created".to_string(),
            service_type: "boards".to_string(),
            channel_id: "C1".to_string(),
            ..CreateSubscriptionPayload::default()
        }
    }

    async fn mount_create(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/Org1/_apis/hooks/subscriptions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "sub-1"})),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_subscribe_stores_record_and_secret() {
        let server = MockServer::start().await;
        mount_create(&server, 1).await;
        let relay = relay(&server).await;

        let record = subscribe(&relay.state, &alice(), work_item_payload())
            .await
            .expect("subscribe");
        assert_eq!(record.subscription_id, "sub-1");
        assert_eq!(record.created_by, "Alice Smith");
        assert_eq!(record.channel_name, "C1 channel");
        assert_eq!(record.project_id, "project-guid");
        assert_eq!(record.service_type, ServiceType::Boards);

        let stored = relay.state.subscriptions().list(None).await.expect("list");
        assert_eq!(stored.len(), 1);

        let entry = relay
            .state
            .secrets()
            .get("sub-1")
            .await
            .expect("get")
            .expect("secret stored");
        assert_eq!(entry.channel_id, ChannelId::new("C1"));
        let opened = relay.state.cipher().open(&entry.secret).expect("open");
        assert_eq!(opened, crate::testing::TEST_WEBHOOK_SECRET);

        let requests = server.received_requests().await.expect("requests");
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).expect("json");
        assert_eq!(body["publisherId"], "tfs");
        assert_eq!(body["publisherInputs"]["projectId"], "project-guid");
    }

    #[tokio::test]
    async fn test_duplicate_subscribe_skips_remote_call() {
        let server = MockServer::start().await;
        mount_create(&server, 1).await;
        let relay = relay(&server).await;

        subscribe(&relay.state, &alice(), work_item_payload())
            .await
            .expect("first");
        let second = subscribe(&relay.state, &alice(), work_item_payload()).await;
        assert!(
            matches!(second, Err(AppError::BadRequest(ref message)) if message == SUBSCRIPTION_ALREADY_PRESENT)
        );
        assert_eq!(relay.state.subscriptions().list(None).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_requires_linked_project() {
        let server = MockServer::start().await;
        mount_create(&server, 0).await;
        let relay = relay(&server).await;

        let payload = CreateSubscriptionPayload {
            project: "Other".to_string(),
            ..work_item_payload()
        };
        let result = subscribe(&relay.state, &alice(), payload).await;
        assert!(
            matches!(result, Err(AppError::BadRequest(ref message)) if message == PROJECT_NOT_LINKED)
        );
    }

    #[tokio::test]
    async fn test_subscribe_forbidden_is_admin_access_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Org1/_apis/hooks/subscriptions"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "message": "access denied"
            })))
            .mount(&server)
            .await;
        let relay = relay(&server).await;

        let result = subscribe(&relay.state, &alice(), work_item_payload()).await;
        assert!(
            matches!(result, Err(AppError::Permission(ref message)) if message == ERROR_ADMIN_ACCESS_CREATE)
        );
        assert!(relay.state.subscriptions().list(None).await.expect("list").is_empty());
        assert!(relay.state.secrets().get("sub-1").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_deletes_remote_then_local() {
        let server = MockServer::start().await;
        mount_create(&server, 1).await;
        Mock::given(method("DELETE"))
            .and(path("/Org1/_apis/hooks/subscriptions/sub-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let relay = relay(&server).await;
        subscribe(&relay.state, &alice(), work_item_payload())
            .await
            .expect("subscribe");

        let payload = DeleteSubscriptionPayload {
            organization: "Org1".to_string(),
            project: "Proj1".to_string(),
            event_type: "workitem.created".to_string(),
            channel_id: "C1".to_string(),
            mm_user_id: "u1".to_string(),
            ..DeleteSubscriptionPayload::default()
        };
        unsubscribe(&relay.state, &alice(), payload.clone())
            .await
            .expect("unsubscribe");
        assert!(relay.state.subscriptions().list(None).await.expect("list").is_empty());
        assert!(relay.state.secrets().get("sub-1").await.expect("get").is_none());

        let again = unsubscribe(&relay.state, &alice(), payload).await;
        assert!(
            matches!(again, Err(AppError::NotFound(ref message)) if message == SUBSCRIPTION_NOT_FOUND)
        );
    }

    fn delete_payload(organization: &str, project: &str) -> DeleteSubscriptionPayload {
        DeleteSubscriptionPayload {
            organization: organization.to_string(),
            project: project.to_string(),
            event_type: "workitem.created".to_string(),
            channel_id: "C1".to_string(),
            mm_user_id: "u1".to_string(),
            ..DeleteSubscriptionPayload::default()
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_accepts_names_subscribe_accepted() {
        let server = MockServer::start().await;
        mount_create(&server, 1).await;
        Mock::given(method("DELETE"))
            .and(path("/Org1/_apis/hooks/subscriptions/sub-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let relay = relay(&server).await;

        let payload = CreateSubscriptionPayload {
            organization: "org1".to_string(),
            project: "proj1".to_string(),
            ..work_item_payload()
        };
        let record = subscribe(&relay.state, &alice(), payload)
            .await
            .expect("subscribe");
        assert_eq!(record.organization, "Org1");
        assert_eq!(record.project_name, "Proj1");

        unsubscribe(&relay.state, &alice(), delete_payload("org1", "proj1"))
            .await
            .expect("unsubscribe");
        assert!(relay.state.subscriptions().list(None).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_forbidden_keeps_record_and_secret() {
        let server = MockServer::start().await;
        mount_create(&server, 1).await;
        Mock::given(method("DELETE"))
            .and(path("/Org1/_apis/hooks/subscriptions/sub-1"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "message": "access denied"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let relay = relay(&server).await;
        subscribe(&relay.state, &alice(), work_item_payload())
            .await
            .expect("subscribe");

        let result = unsubscribe(&relay.state, &alice(), delete_payload("Org1", "Proj1")).await;
        assert!(
            matches!(result, Err(AppError::Permission(ref message)) if message == ERROR_ADMIN_ACCESS)
        );
        assert_eq!(relay.state.subscriptions().list(None).await.expect("list").len(), 1);
        assert!(relay.state.secrets().get("sub-1").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn test_unsubscribe_validates_user() {
        let server = MockServer::start().await;
        let relay = relay(&server).await;
        let payload = DeleteSubscriptionPayload {
            organization: "Org1".to_string(),
            project: "Proj1".to_string(),
            event_type: "workitem.created".to_string(),
            channel_id: "C1".to_string(),
            ..DeleteSubscriptionPayload::default()
        };
        let result = unsubscribe(&relay.state, &alice(), payload).await;
        assert!(
            matches!(result, Err(AppError::Validation(ref message)) if message == MM_USER_ID_REQUIRED)
        );
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let server = MockServer::start().await;
        let relay = relay(&server).await;
        relay.chat.add_channel(channel("C2", "T1"));
        relay.chat.add_channel(channel("C3", "T2"));
        for (id, owner, channel) in [("s1", "u1", "C1"), ("s2", "u2", "C2"), ("s3", "u1", "C3")] {
            relay
                .state
                .subscriptions()
                .create(record(id, owner, channel))
                .await
                .expect("create");
        }

        let mut query = ListQuery {
            team_id: Some("T1".to_string()),
            ..ListQuery::default()
        };
        let ids = |records: Vec<SubscriptionRecord>| {
            records
                .into_iter()
                .map(|record| record.subscription_id)
                .collect::<Vec<_>>()
        };

        let all = list_subscriptions(&relay.state, &alice(), &query).await.expect("list");
        assert_eq!(ids(all), vec!["s1", "s2"]);

        query.created_by = Some("me".to_string());
        let mine = list_subscriptions(&relay.state, &alice(), &query).await.expect("list");
        assert_eq!(ids(mine), vec!["s1"]);

        query.created_by = None;
        query.page = Some("1".to_string());
        query.per_page = Some("1".to_string());
        let second_page = list_subscriptions(&relay.state, &alice(), &query).await.expect("list");
        assert_eq!(ids(second_page), vec!["s2"]);

        query.team_id = None;
        let missing_team = list_subscriptions(&relay.state, &alice(), &query).await;
        assert!(
            matches!(missing_team, Err(AppError::Validation(ref message)) if message == TEAM_ID_REQUIRED)
        );
    }

    #[tokio::test]
    async fn test_filter_values_requires_filters() {
        let server = MockServer::start().await;
        let relay = relay(&server).await;
        let payload = FilterValuesPayload {
            organization: "Org1".to_string(),
            project_id: "project-guid".to_string(),
            event_type: "git.push".to_string(),
            ..FilterValuesPayload::default()
        };
        let result = filter_values(&relay.state, &alice(), payload).await;
        assert!(
            matches!(result, Err(AppError::Validation(ref message)) if message == FILTERS_REQUIRED)
        );
    }

    #[test]
    fn test_pagination() {
        assert_eq!(pagination(Some("1"), Some("10")), (10, 10));
        assert_eq!(pagination(None, None), (0, DEFAULT_PER_PAGE));
        assert_eq!(pagination(Some(""), Some("")), (0, DEFAULT_PER_PAGE));
        assert_eq!(pagination(Some("one"), Some("10")), (0, 10));
        assert_eq!(pagination(Some("2"), Some("ten")), (100, DEFAULT_PER_PAGE));
    }

    #[test]
    fn test_create_payload_validation_order() {
        let mut payload = CreateSubscriptionPayload::default();
        let message = |payload: &CreateSubscriptionPayload| match payload.validate() {
            Err(AppError::Validation(message)) => message,
            _ => String::new(),
        };

        assert_eq!(message(&payload), ORGANIZATION_REQUIRED);
        payload.organization = "Org1".to_string();
        assert_eq!(message(&payload), PROJECT_REQUIRED);
        payload.project = "Proj1".to_string();
        assert_eq!(message(&payload), EVENT_TYPE_REQUIRED);
        payload.event_type = "workitem.created".to_string();
        assert_eq!(message(&payload), SERVICE_TYPE_REQUIRED);
        payload.service_type = "boards".to_string();
        assert_eq!(message(&payload), CHANNEL_ID_REQUIRED);
        payload.channel_id = "C1".to_string();
        assert!(payload.validate().is_ok());

        payload.service_type = "repos".to_string();
        assert!(matches!(payload.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_create_payload_reads_flat_filters() {
        let payload: CreateSubscriptionPayload = serde_json::from_value(serde_json::json!({
            "organization": "Org1",
            "project": "Proj1",
            "eventType": "git.push",
            "serviceType": "repos",
            "channelID": "C1",
            "repository": "repo-guid",
            "repositoryName": "relay",
            "targetBranch": "refs/heads/main"
        }))
        .expect("payload");
        assert_eq!(payload.filters.repository, "repo-guid");
        assert_eq!(payload.filters.target_branch, "refs/heads/main");
        assert_eq!(payload.filter_names.repository_name, "relay");
    }

    #[test]
    fn test_created_by_filter() {
        assert_eq!(created_by_filter(None).ok(), Some(CreatedByFilter::Anyone));
        assert_eq!(created_by_filter(Some("me")).ok(), Some(CreatedByFilter::Me));
        assert!(created_by_filter(Some("them")).is_err());
    }

    #[test]
    fn test_subscriptions_table() {
        let table = subscriptions_table(ServiceType::Boards, &[record("s1", "u1", "c1")]);
        assert!(table.starts_with(
            "###### Boards subscription(s)\n| Subscription ID | Organization | Project | Event Type | Created By | Channel |\n"
        ));
        assert!(table.contains("| s1 | Org1 | Proj1 | Work Item Created | alice | town-square |"));

        assert_eq!(
            subscriptions_table(ServiceType::Boards, &[]),
            "No boards subscription exists"
        );
        assert_eq!(
            subscriptions_table(ServiceType::Repos, &[record("s1", "u1", "c1")]),
            "No repos subscription exists"
        );
    }
}
