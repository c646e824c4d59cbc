//! Azure DevOps REST client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devops_relay_core::{ApprovalDecision, UserId};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{error, info, instrument, warn};
use url::Url;

use super::DevOpsApi;
use super::auth;
use super::error::DevOpsError;
use super::types::{
    ApiErrorBody, Build, FilterValues, FilterValuesRequest, InputValuesQuery,
    InputValuesQueryResponse, PullRequest, Release, ReleaseApproval, ReleaseApprovalUpdate,
    RemoteProject, RemoteSubscription, RunApproval, RunApprovalUpdate, RunApprovalsResponse,
    SubscriptionBody, SubscriptionRequest, WorkItem, WorkItemRequest,
};
use crate::chat::ChatHost;
use crate::config::SharedConfig;
use crate::constants::{
    API_VERSION, EVENT_DISCONNECT, GENERIC_ERROR_MESSAGE, PIPELINES_API_VERSION,
    SESSION_EXPIRED_MESSAGE, WORK_ITEMS_API_VERSION,
};
use crate::store::{CredentialStore, UserToken};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Azure DevOps client acting for whichever user a call names.
#[derive(Clone)]
pub struct DevOpsClient {
    inner: Arc<DevOpsClientInner>,
}

struct DevOpsClientInner {
    client: Client,
    config: SharedConfig,
    credentials: CredentialStore,
    chat: Arc<dyn ChatHost>,
}

impl std::fmt::Debug for DevOpsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevOpsClient").finish_non_exhaustive()
    }
}

impl DevOpsClient {
    /// # Errors
    ///
    /// Returns `DevOpsError::Request` if the HTTP client cannot be built.
    pub fn new(
        config: SharedConfig,
        credentials: CredentialStore,
        chat: Arc<dyn ChatHost>,
    ) -> Result<Self, DevOpsError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            inner: Arc::new(DevOpsClientInner {
                client,
                config,
                credentials,
                chat,
            }),
        })
    }

    /// A usable access token for `user_id`, refreshing it first if expired.
    async fn access_token(&self, user_id: &UserId) -> Result<SecretString, DevOpsError> {
        let token = self
            .inner
            .credentials
            .load(user_id)
            .await?
            .ok_or(DevOpsError::NotConnected)?;

        if !token.is_expired() {
            return Ok(token.access_token);
        }

        let config = self.inner.config.snapshot();
        match auth::refresh_access_token(&self.inner.client, &config.devops, &token.refresh_token)
            .await
        {
            Ok(refreshed) => {
                self.inner.credentials.save(user_id, &refreshed).await?;
                info!(user_id = %user_id, "Azure DevOps token refreshed");
                Ok(refreshed.access_token)
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Azure DevOps token refresh failed");
                self.expire_session(user_id).await;
                Err(DevOpsError::SessionExpired)
            }
        }
    }

    /// Forget the user's credentials and tell them to reconnect.
    async fn expire_session(&self, user_id: &UserId) {
        let message = match self.inner.credentials.delete(user_id).await {
            Ok(()) => SESSION_EXPIRED_MESSAGE,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to delete expired credentials");
                GENERIC_ERROR_MESSAGE
            }
        };

        self.inner
            .chat
            .publish_event(EVENT_DISCONNECT, user_id, serde_json::Value::Null);

        if let Err(e) = self.inner.chat.send_direct_message(user_id, message).await {
            error!(user_id = %user_id, error = %e, "Failed to DM session expiry");
        }
    }

    /// Send `request` with the user's bearer token and fail on non-success.
    async fn execute(
        &self,
        user_id: &UserId,
        request: RequestBuilder,
    ) -> Result<Response, DevOpsError> {
        let token = self.access_token(user_id).await?;
        let response = request.bearer_auth(token.expose_secret()).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_else(|e| {
            warn!(status = %status, error = %e, "Failed to read Azure DevOps error body");
            String::new()
        });
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|parsed| parsed.message)
            .unwrap_or(body);
        error!(
            status = %status,
            message = %message.chars().take(500).collect::<String>(),
            "Azure DevOps API error"
        );
        Err(DevOpsError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        user_id: &UserId,
        request: RequestBuilder,
    ) -> Result<T, DevOpsError> {
        Ok(self.execute(user_id, request).await?.json().await?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.inner.client.request(method, url)
    }

    fn base_url(&self, release: bool) -> String {
        let config = self.inner.config.snapshot();
        if release {
            config.devops.release_api_base_url.clone()
        } else {
            config.devops.api_base_url.clone()
        }
    }
}

/// `{base}/{segments..}?{query..}` with each segment percent-encoded.
fn api_url(base: &str, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, DevOpsError> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

#[async_trait]
impl DevOpsApi for DevOpsClient {
    #[instrument(skip(self, request), fields(organization = %request.organization, event_type = %request.event_type))]
    async fn create_subscription(
        &self,
        user_id: &UserId,
        request: &SubscriptionRequest,
    ) -> Result<RemoteSubscription, DevOpsError> {
        let url = api_url(
            &self.base_url(request.event_type.is_release()),
            &[request.organization.as_str(), "_apis", "hooks", "subscriptions"],
            &[("api-version", API_VERSION)],
        )?;
        let body = SubscriptionBody::for_request(request)?;
        let created: RemoteSubscription = self
            .execute_json(user_id, self.request(Method::POST, url).json(&body))
            .await?;
        info!(subscription_id = %created.id, "Service hook created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn delete_subscription(
        &self,
        user_id: &UserId,
        organization: &str,
        subscription_id: &str,
    ) -> Result<(), DevOpsError> {
        let url = api_url(
            &self.base_url(false),
            &[organization, "_apis", "hooks", "subscriptions", subscription_id],
            &[("api-version", API_VERSION)],
        )?;
        self.execute(user_id, self.request(Method::DELETE, url))
            .await?;
        info!("Service hook deleted");
        Ok(())
    }

    #[instrument(skip(self, request), fields(organization = %request.organization))]
    async fn subscription_filter_values(
        &self,
        user_id: &UserId,
        request: &FilterValuesRequest,
    ) -> Result<FilterValues, DevOpsError> {
        let url = api_url(
            &self.base_url(request.event_type.is_release()),
            &[request.organization.as_str(), "_apis", "hooks", "inputValuesQuery"],
            &[("api-version", API_VERSION)],
        )?;
        let query = InputValuesQuery::new(request);
        let response: InputValuesQueryResponse = self
            .execute_json(user_id, self.request(Method::POST, url).json(&query))
            .await?;
        Ok(response.into())
    }

    #[instrument(skip(self))]
    async fn get_project(
        &self,
        user_id: &UserId,
        organization: &str,
        project: &str,
    ) -> Result<RemoteProject, DevOpsError> {
        let url = api_url(
            &self.base_url(false),
            &[organization, "_apis", "projects", project],
            &[("api-version", API_VERSION)],
        )?;
        self.execute_json(user_id, self.request(Method::GET, url))
            .await
    }

    #[instrument(skip(self))]
    async fn update_release_approval(
        &self,
        user_id: &UserId,
        organization: &str,
        project: &str,
        approval_id: i64,
        decision: ApprovalDecision,
    ) -> Result<(), DevOpsError> {
        let id = approval_id.to_string();
        let url = api_url(
            &self.base_url(true),
            &[organization, project, "_apis", "release", "approvals", id.as_str()],
            &[("api-version", API_VERSION)],
        )?;
        let body = ReleaseApprovalUpdate {
            status: decision.as_str(),
            comments: "",
        };
        self.execute(user_id, self.request(Method::PATCH, url).json(&body))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_release_approval(
        &self,
        user_id: &UserId,
        organization: &str,
        project: &str,
        approval_id: i64,
    ) -> Result<ReleaseApproval, DevOpsError> {
        let id = approval_id.to_string();
        let url = api_url(
            &self.base_url(true),
            &[organization, project, "_apis", "release", "approvals", id.as_str()],
            &[("api-version", API_VERSION)],
        )?;
        self.execute_json(user_id, self.request(Method::GET, url))
            .await
    }

    #[instrument(skip(self))]
    async fn update_run_approval(
        &self,
        user_id: &UserId,
        organization: &str,
        project_id: &str,
        approval_id: &str,
        decision: ApprovalDecision,
    ) -> Result<RunApproval, DevOpsError> {
        let url = api_url(
            &self.base_url(false),
            &[organization, project_id, "_apis", "pipelines", "approvals"],
            &[("api-version", PIPELINES_API_VERSION)],
        )?;
        let body = [RunApprovalUpdate {
            approval_id,
            status: decision.as_str(),
            comment: "",
        }];
        let response: RunApprovalsResponse = self
            .execute_json(user_id, self.request(Method::PATCH, url).json(&body))
            .await?;
        response.value.into_iter().next().ok_or_else(|| {
            DevOpsError::UnexpectedResponse(format!("no approval in update response for {approval_id}"))
        })
    }

    #[instrument(skip(self))]
    async fn get_run_approval(
        &self,
        user_id: &UserId,
        organization: &str,
        project_id: &str,
        approval_id: &str,
    ) -> Result<RunApproval, DevOpsError> {
        let url = api_url(
            &self.base_url(false),
            &[organization, project_id, "_apis", "pipelines", "approvals", approval_id],
            &[("$expand", "steps"), ("api-version", PIPELINES_API_VERSION)],
        )?;
        self.execute_json(user_id, self.request(Method::GET, url))
            .await
    }

    #[instrument(skip(self, request), fields(organization = %request.organization, work_item_type = %request.work_item_type))]
    async fn create_work_item(
        &self,
        user_id: &UserId,
        request: &WorkItemRequest,
    ) -> Result<WorkItem, DevOpsError> {
        let work_item_type = format!("${}", request.work_item_type);
        let url = api_url(
            &self.base_url(false),
            &[
                request.organization.as_str(),
                request.project.as_str(),
                "_apis",
                "wit",
                "workitems",
                work_item_type.as_str(),
            ],
            &[("api-version", WORK_ITEMS_API_VERSION)],
        )?;
        // json() keeps a content type that is already set
        let builder = self
            .request(Method::POST, url)
            .header(CONTENT_TYPE, "application/json-patch+json")
            .json(&request.patch());
        self.execute_json(user_id, builder).await
    }

    #[instrument(skip(self))]
    async fn get_work_item(
        &self,
        user_id: &UserId,
        organization: &str,
        work_item_id: i64,
    ) -> Result<WorkItem, DevOpsError> {
        let id = work_item_id.to_string();
        let url = api_url(
            &self.base_url(false),
            &[organization, "_apis", "wit", "workitems", id.as_str()],
            &[("api-version", WORK_ITEMS_API_VERSION)],
        )?;
        self.execute_json(user_id, self.request(Method::GET, url))
            .await
    }

    #[instrument(skip(self))]
    async fn get_pull_request(
        &self,
        user_id: &UserId,
        organization: &str,
        project: &str,
        pull_request_id: i64,
    ) -> Result<PullRequest, DevOpsError> {
        let id = pull_request_id.to_string();
        let url = api_url(
            &self.base_url(false),
            &[organization, project, "_apis", "git", "pullrequests", id.as_str()],
            &[("api-version", API_VERSION)],
        )?;
        self.execute_json(user_id, self.request(Method::GET, url))
            .await
    }

    #[instrument(skip(self))]
    async fn get_build(
        &self,
        user_id: &UserId,
        organization: &str,
        project: &str,
        build_id: i64,
    ) -> Result<Build, DevOpsError> {
        let id = build_id.to_string();
        let url = api_url(
            &self.base_url(false),
            &[organization, project, "_apis", "build", "builds", id.as_str()],
            &[("api-version", API_VERSION)],
        )?;
        self.execute_json(user_id, self.request(Method::GET, url))
            .await
    }

    #[instrument(skip(self))]
    async fn get_release(
        &self,
        user_id: &UserId,
        organization: &str,
        project: &str,
        release_id: i64,
    ) -> Result<Release, DevOpsError> {
        let id = release_id.to_string();
        let url = api_url(
            &self.base_url(true),
            &[organization, project, "_apis", "release", "releases", id.as_str()],
            &[("api-version", API_VERSION)],
        )?;
        self.execute_json(user_id, self.request(Method::GET, url))
            .await
    }

    #[instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> Result<UserToken, DevOpsError> {
        let config = self.inner.config.snapshot();
        auth::exchange_code(&self.inner.client, &config.devops, code).await
    }
}
