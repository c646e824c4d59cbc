//! Linking and unlinking Azure DevOps projects.

use devops_relay_core::UserId;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::constants::{
    ORGANIZATION_REQUIRED, PROJECT_ALREADY_LINKED, PROJECT_NOT_FOUND, PROJECT_REQUIRED,
};
use crate::error::AppError;
use crate::services::subscriptions::delete_subscription;
use crate::state::AppState;
use crate::store::ProjectDetails;

/// Body of `POST /link` and `POST /project/unlink`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectPayload {
    pub organization: String,
    pub project: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
}

impl ProjectPayload {
    fn validate(&self) -> Result<(), AppError> {
        if self.organization.trim().is_empty() {
            return Err(AppError::Validation(ORGANIZATION_REQUIRED.to_string()));
        }
        if self.project.trim().is_empty() {
            return Err(AppError::Validation(PROJECT_REQUIRED.to_string()));
        }
        Ok(())
    }
}

/// Look the project up in Azure DevOps and link it for `user_id`.
///
/// # Errors
///
/// Returns `AppError::BadRequest` when the project is already linked.
#[instrument(skip(state, payload), fields(user_id = %user_id, project = %payload.project))]
pub async fn link_project(
    state: &AppState,
    user_id: &UserId,
    payload: ProjectPayload,
) -> Result<ProjectDetails, AppError> {
    payload.validate()?;
    let organization = payload.organization.trim();

    let remote = state
        .devops()
        .get_project(user_id, organization, payload.project.trim())
        .await?;
    let details = ProjectDetails {
        owner_user_id: user_id.clone(),
        organization_name: organization.to_string(),
        project_name: remote.name,
        project_id: remote.id,
    };
    if !state.projects().link(details.clone()).await? {
        return Err(AppError::BadRequest(PROJECT_ALREADY_LINKED.to_string()));
    }

    info!(project_id = %details.project_id, "Project linked");
    Ok(details)
}

/// Projects linked by `user_id`.
///
/// # Errors
///
/// Returns `AppError::Store` if the backend fails.
pub async fn list_projects(
    state: &AppState,
    user_id: &UserId,
) -> Result<Vec<ProjectDetails>, AppError> {
    Ok(state.projects().list(user_id).await?)
}

/// Delete the user's subscriptions for the project, then unlink it.
///
/// The first failed subscription delete stops the cascade; the project stays
/// linked with whatever subscriptions remain.
///
/// # Errors
///
/// Returns `AppError::NotFound` when the project is not linked.
#[instrument(skip(state, payload), fields(user_id = %user_id, project = %payload.project))]
pub async fn unlink_project(
    state: &AppState,
    user_id: &UserId,
    payload: ProjectPayload,
) -> Result<(), AppError> {
    payload.validate()?;
    let project = state
        .projects()
        .find(user_id, &payload.organization, &payload.project)
        .await?
        .ok_or_else(|| AppError::NotFound(PROJECT_NOT_FOUND.to_string()))?;

    let subscriptions = state.subscriptions().list(Some(user_id)).await?;
    for record in subscriptions.iter().filter(|record| {
        record
            .organization
            .eq_ignore_ascii_case(&project.organization_name)
            && record.project_name.eq_ignore_ascii_case(&project.project_name)
    }) {
        delete_subscription(state, user_id, record).await?;
    }

    state
        .projects()
        .unlink(user_id, &project.organization_name, &project.project_name)
        .await?;
    info!(project_id = %project.project_id, "Project unlinked");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::subscriptions::tests::record;
    use crate::testing::TestRelay;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alice() -> UserId {
        UserId::new("u1")
    }

    fn payload(project: &str) -> ProjectPayload {
        ProjectPayload {
            organization: "Org1".to_string(),
            project: project.to_string(),
            project_id: String::new(),
        }
    }

    #[tokio::test]
    async fn test_link_stores_remote_details_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Org1/_apis/projects/proj1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "project-guid",
                "name": "Proj1"
            })))
            .mount(&server)
            .await;
        let relay = TestRelay::new(&server.uri()).expect("relay");
        relay.connect(&alice()).await.expect("connect");

        let details = link_project(&relay.state, &alice(), payload("proj1"))
            .await
            .expect("link");
        assert_eq!(details.project_name, "Proj1");
        assert_eq!(details.project_id, "project-guid");
        assert_eq!(list_projects(&relay.state, &alice()).await.expect("list").len(), 1);

        let again = link_project(&relay.state, &alice(), payload("proj1")).await;
        assert!(
            matches!(again, Err(AppError::BadRequest(ref m)) if m == PROJECT_ALREADY_LINKED)
        );
    }

    #[tokio::test]
    async fn test_link_without_connection_is_not_connected() {
        let server = MockServer::start().await;
        let relay = TestRelay::new(&server.uri()).expect("relay");
        let result = link_project(&relay.state, &alice(), payload("Proj1")).await;
        let error = result.expect_err("not connected");
        assert_eq!(error.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unlink_cascades_subscription_deletes() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/Org1/_apis/hooks/subscriptions/s1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let relay = TestRelay::new(&server.uri()).expect("relay");
        relay.connect(&alice()).await.expect("connect");
        relay
            .link_project(&alice(), "Org1", "Proj1", "project-guid")
            .await
            .expect("link");
        relay.state.subscriptions().create(record("s1", "u1", "C1")).await.expect("create");
        relay.state.subscriptions().create(record("s2", "u2", "C1")).await.expect("create");

        unlink_project(&relay.state, &alice(), payload("Proj1"))
            .await
            .expect("unlink");

        let remaining = relay.state.subscriptions().list(None).await.expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].subscription_id, "s2");
        assert!(list_projects(&relay.state, &alice()).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_unlink_stops_on_first_failure() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/Org1/_apis/hooks/subscriptions/s1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let relay = TestRelay::new(&server.uri()).expect("relay");
        relay.connect(&alice()).await.expect("connect");
        relay
            .link_project(&alice(), "Org1", "Proj1", "project-guid")
            .await
            .expect("link");
        relay.state.subscriptions().create(record("s1", "u1", "C1")).await.expect("create");

        let result = unlink_project(&relay.state, &alice(), payload("Proj1")).await;
        assert!(matches!(result, Err(AppError::DevOps(_))));
        assert_eq!(list_projects(&relay.state, &alice()).await.expect("list").len(), 1);
        assert_eq!(relay.state.subscriptions().list(None).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_unlink_unknown_project() {
        let server = MockServer::start().await;
        let relay = TestRelay::new(&server.uri()).expect("relay");
        let result = unlink_project(&relay.state, &alice(), payload("Missing")).await;
        assert!(matches!(result, Err(AppError::NotFound(ref m)) if m == PROJECT_NOT_FOUND));
    }
}
