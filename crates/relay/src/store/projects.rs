//! Linked projects.

use std::sync::Arc;

use devops_relay_core::UserId;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{PROJECT_LIST_KEY, StoreError, load_json, store_json};
use crate::kv::KvStore;

/// A project a user has linked to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetails {
    #[serde(rename = "mattermostUserID")]
    pub owner_user_id: UserId,
    pub organization_name: String,
    pub project_name: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
}

impl ProjectDetails {
    fn is(&self, owner: &UserId, organization: &str, project: &str) -> bool {
        &self.owner_user_id == owner
            && self.organization_name.eq_ignore_ascii_case(organization)
            && self.project_name.eq_ignore_ascii_case(project)
    }
}

/// Store of linked projects, unique per (owner, organization, project).
#[derive(Clone)]
pub struct ProjectStore {
    kv: Arc<dyn KvStore>,
    write_lock: Arc<Mutex<()>>,
}

impl ProjectStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_all(&self) -> Result<Vec<ProjectDetails>, StoreError> {
        Ok(load_json(self.kv.as_ref(), PROJECT_LIST_KEY)
            .await?
            .unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails or the list is corrupt.
    pub async fn list(&self, owner: &UserId) -> Result<Vec<ProjectDetails>, StoreError> {
        let mut projects = self.load_all().await?;
        projects.retain(|project| &project.owner_user_id == owner);
        Ok(projects)
    }

    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails or the list is corrupt.
    pub async fn find(
        &self,
        owner: &UserId,
        organization: &str,
        project: &str,
    ) -> Result<Option<ProjectDetails>, StoreError> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .find(|details| details.is(owner, organization, project)))
    }

    /// Link a project. Returns `false` when it was already linked.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails or the list is corrupt.
    pub async fn link(&self, details: ProjectDetails) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut projects = self.load_all().await?;
        if projects.iter().any(|existing| {
            existing.is(
                &details.owner_user_id,
                &details.organization_name,
                &details.project_name,
            )
        }) {
            return Ok(false);
        }
        projects.push(details);
        store_json(self.kv.as_ref(), PROJECT_LIST_KEY, &projects).await?;
        Ok(true)
    }

    /// Unlink a project. Returns whether it was linked.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails or the list is corrupt.
    pub async fn unlink(
        &self,
        owner: &UserId,
        organization: &str,
        project: &str,
    ) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut projects = self.load_all().await?;
        let before = projects.len();
        projects.retain(|details| !details.is(owner, organization, project));
        if projects.len() == before {
            return Ok(false);
        }
        store_json(self.kv.as_ref(), PROJECT_LIST_KEY, &projects).await?;
        Ok(true)
    }
}
