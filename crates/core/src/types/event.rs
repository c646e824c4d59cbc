//! Azure DevOps event types and the lookup tables derived from them.
//!
//! Every table is an exhaustive `match` over [`EventType`], so adding a new
//! event type fails to compile until its publisher, service type and filter
//! bucket are decided.

use serde::{Deserialize, Serialize};

/// Service hook event type, as named on the wire by Azure DevOps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "git.pullrequest.created")]
    PullRequestCreated,
    #[serde(rename = "git.pullrequest.updated")]
    PullRequestUpdated,
    #[serde(rename = "ms.vss-code.git-pullrequest-comment-event")]
    PullRequestCommented,
    #[serde(rename = "git.pullrequest.merged")]
    PullRequestMerged,
    #[serde(rename = "git.push")]
    CodePushed,
    #[serde(rename = "workitem.created")]
    WorkItemCreated,
    #[serde(rename = "workitem.updated")]
    WorkItemUpdated,
    #[serde(rename = "workitem.deleted")]
    WorkItemDeleted,
    #[serde(rename = "workitem.commented")]
    WorkItemCommented,
    #[serde(rename = "build.complete")]
    BuildCompleted,
    #[serde(rename = "ms.vss-release.release-abandoned-event")]
    ReleaseAbandoned,
    #[serde(rename = "ms.vss-release.release-created-event")]
    ReleaseCreated,
    #[serde(rename = "ms.vss-release.deployment-approval-completed-event")]
    ReleaseDeploymentApprovalCompleted,
    #[serde(rename = "ms.vss-release.deployment-approval-pending-event")]
    ReleaseDeploymentApprovalPending,
    #[serde(rename = "ms.vss-release.deployment-completed-event")]
    ReleaseDeploymentCompleted,
    #[serde(rename = "ms.vss-release.deployment-started-event")]
    ReleaseDeploymentStarted,
    #[serde(rename = "ms.vss-pipelinechecks-events.approval-completed")]
    RunStageApprovalCompleted,
    #[serde(rename = "ms.vss-pipelines.stage-state-changed-event")]
    RunStageStateChanged,
    #[serde(rename = "ms.vss-pipelinechecks-events.approval-pending")]
    RunStageWaitingForApproval,
    #[serde(rename = "ms.vss-pipelines.run-state-changed-event")]
    RunStateChanged,
}

impl EventType {
    /// Every event type the relay can subscribe to.
    pub const ALL: [Self; 20] = [
        Self::PullRequestCreated,
        Self::PullRequestUpdated,
        Self::PullRequestCommented,
        Self::PullRequestMerged,
        Self::CodePushed,
        Self::WorkItemCreated,
        Self::WorkItemUpdated,
        Self::WorkItemDeleted,
        Self::WorkItemCommented,
        Self::BuildCompleted,
        Self::ReleaseAbandoned,
        Self::ReleaseCreated,
        Self::ReleaseDeploymentApprovalCompleted,
        Self::ReleaseDeploymentApprovalPending,
        Self::ReleaseDeploymentCompleted,
        Self::ReleaseDeploymentStarted,
        Self::RunStageApprovalCompleted,
        Self::RunStageStateChanged,
        Self::RunStageWaitingForApproval,
        Self::RunStateChanged,
    ];

    /// Wire name used by Azure DevOps.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PullRequestCreated => "git.pullrequest.created",
            Self::PullRequestUpdated => "git.pullrequest.updated",
            Self::PullRequestCommented => "ms.vss-code.git-pullrequest-comment-event",
            Self::PullRequestMerged => "git.pullrequest.merged",
            Self::CodePushed => "git.push",
            Self::WorkItemCreated => "workitem.created",
            Self::WorkItemUpdated => "workitem.updated",
            Self::WorkItemDeleted => "workitem.deleted",
            Self::WorkItemCommented => "workitem.commented",
            Self::BuildCompleted => "build.complete",
            Self::ReleaseAbandoned => "ms.vss-release.release-abandoned-event",
            Self::ReleaseCreated => "ms.vss-release.release-created-event",
            Self::ReleaseDeploymentApprovalCompleted => {
                "ms.vss-release.deployment-approval-completed-event"
            }
            Self::ReleaseDeploymentApprovalPending => {
                "ms.vss-release.deployment-approval-pending-event"
            }
            Self::ReleaseDeploymentCompleted => "ms.vss-release.deployment-completed-event",
            Self::ReleaseDeploymentStarted => "ms.vss-release.deployment-started-event",
            Self::RunStageApprovalCompleted => "ms.vss-pipelinechecks-events.approval-completed",
            Self::RunStageStateChanged => "ms.vss-pipelines.stage-state-changed-event",
            Self::RunStageWaitingForApproval => "ms.vss-pipelinechecks-events.approval-pending",
            Self::RunStateChanged => "ms.vss-pipelines.run-state-changed-event",
        }
    }

    /// Human readable name shown in subscription listings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PullRequestCreated => "Pull Request Created",
            Self::PullRequestUpdated => "Pull Request Updated",
            Self::PullRequestCommented => "Pull Request Commented On",
            Self::PullRequestMerged => "Pull Request Merge Attempted",
            Self::CodePushed => "Code Pushed",
            Self::WorkItemCreated => "Work Item Created",
            Self::WorkItemUpdated => "Work Item Updated",
            Self::WorkItemDeleted => "Work Item Deleted",
            Self::WorkItemCommented => "Work Item Commented On",
            Self::BuildCompleted => "Build Completed",
            Self::ReleaseAbandoned => "Release Abandoned",
            Self::ReleaseCreated => "Release Created",
            Self::ReleaseDeploymentApprovalCompleted => "Release Deployment Approval Completed",
            Self::ReleaseDeploymentApprovalPending => "Release Deployment Approval Pending",
            Self::ReleaseDeploymentCompleted => "Release Deployment Completed",
            Self::ReleaseDeploymentStarted => "Release Deployment Started",
            Self::RunStageApprovalCompleted => "Run Stage Approval Completed",
            Self::RunStageStateChanged => "Run Stage State Changed",
            Self::RunStageWaitingForApproval => "Run Stage Waiting For Approval",
            Self::RunStateChanged => "Run State Changed",
        }
    }

    /// The event-producing subsystem that owns this event type.
    #[must_use]
    pub const fn publisher(self) -> Publisher {
        match self {
            Self::PullRequestCreated
            | Self::PullRequestUpdated
            | Self::PullRequestCommented
            | Self::PullRequestMerged
            | Self::CodePushed
            | Self::WorkItemCreated
            | Self::WorkItemUpdated
            | Self::WorkItemDeleted
            | Self::WorkItemCommented
            | Self::BuildCompleted => Publisher::Tfs,
            Self::ReleaseAbandoned
            | Self::ReleaseCreated
            | Self::ReleaseDeploymentApprovalCompleted
            | Self::ReleaseDeploymentApprovalPending
            | Self::ReleaseDeploymentCompleted
            | Self::ReleaseDeploymentStarted => Publisher::ReleaseManagement,
            Self::RunStageApprovalCompleted
            | Self::RunStageStateChanged
            | Self::RunStageWaitingForApproval
            | Self::RunStateChanged => Publisher::Pipelines,
        }
    }

    /// Product area the event type belongs to.
    #[must_use]
    pub const fn service_type(self) -> ServiceType {
        match self {
            Self::WorkItemCreated
            | Self::WorkItemUpdated
            | Self::WorkItemDeleted
            | Self::WorkItemCommented => ServiceType::Boards,
            Self::PullRequestCreated
            | Self::PullRequestUpdated
            | Self::PullRequestCommented
            | Self::PullRequestMerged
            | Self::CodePushed => ServiceType::Repos,
            Self::BuildCompleted
            | Self::ReleaseAbandoned
            | Self::ReleaseCreated
            | Self::ReleaseDeploymentApprovalCompleted
            | Self::ReleaseDeploymentApprovalPending
            | Self::ReleaseDeploymentCompleted
            | Self::ReleaseDeploymentStarted
            | Self::RunStageApprovalCompleted
            | Self::RunStageStateChanged
            | Self::RunStageWaitingForApproval
            | Self::RunStateChanged => ServiceType::Pipelines,
        }
    }

    /// Which shape of publisher inputs the event type uses.
    #[must_use]
    pub const fn filter_bucket(self) -> FilterBucket {
        match self {
            Self::PullRequestCreated
            | Self::PullRequestUpdated
            | Self::PullRequestCommented
            | Self::PullRequestMerged
            | Self::CodePushed => FilterBucket::Repo,
            Self::ReleaseAbandoned
            | Self::ReleaseCreated
            | Self::ReleaseDeploymentApprovalCompleted
            | Self::ReleaseDeploymentApprovalPending
            | Self::ReleaseDeploymentCompleted
            | Self::ReleaseDeploymentStarted => FilterBucket::Release,
            Self::RunStageApprovalCompleted
            | Self::RunStageStateChanged
            | Self::RunStageWaitingForApproval
            | Self::RunStateChanged => FilterBucket::Run,
            Self::WorkItemCreated
            | Self::WorkItemUpdated
            | Self::WorkItemDeleted
            | Self::WorkItemCommented
            | Self::BuildCompleted => FilterBucket::Generic,
        }
    }

    /// Release events are served by the release-management sub-host.
    #[must_use]
    pub const fn is_release(self) -> bool {
        matches!(self.filter_bucket(), FilterBucket::Release)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| format!("invalid event type: {s}"))
    }
}

/// Publisher id Azure DevOps uses to route a subscription internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Publisher {
    /// Version control, work tracking and builds.
    #[serde(rename = "tfs")]
    Tfs,
    /// Classic release management.
    #[serde(rename = "rm")]
    ReleaseManagement,
    /// YAML pipelines.
    #[serde(rename = "pipelines")]
    Pipelines,
}

impl Publisher {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tfs => "tfs",
            Self::ReleaseManagement => "rm",
            Self::Pipelines => "pipelines",
        }
    }
}

impl std::fmt::Display for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product area a subscription is bucketed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Boards,
    Repos,
    Pipelines,
}

impl ServiceType {
    pub const ALL: [Self; 3] = [Self::Boards, Self::Repos, Self::Pipelines];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boards => "boards",
            Self::Repos => "repos",
            Self::Pipelines => "pipelines",
        }
    }

    /// Title used in listing headers ("Boards", "Repos", "Pipelines").
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Boards => "Boards",
            Self::Repos => "Repos",
            Self::Pipelines => "Pipelines",
        }
    }

    /// Event types that may be subscribed to under this service type.
    pub fn event_types(self) -> impl Iterator<Item = EventType> {
        EventType::ALL
            .into_iter()
            .filter(move |event| event.service_type() == self)
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boards" => Ok(Self::Boards),
            "repos" => Ok(Self::Repos),
            "pipelines" => Ok(Self::Pipelines),
            _ => Err(format!("invalid service type: {s}")),
        }
    }
}

/// Shape of the publisher inputs sent for an event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterBucket {
    /// Repository scoped: repository, branch, pull request actors.
    Repo,
    /// Release definition and environment scoped.
    Release,
    /// Pipeline run scoped: pipeline, stage, run state ids.
    Run,
    /// Project scoped only (work items, builds).
    Generic,
}
