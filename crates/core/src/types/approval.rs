//! Pipeline approval types.

use serde::{Deserialize, Serialize};

/// Decision requested by a user clicking an approval button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    #[serde(alias = "approve")]
    Approved,
    #[serde(alias = "reject")]
    Rejected,
}

impl ApprovalDecision {
    /// Status string sent to and reported by Azure DevOps.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ApprovalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApprovalDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" | "approve" => Ok(Self::Approved),
            "rejected" | "reject" => Ok(Self::Rejected),
            _ => Err(format!("invalid approval decision: {s}")),
        }
    }
}

/// The two approval gates the relay can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    /// Classic release environment approval, numeric id.
    Release,
    /// YAML pipeline run stage approval, GUID id, possibly several approvers.
    RunStage,
}

/// Whether a remote approval status still accepts a decision.
#[must_use]
pub fn is_pending_status(status: &str) -> bool {
    status.eq_ignore_ascii_case("pending")
}
