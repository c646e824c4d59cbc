//! Interactive approval posts.
//!
//! Approval pending events are posted with Approve and Reject buttons. When
//! a decision lands the same post is rewritten: the status field changes and
//! the buttons go away.

use devops_relay_core::ApprovalDecision;
use serde::{Deserialize, Serialize};

use crate::chat::{Attachment, ButtonStyle, Post, PostAction};
use crate::devops::RunApproval;

pub const STATUS_FIELD: &str = "Status";
const STEPS_HEADER: &str = "| Approver | Status |\n| :------- | :----- |\n";

/// Button context for a release deployment approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseApprovalContext {
    pub approval_id: i64,
    pub organization: String,
    pub project_name: String,
    pub request_type: ApprovalDecision,
}

/// Button context for a pipeline run stage approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunApprovalContext {
    pub approval_id: String,
    pub organization: String,
    pub project_id: String,
    pub request_type: ApprovalDecision,
}

/// Approve and Reject buttons calling `url`. `context_for` builds the
/// button context for a decision.
///
/// # Errors
///
/// Returns the JSON error if the context does not serialize.
pub fn approval_buttons<C, F>(url: &str, context_for: F) -> Result<Vec<PostAction>, serde_json::Error>
where
    C: Serialize,
    F: Fn(ApprovalDecision) -> C,
{
    Ok(vec![
        PostAction::button(
            "approve",
            "Approve",
            ButtonStyle::Success,
            url,
            serde_json::to_value(context_for(ApprovalDecision::Approved))?,
        ),
        PostAction::button(
            "reject",
            "Reject",
            ButtonStyle::Danger,
            url,
            serde_json::to_value(context_for(ApprovalDecision::Rejected))?,
        ),
    ])
}

/// "pending" → "Pending"
#[must_use]
pub fn display_status(status: &str) -> String {
    let mut chars = status.chars();
    chars.next().map_or_else(String::new, |first| {
        first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect()
    })
}

/// Markdown table with one row per approval step.
#[must_use]
pub fn steps_table<'a>(steps: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut table = STEPS_HEADER.to_string();
    for (approver, status) in steps {
        table.push_str(&format!("| {approver} | {} |\n", display_status(status)));
    }
    table
}

fn approval_attachments(post: &mut Post) -> impl Iterator<Item = &mut Attachment> {
    post.props.attachments.iter_mut().filter(|attachment| {
        !attachment.actions.is_empty()
            || attachment
                .fields
                .iter()
                .any(|field| field.title == STATUS_FIELD)
    })
}

/// Record a release approval's final status on its post.
pub fn apply_release_status(post: &mut Post, status: &str) {
    for attachment in approval_attachments(post) {
        attachment.set_field(STATUS_FIELD, display_status(status));
        attachment.actions.clear();
    }
}

/// Record a run stage approval's status and per-step results on its post.
pub fn apply_run_status(post: &mut Post, approval: &RunApproval) {
    let table = steps_table(
        approval
            .steps
            .iter()
            .map(|step| (step.approver_name(), step.status.as_str())),
    );
    for attachment in approval_attachments(post) {
        attachment.set_field(STATUS_FIELD, display_status(&approval.status));
        attachment.text.clone_from(&table);
        attachment.actions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devops::{IdentityRef, RunApprovalStep};
    use devops_relay_core::ChannelId;

    fn pending_post() -> Post {
        let actions = approval_buttons("https://relay.test/pipelines/release/approve", |decision| {
            ReleaseApprovalContext {
                approval_id: 12,
                organization: "Org1".to_string(),
                project_name: "Proj1".to_string(),
                request_type: decision,
            }
        })
        .expect("buttons");
        let mut attachment = Attachment {
            title: "Release-1".to_string(),
            actions,
            ..Attachment::default()
        };
        attachment.set_field(STATUS_FIELD, "Pending");
        Post::new(ChannelId::new("c1"), "approval pending").with_attachments(vec![attachment])
    }

    #[test]
    fn test_buttons_carry_decision_context() {
        let post = pending_post();
        let actions = &post.props.attachments[0].actions;
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].integration.context["requestType"], "approved");
        assert_eq!(actions[1].integration.context["requestType"], "rejected");
        assert_eq!(actions[1].integration.context["approvalId"], 12);
        assert_eq!(actions[1].style, "danger");
    }

    #[test]
    fn test_release_status_replaces_buttons() {
        let mut post = pending_post();
        apply_release_status(&mut post, "approved");

        let attachment = &post.props.attachments[0];
        assert!(attachment.actions.is_empty());
        assert_eq!(attachment.fields.len(), 1);
        assert_eq!(attachment.fields[0].value, "Approved");
    }

    #[test]
    fn test_run_status_renders_one_row_per_step() {
        let mut post = pending_post();
        let approval = RunApproval {
            id: "guid".to_string(),
            status: "approved".to_string(),
            min_required_approvers: 1,
            steps: vec![
                RunApprovalStep {
                    assigned_approver: IdentityRef {
                        display_name: "Alice".to_string(),
                    },
                    actual_approver: None,
                    status: "approved".to_string(),
                    comment: String::new(),
                },
                RunApprovalStep {
                    assigned_approver: IdentityRef {
                        display_name: "Bob".to_string(),
                    },
                    actual_approver: None,
                    status: "skipped".to_string(),
                    comment: String::new(),
                },
            ],
        };
        apply_run_status(&mut post, &approval);

        let text = &post.props.attachments[0].text;
        assert!(text.contains("| Alice | Approved |"));
        assert!(text.contains("| Bob | Skipped |"));
        assert!(post.props.attachments[0].actions.is_empty());
    }

    #[test]
    fn test_display_status() {
        assert_eq!(display_status("pending"), "Pending");
        assert_eq!(display_status("REJECTED"), "Rejected");
        assert_eq!(display_status(""), "");
    }
}
