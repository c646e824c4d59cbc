//! Event formatters.
//!
//! Every [`EventType`] maps to one pure function from the envelope to the
//! post content. The base markdown Azure DevOps sends is always the post
//! message; formatters add attachments with the fields a channel cares about.

use chrono::{DateTime, FixedOffset, Utc};
use devops_relay_core::{ChannelId, EventType};
use serde_json::Value;
use thiserror::Error;

use super::approval_posts::{
    ReleaseApprovalContext, RunApprovalContext, STATUS_FIELD, approval_buttons, display_status,
    steps_table,
};
use super::envelope::Envelope;
use crate::chat::{Attachment, AttachmentField, Post};
use crate::constants::{PATH_RELEASE_APPROVAL, PATH_RUN_APPROVAL};

const COLOR_AZURE: &str = "#0078d4";
const COLOR_SUCCESS: &str = "#339970";
const COLOR_FAILURE: &str = "#d24b4e";
const COLOR_PENDING: &str = "#ffbc1f";
const BRANCH_PREFIX: &str = "refs/heads/";
const TIMESTAMP_DISPLAY_FORMAT: &str = "%b %d, %Y %H:%M UTC";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid {field} timestamp {value:?}: {source}")]
    Timestamp {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("notification is missing {0}")]
    MissingField(&'static str),

    #[error("approval context: {0}")]
    Context(#[from] serde_json::Error),
}

/// What a formatter may need beyond the envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderContext<'a> {
    /// Relay base URL for button callbacks
    pub public_url: &'a str,
    /// Organization of the matching subscription, used when the
    /// envelope does not carry one
    pub organization: Option<&'a str>,
    pub project_name: Option<&'a str>,
    pub project_id: Option<&'a str>,
}

/// Post content produced by a formatter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedPost {
    pub message: String,
    pub attachments: Vec<Attachment>,
}

impl RenderedPost {
    #[must_use]
    pub fn into_post(self, channel_id: ChannelId) -> Post {
        Post::new(channel_id, self.message).with_attachments(self.attachments)
    }
}

pub type Formatter = fn(&Envelope, &RenderContext<'_>) -> Result<RenderedPost, RenderError>;

/// The formatter for `event`.
#[must_use]
pub const fn formatter_for(event: EventType) -> Formatter {
    match event {
        EventType::PullRequestCreated
        | EventType::PullRequestUpdated
        | EventType::PullRequestMerged => pull_request,
        EventType::PullRequestCommented => pull_request_commented,
        EventType::CodePushed => code_pushed,
        EventType::WorkItemCreated
        | EventType::WorkItemUpdated
        | EventType::WorkItemDeleted
        | EventType::WorkItemCommented => work_item,
        EventType::BuildCompleted => build_completed,
        EventType::ReleaseCreated => release_created,
        EventType::ReleaseAbandoned => release_abandoned,
        EventType::ReleaseDeploymentStarted | EventType::ReleaseDeploymentCompleted => {
            release_deployment
        }
        EventType::ReleaseDeploymentApprovalPending => release_approval_pending,
        EventType::ReleaseDeploymentApprovalCompleted => release_approval_completed,
        EventType::RunStageStateChanged => run_stage_state_changed,
        EventType::RunStateChanged => run_state_changed,
        EventType::RunStageWaitingForApproval => run_stage_approval_pending,
        EventType::RunStageApprovalCompleted => run_stage_approval_completed,
    }
}

/// Render a notification. Unknown event types keep the base markdown.
///
/// # Errors
///
/// Returns `RenderError` when a timestamp does not parse or an approval
/// event lacks the data its buttons need.
pub fn render(envelope: &Envelope, context: &RenderContext<'_>) -> Result<RenderedPost, RenderError> {
    match envelope.kind() {
        Some(event) => formatter_for(event)(envelope, context),
        None => Ok(base(envelope)),
    }
}

fn base(envelope: &Envelope) -> RenderedPost {
    RenderedPost {
        message: envelope.base_markdown().to_string(),
        attachments: Vec::new(),
    }
}

fn with_attachment(envelope: &Envelope, attachment: Attachment) -> RenderedPost {
    RenderedPost {
        message: envelope.base_markdown().to_string(),
        attachments: vec![attachment],
    }
}

/// `refs/heads/main` → `main`
#[must_use]
pub fn branch_name(reference: &str) -> &str {
    reference.strip_prefix(BRANCH_PREFIX).unwrap_or(reference)
}

fn link(title: String, url: Option<&str>) -> String {
    match url {
        Some(url) => format!("[{title}]({url})"),
        None => title,
    }
}

pub(super) fn push_field(fields: &mut Vec<AttachmentField>, title: &str, value: Option<impl Into<String>>) {
    if let Some(value) = value {
        let value = value.into();
        if !value.is_empty() {
            fields.push(AttachmentField::new(title, value, true));
        }
    }
}

fn parse_timestamp(
    envelope: &Envelope,
    pointer: &str,
    field: &'static str,
) -> Result<DateTime<FixedOffset>, RenderError> {
    let value = envelope.text(pointer).unwrap_or_default();
    DateTime::parse_from_rfc3339(value).map_err(|source| RenderError::Timestamp {
        field,
        value: value.to_string(),
        source,
    })
}

pub(super) fn result_color(result: Option<&str>) -> &'static str {
    match result.map(str::to_ascii_lowercase).as_deref() {
        Some("succeeded" | "approved" | "completed") => COLOR_SUCCESS,
        Some("failed" | "rejected" | "canceled" | "abandoned") => COLOR_FAILURE,
        Some("pending" | "inprogress" | "waitingforapproval") => COLOR_PENDING,
        _ => COLOR_AZURE,
    }
}

fn names<'a>(values: &'a [Value], pointer: &str) -> Vec<&'a str> {
    values
        .iter()
        .filter_map(|value| value.pointer(pointer).and_then(Value::as_str))
        .filter(|name| !name.is_empty())
        .collect()
}

fn organization(envelope: &Envelope, context: &RenderContext<'_>) -> Result<String, RenderError> {
    envelope
        .organization()
        .or_else(|| context.organization.map(str::to_string))
        .ok_or(RenderError::MissingField("organization"))
}

fn approval_url(context: &RenderContext<'_>, path: &str) -> String {
    format!("{}{path}", context.public_url.trim_end_matches('/'))
}

// =============================================================================
// Repos
// =============================================================================

/// Shared by created, updated and merged: the resource is the pull request.
fn pull_request_attachment(envelope: &Envelope, root: &str) -> Attachment {
    let at = |pointer: &str| format!("{root}{pointer}");
    let id = envelope.scalar(&at("/pullRequestId")).unwrap_or_default();
    let title = envelope.text(&at("/title")).unwrap_or_default();
    let web_url = envelope
        .text(&at("/repository/webUrl"))
        .map(|repo| format!("{repo}/pullrequest/{id}"));

    let mut fields = Vec::new();
    push_field(&mut fields, "Repository", envelope.text(&at("/repository/name")));
    push_field(
        &mut fields,
        "Source Branch",
        envelope.text(&at("/sourceRefName")).map(branch_name),
    );
    push_field(
        &mut fields,
        "Target Branch",
        envelope.text(&at("/targetRefName")).map(branch_name),
    );
    let reviewers = names(envelope.array(&at("/reviewers")), "/displayName");
    if !reviewers.is_empty() {
        fields.push(AttachmentField::new("Reviewers", reviewers.join(", "), false));
    }
    push_field(&mut fields, "Merge Status", envelope.text(&at("/mergeStatus")));

    Attachment {
        color: COLOR_AZURE.to_string(),
        title: link(format!("#{id}: {title}"), web_url.as_deref()),
        text: envelope
            .text(&at("/description"))
            .unwrap_or_default()
            .to_string(),
        fields,
        ..Attachment::default()
    }
}

fn pull_request(envelope: &Envelope, _: &RenderContext<'_>) -> Result<RenderedPost, RenderError> {
    Ok(with_attachment(envelope, pull_request_attachment(envelope, "")))
}

fn pull_request_commented(
    envelope: &Envelope,
    _: &RenderContext<'_>,
) -> Result<RenderedPost, RenderError> {
    let mut attachment = pull_request_attachment(envelope, "/pullRequest");
    attachment.text = envelope
        .text("/comment/content")
        .map(|comment| format!("> {comment}"))
        .unwrap_or_default();
    Ok(with_attachment(envelope, attachment))
}

fn code_pushed(envelope: &Envelope, _: &RenderContext<'_>) -> Result<RenderedPost, RenderError> {
    let mut rendered = base(envelope);
    let Some(branch) = envelope.text("/refUpdates/0/name").map(branch_name) else {
        return Ok(rendered);
    };
    if !rendered.message.is_empty() {
        rendered.message.push('\n');
    }
    rendered.message.push_str(&format!("**Branch:** {branch}"));

    let commits: Vec<String> = envelope
        .array("/commits")
        .iter()
        .map(|commit| {
            let id = commit
                .get("commitId")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let short: String = id.chars().take(8).collect();
            let comment = commit
                .get("comment")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let url = commit.get("url").and_then(Value::as_str);
            format!("- {} {comment}", link(format!("`{short}`"), url))
        })
        .collect();

    let mut fields = Vec::new();
    push_field(&mut fields, "Repository", envelope.text("/repository/name"));
    push_field(&mut fields, "Pushed By", envelope.text("/pushedBy/displayName"));
    rendered.attachments.push(Attachment {
        color: COLOR_AZURE.to_string(),
        text: commits.join("\n"),
        fields,
        ..Attachment::default()
    });
    Ok(rendered)
}

// =============================================================================
// Boards
// =============================================================================

fn work_item(envelope: &Envelope, _: &RenderContext<'_>) -> Result<RenderedPost, RenderError> {
    // Updates carry the current fields under `revision`.
    let fields_root = if envelope.resource.pointer("/revision/fields").is_some() {
        "/revision/fields"
    } else {
        "/fields"
    };
    let field = |name: &str| envelope.scalar(&format!("{fields_root}/{name}"));

    let id = envelope
        .scalar("/workItemId")
        .or_else(|| envelope.scalar("/id"))
        .unwrap_or_default();
    let kind = field("System.WorkItemType").unwrap_or_default();
    let title = field("System.Title").unwrap_or_default();

    let mut fields = Vec::new();
    push_field(&mut fields, "State", field("System.State"));
    push_field(&mut fields, "Area Path", field("System.AreaPath"));
    push_field(&mut fields, "Project", field("System.TeamProject"));

    Ok(with_attachment(
        envelope,
        Attachment {
            color: COLOR_AZURE.to_string(),
            title: link(
                format!("{kind} #{id}: {title}"),
                envelope.text("/_links/html/href"),
            ),
            fields,
            ..Attachment::default()
        },
    ))
}

// =============================================================================
// Pipelines
// =============================================================================

fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (hours, minutes, seconds) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn build_completed(
    envelope: &Envelope,
    _: &RenderContext<'_>,
) -> Result<RenderedPost, RenderError> {
    let started = parse_timestamp(envelope, "/startTime", "startTime")?;
    let finished = parse_timestamp(envelope, "/finishTime", "finishTime")?;

    let result = envelope
        .text("/result")
        .or_else(|| envelope.text("/status"));
    let number = envelope.scalar("/buildNumber").unwrap_or_default();
    let definition = envelope.text("/definition/name").unwrap_or_default();

    let mut fields = Vec::new();
    push_field(&mut fields, STATUS_FIELD, result.map(display_status));
    push_field(
        &mut fields,
        "Branch",
        envelope.text("/sourceBranch").map(branch_name),
    );
    push_field(
        &mut fields,
        "Requested For",
        envelope.text("/requestedFor/displayName"),
    );
    fields.push(AttachmentField::new(
        "Duration",
        format_duration((finished - started).num_seconds()),
        true,
    ));

    Ok(with_attachment(
        envelope,
        Attachment {
            color: result_color(result).to_string(),
            title: format!(
                "{}: {definition}",
                link(format!("#{number}"), envelope.text("/_links/web/href"))
            ),
            fields,
            ..Attachment::default()
        },
    ))
}

fn release_attachment(
    envelope: &Envelope,
    actor_field: &str,
    actor_pointer: &str,
) -> Result<Attachment, RenderError> {
    let modified = parse_timestamp(envelope, "/release/modifiedOn", "modifiedOn")?;
    let name = envelope.text("/release/name").unwrap_or_default();
    let definition = envelope
        .text("/release/releaseDefinition/name")
        .unwrap_or_default();

    let mut fields = Vec::new();
    push_field(&mut fields, actor_field, envelope.text(actor_pointer));
    push_field(&mut fields, "Reason", envelope.text("/release/reason"));
    let artifacts = names(envelope.array("/release/artifacts"), "/alias");
    if !artifacts.is_empty() {
        fields.push(AttachmentField::new("Artifacts", artifacts.join(", "), true));
    }
    fields.push(AttachmentField::new(
        "Modified On",
        modified.with_timezone(&Utc).format(TIMESTAMP_DISPLAY_FORMAT).to_string(),
        true,
    ));

    Ok(Attachment {
        color: COLOR_AZURE.to_string(),
        title: format!(
            "{}: {definition}",
            link(name.to_string(), envelope.text("/release/_links/web/href"))
        ),
        fields,
        ..Attachment::default()
    })
}

fn release_created(
    envelope: &Envelope,
    _: &RenderContext<'_>,
) -> Result<RenderedPost, RenderError> {
    let attachment = release_attachment(envelope, "Created By", "/release/createdBy/displayName")?;
    Ok(with_attachment(envelope, attachment))
}

fn release_abandoned(
    envelope: &Envelope,
    _: &RenderContext<'_>,
) -> Result<RenderedPost, RenderError> {
    let mut attachment =
        release_attachment(envelope, "Abandoned By", "/release/modifiedBy/displayName")?;
    attachment.color = COLOR_FAILURE.to_string();
    Ok(with_attachment(envelope, attachment))
}

fn release_deployment(
    envelope: &Envelope,
    _: &RenderContext<'_>,
) -> Result<RenderedPost, RenderError> {
    let status = envelope.text("/environment/status");
    let release = envelope.text("/environment/release/name").unwrap_or_default();
    let definition = envelope
        .text("/environment/releaseDefinition/name")
        .unwrap_or_default();

    let mut fields = Vec::new();
    push_field(&mut fields, "Stage", envelope.text("/environment/name"));
    push_field(&mut fields, STATUS_FIELD, status.map(display_status));

    Ok(with_attachment(
        envelope,
        Attachment {
            color: result_color(status).to_string(),
            title: format!(
                "{}: {definition}",
                link(
                    release.to_string(),
                    envelope.text("/environment/release/_links/web/href")
                )
            ),
            // Completed deployments carry the deployer's comment as a string.
            text: envelope.text("/comment").unwrap_or_default().to_string(),
            fields,
            ..Attachment::default()
        },
    ))
}

fn release_approval_fields(envelope: &Envelope, status: &str) -> Vec<AttachmentField> {
    let mut fields = Vec::new();
    push_field(
        &mut fields,
        "Approver",
        envelope.text("/approval/approver/displayName"),
    );
    push_field(
        &mut fields,
        "Stage",
        envelope.text("/approval/releaseEnvironment/name"),
    );
    fields.push(AttachmentField::new(STATUS_FIELD, display_status(status), true));
    fields
}

fn release_approval_title(envelope: &Envelope) -> String {
    let release = envelope
        .text("/approval/release/name")
        .or_else(|| envelope.text("/release/name"))
        .unwrap_or_default();
    let definition = envelope
        .text("/approval/releaseDefinition/name")
        .unwrap_or_default();
    format!("{release}: {definition}")
}

fn release_approval_pending(
    envelope: &Envelope,
    context: &RenderContext<'_>,
) -> Result<RenderedPost, RenderError> {
    let approval_id = envelope
        .resource
        .pointer("/approval/id")
        .and_then(Value::as_i64)
        .ok_or(RenderError::MissingField("approval id"))?;
    let organization = organization(envelope, context)?;
    let project_name = envelope
        .text("/project/name")
        .or(context.project_name)
        .ok_or(RenderError::MissingField("project name"))?
        .to_string();

    let actions = approval_buttons(&approval_url(context, PATH_RELEASE_APPROVAL), |decision| {
        ReleaseApprovalContext {
            approval_id,
            organization: organization.clone(),
            project_name: project_name.clone(),
            request_type: decision,
        }
    })?;

    Ok(with_attachment(
        envelope,
        Attachment {
            color: COLOR_PENDING.to_string(),
            title: release_approval_title(envelope),
            fields: release_approval_fields(envelope, "pending"),
            actions,
            ..Attachment::default()
        },
    ))
}

fn release_approval_completed(
    envelope: &Envelope,
    _: &RenderContext<'_>,
) -> Result<RenderedPost, RenderError> {
    let status = envelope.text("/approval/status").unwrap_or_default();
    Ok(with_attachment(
        envelope,
        Attachment {
            color: result_color(Some(status)).to_string(),
            title: release_approval_title(envelope),
            text: envelope
                .text("/approval/comments")
                .unwrap_or_default()
                .to_string(),
            fields: release_approval_fields(envelope, status),
            ..Attachment::default()
        },
    ))
}

fn run_title(envelope: &Envelope, name_pointer: &str, link_pointer: &str) -> String {
    let name = envelope.text(name_pointer).unwrap_or_default();
    let pipeline = envelope.text("/pipeline/name").unwrap_or_default();
    format!("{}: {pipeline}", link(name.to_string(), envelope.text(link_pointer)))
}

fn run_stage_state_changed(
    envelope: &Envelope,
    _: &RenderContext<'_>,
) -> Result<RenderedPost, RenderError> {
    let result = envelope
        .text("/stage/result")
        .or_else(|| envelope.text("/stage/state"));

    let mut fields = Vec::new();
    push_field(&mut fields, "Stage", envelope.text("/stage/name"));
    push_field(&mut fields, "Run", envelope.text("/run/name"));
    push_field(&mut fields, STATUS_FIELD, result.map(display_status));

    Ok(with_attachment(
        envelope,
        Attachment {
            color: result_color(result).to_string(),
            title: run_title(envelope, "/stage/name", "/stage/_links/web/href"),
            fields,
            ..Attachment::default()
        },
    ))
}

fn run_state_changed(
    envelope: &Envelope,
    _: &RenderContext<'_>,
) -> Result<RenderedPost, RenderError> {
    let result = envelope
        .text("/run/result")
        .or_else(|| envelope.text("/run/state"));

    let mut fields = Vec::new();
    push_field(&mut fields, STATUS_FIELD, result.map(display_status));

    Ok(with_attachment(
        envelope,
        Attachment {
            color: result_color(result).to_string(),
            title: run_title(envelope, "/run/name", "/run/_links/web/href"),
            fields,
            ..Attachment::default()
        },
    ))
}

fn run_approval_attachment(envelope: &Envelope, status: &str) -> Attachment {
    let steps = envelope.array("/approval/steps");
    let rows = steps.iter().map(|step| {
        let approver = step
            .pointer("/actualApprover/displayName")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .or_else(|| {
                step.pointer("/assignedApprover/displayName")
                    .and_then(Value::as_str)
            })
            .unwrap_or_default();
        let step_status = step.get("status").and_then(Value::as_str).unwrap_or(status);
        (approver, step_status)
    });

    let mut fields = Vec::new();
    push_field(&mut fields, "Stage", envelope.text("/stageName"));
    push_field(
        &mut fields,
        "Minimum Approvers",
        envelope.scalar("/approval/minRequiredApprovers"),
    );
    fields.push(AttachmentField::new(STATUS_FIELD, display_status(status), true));

    Attachment {
        color: result_color(Some(status)).to_string(),
        title: run_title(envelope, "/run/name", "/run/_links/web/href"),
        text: if steps.is_empty() {
            String::new()
        } else {
            steps_table(rows)
        },
        fields,
        ..Attachment::default()
    }
}

fn run_stage_approval_pending(
    envelope: &Envelope,
    context: &RenderContext<'_>,
) -> Result<RenderedPost, RenderError> {
    let approval_id = envelope
        .text("/approval/id")
        .ok_or(RenderError::MissingField("approval id"))?
        .to_string();
    let organization = organization(envelope, context)?;
    let project_id = envelope
        .text("/projectId")
        .or(context.project_id)
        .ok_or(RenderError::MissingField("project id"))?
        .to_string();

    let mut attachment = run_approval_attachment(envelope, "pending");
    attachment.actions = approval_buttons(&approval_url(context, PATH_RUN_APPROVAL), |decision| {
        RunApprovalContext {
            approval_id: approval_id.clone(),
            organization: organization.clone(),
            project_id: project_id.clone(),
            request_type: decision,
        }
    })?;
    Ok(with_attachment(envelope, attachment))
}

fn run_stage_approval_completed(
    envelope: &Envelope,
    _: &RenderContext<'_>,
) -> Result<RenderedPost, RenderError> {
    let status = envelope.text("/approval/status").unwrap_or_default();
    Ok(with_attachment(envelope, run_approval_attachment(envelope, status)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLIC_URL: &str = "https://relay.test";

    fn context() -> RenderContext<'static> {
        RenderContext {
            public_url: PUBLIC_URL,
            ..RenderContext::default()
        }
    }

    fn envelope(json: serde_json::Value) -> Envelope {
        serde_json::from_value(json).expect("envelope")
    }

    fn render_ok(json: serde_json::Value) -> RenderedPost {
        render(&envelope(json), &context()).expect("render")
    }

    #[test]
    fn test_every_event_type_has_a_formatter() {
        let envelope = envelope(serde_json::json!({
            "detailedMessage": {"markdown": "base"},
            "resource": {
                "startTime": "2024-01-05T10:00:00Z",
                "finishTime": "2024-01-05T10:01:05Z",
                "release": {"modifiedOn": "2024-01-05T10:00:00Z"},
                "approval": {"id": 3},
                "project": {"name": "Proj1"}
            },
            "resourceContainers": {"collection": {"baseUrl": "https://dev.azure.com/Org1/"}}
        }));
        let context = RenderContext {
            project_id: Some("project-guid"),
            ..context()
        };
        for event in EventType::ALL {
            let result = formatter_for(event)(&envelope, &context);
            match event {
                // String approval ids only.
                EventType::RunStageWaitingForApproval => {
                    assert!(matches!(result, Err(RenderError::MissingField(_))), "{event}");
                }
                _ => assert_eq!(result.expect("render").message, "base", "{event}"),
            }
        }
    }

    #[test]
    fn test_unknown_event_posts_base_markdown() {
        let rendered = render_ok(serde_json::json!({
            "eventType": "tfvc.checkin",
            "detailedMessage": {"markdown": "checked in"}
        }));
        assert_eq!(rendered.message, "checked in");
        assert!(rendered.attachments.is_empty());
    }

    #[test]
    fn test_code_pushed_names_branch() {
        let rendered = render_ok(serde_json::json!({
            "eventType": "git.push",
            "resource": {
                "refUpdates": [{"name": "refs/heads/main"}],
                "commits": [{"commitId": "0123456789abcdef", "comment": "fix build", "url": "https://c"}]
            }
        }));
        assert!(rendered.message.contains("main"));
        assert!(!rendered.message.contains("refs/heads"));
        assert_eq!(
            rendered.attachments[0].text,
            "- [`01234567`](https://c) fix build"
        );
    }

    #[test]
    fn test_pull_request_fields() {
        let rendered = render_ok(serde_json::json!({
            "eventType": "git.pullrequest.created",
            "detailedMessage": {"markdown": "Alice created pull request 7"},
            "resource": {
                "pullRequestId": 7,
                "title": "Add relay",
                "sourceRefName": "refs/heads/feature",
                "targetRefName": "refs/heads/main",
                "repository": {"name": "relay", "webUrl": "https://dev.azure.com/Org1/Proj1/_git/relay"},
                "reviewers": [{"displayName": "Bob"}, {"displayName": "Carol"}]
            }
        }));
        let attachment = &rendered.attachments[0];
        assert_eq!(
            attachment.title,
            "[#7: Add relay](https://dev.azure.com/Org1/Proj1/_git/relay/pullrequest/7)"
        );
        let field = |title: &str| {
            attachment
                .fields
                .iter()
                .find(|field| field.title == title)
                .map(|field| field.value.as_str())
        };
        assert_eq!(field("Target Branch"), Some("main"));
        assert_eq!(field("Reviewers"), Some("Bob, Carol"));
    }

    #[test]
    fn test_pull_request_comment_is_quoted() {
        let rendered = render_ok(serde_json::json!({
            "eventType": "ms.vss-code.git-pullrequest-comment-event",
            "resource": {
                "comment": {"content": "looks good"},
                "pullRequest": {"pullRequestId": 7, "title": "Add relay"}
            }
        }));
        assert_eq!(rendered.attachments[0].text, "> looks good");
        assert!(rendered.attachments[0].title.starts_with("#7: Add relay"));
    }

    #[test]
    fn test_work_item_prefers_revision_fields() {
        let rendered = render_ok(serde_json::json!({
            "eventType": "workitem.updated",
            "resource": {
                "workItemId": 42,
                "fields": {"System.State": {"oldValue": "New", "newValue": "Active"}},
                "revision": {"fields": {
                    "System.WorkItemType": "Bug",
                    "System.Title": "Crash",
                    "System.State": "Active"
                }}
            }
        }));
        let attachment = &rendered.attachments[0];
        assert_eq!(attachment.title, "Bug #42: Crash");
        assert_eq!(attachment.fields[0].value, "Active");
    }

    #[test]
    fn test_build_completed_duration() {
        let rendered = render_ok(serde_json::json!({
            "eventType": "build.complete",
            "resource": {
                "buildNumber": "20240105.1",
                "result": "succeeded",
                "definition": {"name": "CI"},
                "startTime": "2024-01-05T10:00:00.1234567Z",
                "finishTime": "2024-01-05T10:01:05.1234567Z"
            }
        }));
        let attachment = &rendered.attachments[0];
        assert_eq!(attachment.title, "#20240105.1: CI");
        assert_eq!(attachment.color, COLOR_SUCCESS);
        assert!(
            attachment
                .fields
                .contains(&AttachmentField::new("Duration", "1m 5s", true))
        );
    }

    #[test]
    fn test_bad_timestamp_is_render_error() {
        for (event, resource) in [
            ("build.complete", serde_json::json!({"startTime": "yesterday"})),
            ("build.complete", serde_json::json!({})),
            (
                "ms.vss-release.release-abandoned-event",
                serde_json::json!({"release": {"modifiedOn": "05/01/2024"}}),
            ),
            ("ms.vss-release.release-created-event", serde_json::json!({})),
        ] {
            let result = render(
                &envelope(serde_json::json!({"eventType": event, "resource": resource})),
                &context(),
            );
            assert!(matches!(result, Err(RenderError::Timestamp { .. })), "{event}");
        }
    }

    #[test]
    fn test_release_approval_pending_buttons() {
        let rendered = render_ok(serde_json::json!({
            "eventType": "ms.vss-release.deployment-approval-pending-event",
            "resource": {
                "approval": {
                    "id": 12,
                    "approver": {"displayName": "Alice"},
                    "release": {"name": "Release-3"},
                    "releaseEnvironment": {"name": "Prod"}
                },
                "project": {"name": "Proj1"}
            },
            "resourceContainers": {"collection": {"baseUrl": "https://dev.azure.com/Org1/"}}
        }));
        let attachment = &rendered.attachments[0];
        assert_eq!(attachment.actions.len(), 2);
        let action = &attachment.actions[0];
        assert_eq!(
            action.integration.url,
            "https://relay.test/pipelines/release/approve"
        );
        assert_eq!(
            action.integration.context,
            serde_json::json!({
                "approvalId": 12,
                "organization": "Org1",
                "projectName": "Proj1",
                "requestType": "approved"
            })
        );
        assert!(
            attachment
                .fields
                .contains(&AttachmentField::new(STATUS_FIELD, "Pending", true))
        );
    }

    #[test]
    fn test_approval_falls_back_to_subscription_organization() {
        let envelope = envelope(serde_json::json!({
            "eventType": "ms.vss-pipelinechecks-events.approval-pending",
            "resource": {
                "approval": {
                    "id": "6f1c1a0e-approval",
                    "steps": [{"assignedApprover": {"displayName": "Alice"}, "status": "pending"}]
                },
                "projectId": "project-guid",
                "stageName": "Deploy"
            }
        }));

        let missing = render(&envelope, &context());
        assert!(matches!(missing, Err(RenderError::MissingField("organization"))));

        let context = RenderContext {
            organization: Some("Org1"),
            ..context()
        };
        let rendered = render(&envelope, &context).expect("render");
        let attachment = &rendered.attachments[0];
        assert!(attachment.text.contains("| Alice | Pending |"));
        assert_eq!(
            attachment.actions[1].integration.context,
            serde_json::json!({
                "approvalId": "6f1c1a0e-approval",
                "organization": "Org1",
                "projectId": "project-guid",
                "requestType": "rejected"
            })
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5), "5s");
        assert_eq!(format_duration(65), "1m 5s");
        assert_eq!(format_duration(3725), "1h 2m 5s");
        assert_eq!(format_duration(-3), "0s");
    }
}
