//! Previews for Azure DevOps links pasted into a channel.
//!
//! Recognized links:
//!
//! ```text
//! {org}/{project}/_workitems/edit/{id}
//! {org}/{project}/_git/{repo}/pullrequest/{id}
//! {org}/{project}/_build/results?buildId={id}
//! {org}/{project}/_releaseProgress?releaseId={id}
//! ```

use std::borrow::Cow;

use url::Url;

use super::formatters::{branch_name, push_field, result_color};
use crate::chat::Attachment;
use crate::devops::{Build, PullRequest, Release, WorkItem};

/// The resource a pasted link names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    WorkItem {
        organization: String,
        project: String,
        id: i64,
    },
    PullRequest {
        organization: String,
        project: String,
        repository: String,
        id: i64,
    },
    Build {
        organization: String,
        project: String,
        id: i64,
    },
    Release {
        organization: String,
        project: String,
        id: i64,
    },
}

/// A recognized link as pasted, with its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewLink {
    pub url: String,
    pub target: LinkTarget,
}

/// First link in `message` on `host`'s origin that names a previewable
/// resource.
#[must_use]
pub fn find_link(message: &str, host: &Url) -> Option<PreviewLink> {
    message
        .split(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '(' | ')' | '[' | ']' | '"'))
        .map(|word| word.trim_end_matches(['.', ',', ';', '!']))
        .filter(|word| !word.is_empty())
        .filter_map(|word| Url::parse(word).ok())
        .filter(|url| url.host_str() == host.host_str())
        .filter(|url| url.port_or_known_default() == host.port_or_known_default())
        .find_map(|url| {
            parse_target(&url).map(|target| PreviewLink {
                url: url.to_string(),
                target,
            })
        })
}

fn parse_target(url: &Url) -> Option<LinkTarget> {
    let segments = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::decode(segment).ok().map(Cow::into_owned))
        .collect::<Option<Vec<String>>>()?;
    let parts: Vec<&str> = segments.iter().map(String::as_str).collect();

    match parts.as_slice() {
        [organization, project, "_workitems", "edit", id] => Some(LinkTarget::WorkItem {
            organization: (*organization).to_string(),
            project: (*project).to_string(),
            id: id.parse().ok()?,
        }),
        [organization, project, "_git", repository, "pullrequest", id] => {
            Some(LinkTarget::PullRequest {
                organization: (*organization).to_string(),
                project: (*project).to_string(),
                repository: (*repository).to_string(),
                id: id.parse().ok()?,
            })
        }
        [organization, project, "_build", "results"] => Some(LinkTarget::Build {
            organization: (*organization).to_string(),
            project: (*project).to_string(),
            id: query_id(url, "buildId")?,
        }),
        [organization, project, "_releaseProgress" | "_release"] => Some(LinkTarget::Release {
            organization: (*organization).to_string(),
            project: (*project).to_string(),
            id: query_id(url, "releaseId")?,
        }),
        _ => None,
    }
}

fn query_id(url: &Url, name: &str) -> Option<i64> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .and_then(|(_, value)| value.parse().ok())
}

#[must_use]
pub fn work_item_attachment(item: &WorkItem, link: &str) -> Attachment {
    let fields = &item.fields;
    let title = format!("{} #{}: {}", fields.work_item_type, item.id, fields.title);
    let mut attachment_fields = Vec::new();
    push_field(&mut attachment_fields, "State", Some(fields.state.as_str()));
    push_field(&mut attachment_fields, "Area Path", Some(fields.area_path.as_str()));
    push_field(
        &mut attachment_fields,
        "Assigned To",
        fields.assigned_to.as_ref().map(|a| a.display_name.as_str()),
    );
    Attachment {
        fallback: title.clone(),
        color: result_color(None).to_string(),
        title: format!("[{title}]({link})"),
        fields: attachment_fields,
        ..Attachment::default()
    }
}

#[must_use]
pub fn pull_request_attachment(pr: &PullRequest, link: &str) -> Attachment {
    let title = format!("#{}: {}", pr.pull_request_id, pr.title);
    let reviewers = pr
        .reviewers
        .iter()
        .map(|reviewer| reviewer.display_name.as_str())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let mut fields = Vec::new();
    push_field(&mut fields, "Repository", Some(pr.repository.name.as_str()));
    push_field(&mut fields, "Source Branch", Some(branch_name(&pr.source_ref_name)));
    push_field(&mut fields, "Target Branch", Some(branch_name(&pr.target_ref_name)));
    push_field(&mut fields, "Merge Status", Some(pr.merge_status.as_str()));
    push_field(&mut fields, "Reviewers", Some(reviewers));
    Attachment {
        fallback: title.clone(),
        color: result_color(None).to_string(),
        title: format!("[{title}]({link})"),
        text: pr.description.clone(),
        fields,
        ..Attachment::default()
    }
}

#[must_use]
pub fn build_attachment(build: &Build, link: &str) -> Attachment {
    let status = if build.result.is_empty() {
        build.status.as_str()
    } else {
        build.result.as_str()
    };
    let mut fields = Vec::new();
    push_field(&mut fields, "Repository", Some(build.repository.name.as_str()));
    push_field(&mut fields, "Branch", Some(branch_name(&build.source_branch)));
    push_field(&mut fields, "Status", Some(status));
    push_field(&mut fields, "Requested By", Some(build.requested_by.display_name.as_str()));
    Attachment {
        fallback: format!("#{}: {}", build.build_number, build.definition.name),
        color: result_color(Some(status)).to_string(),
        title: format!("[#{}]({link}): {}", build.build_number, build.definition.name),
        fields,
        ..Attachment::default()
    }
}

#[must_use]
pub fn release_attachment(release: &Release, link: &str) -> Attachment {
    let stages = release
        .environments
        .iter()
        .map(|stage| stage.name.as_str())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let mut fields = Vec::new();
    push_field(&mut fields, "Status", Some(release.status.as_str()));
    push_field(&mut fields, "Stages", Some(stages));
    Attachment {
        fallback: format!("{}: {}", release.name, release.release_definition.name),
        color: result_color(Some(release.status.as_str())).to_string(),
        title: format!("[{}]({link}): {}", release.name, release.release_definition.name),
        fields,
        ..Attachment::default()
    }
}
