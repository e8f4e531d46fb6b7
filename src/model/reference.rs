//! Typed view of the resource URLs the tracking service embeds in relations
//! and rich-text fields.
//!
//! URLs have the shape `{base}/{organization}[/{project}]/_apis/wit/{kind}/{id}`.
//! Older `{organization}.visualstudio.com` hosts carry the organization in the
//! host name and have no organization segment.
//! Moving a reference to another project means swapping the base,
//! organization, project and id parts while leaving the rest intact, so each
//! URL is parsed once into a [`ResourceUrl`], re-targeted and serialized back.

use std::fmt;
use std::ops::Range;

use tracing::debug;
use uuid::Uuid;

use crate::config::ProjectConfig;
use crate::error::{Result, TransferError};

/// Textual length of a hyphenated attachment GUID.
pub const ATTACHMENT_ID_LEN: usize = 36;

const WIT_ROUTE: &str = "/_apis/wit/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Attachment,
    WorkItem,
}

impl ResourceKind {
    fn segment(self) -> &'static str {
        match self {
            ResourceKind::Attachment => "attachments",
            ResourceKind::WorkItem => "workItems",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        if segment.eq_ignore_ascii_case("attachments") {
            Some(ResourceKind::Attachment)
        } else if segment.eq_ignore_ascii_case("workitems") {
            Some(ResourceKind::WorkItem)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUrl {
    pub base: String,
    /// `None` when the organization is part of the host name
    pub organization: Option<String>,
    pub project: Option<String>,
    pub kind: ResourceKind,
    pub id: String,
    /// Anything after `?`, kept verbatim
    pub query: Option<String>,
}

impl ResourceUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || TransferError::InvalidUrl(url.to_string());

        let (head, tail) = url.split_once(WIT_ROUTE).ok_or_else(invalid)?;
        let (kind, rest) = tail.split_once('/').ok_or_else(invalid)?;
        let kind = ResourceKind::from_segment(kind).ok_or_else(invalid)?;
        let (id, query) = match rest.split_once('?') {
            Some((id, query)) => (id, Some(query.to_string())),
            None => (rest, None),
        };
        if id.is_empty() || id.contains('/') {
            return Err(invalid());
        }

        let host_start = head.find("://").ok_or_else(invalid)? + 3;
        let path_start = head[host_start..]
            .find('/')
            .map_or(head.len(), |i| host_start + i);
        if path_start == host_start {
            return Err(invalid());
        }
        let base = &head[..path_start];
        let segments: Vec<&str> = head[path_start..]
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let (organization, project) = match segments.as_slice() {
            [] if base.ends_with(".visualstudio.com") => (None, None),
            [org] => (Some(org.to_string()), None),
            [org, project] => (Some(org.to_string()), Some(project.to_string())),
            _ => return Err(invalid()),
        };

        Ok(Self {
            base: base.to_string(),
            organization,
            project,
            kind,
            id: id.to_string(),
            query,
        })
    }

    /// Same resource path under the destination organization and project,
    /// pointing at `id`. A project segment is only emitted when the original
    /// carried one.
    pub fn retarget(&self, dest: &ProjectConfig, id: impl Into<String>) -> Self {
        Self {
            base: dest.base_url().to_string(),
            organization: Some(dest.organization.clone()),
            project: self.project.as_ref().map(|_| dest.project_id.clone()),
            kind: self.kind,
            id: id.into(),
            query: self.query.clone(),
        }
    }

    pub fn work_item_id(&self) -> Option<u32> {
        match self.kind {
            ResourceKind::WorkItem => self.id.parse().ok(),
            ResourceKind::Attachment => None,
        }
    }
}

impl fmt::Display for ResourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        if let Some(organization) = &self.organization {
            write!(f, "/{organization}")?;
        }
        if let Some(project) = &self.project {
            write!(f, "/{project}")?;
        }
        write!(f, "{WIT_ROUTE}{}/{}", self.kind.segment(), self.id)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

/// One attachment URL found inside rich text.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentMatch {
    /// Byte range of the URL up to and including the identifier
    pub span: Range<usize>,
    pub id: Uuid,
    pub url: ResourceUrl,
}

/// Find every `{project attachments prefix}{36-char id}` occurrence in `text`.
///
/// Every occurrence is reported, duplicates included. Tokens cut short by the
/// end of the text, or that are not GUIDs, are skipped.
pub fn find_attachment_refs(text: &str, project: &ProjectConfig) -> Vec<AttachmentMatch> {
    let prefix = project.attachments_prefix();
    let mut matches = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(&prefix) {
        let start = cursor + offset;
        let token_start = start + prefix.len();
        let token_end = token_start + ATTACHMENT_ID_LEN;

        let Some(token) = text.get(token_start..token_end) else {
            debug!("Attachment reference at byte {start} is truncated, skipping");
            cursor = token_start;
            continue;
        };
        match Uuid::parse_str(token) {
            Ok(id) => {
                matches.push(AttachmentMatch {
                    span: start..token_end,
                    id,
                    url: ResourceUrl {
                        base: project.base_url().to_string(),
                        organization: Some(project.organization.clone()),
                        project: Some(project.project_id.clone()),
                        kind: ResourceKind::Attachment,
                        id: token.to_string(),
                        query: None,
                    },
                });
                cursor = token_end;
            }
            Err(_) => {
                debug!("'{token}' is not an attachment id, skipping");
                cursor = token_start;
            }
        }
    }

    matches
}

/// Replace each matched reference with its destination form, using the id
/// `new_id` yields for it. Every other occurrence of a replaced id is swapped
/// too, so relative or differently prefixed links to the same attachment
/// follow. Remaining source attachment paths are then moved over to the
/// destination project.
pub fn rewrite_attachment_refs(
    text: &str,
    matches: &[AttachmentMatch],
    source: &ProjectConfig,
    dest: &ProjectConfig,
    new_id: impl Fn(&Uuid) -> Option<Uuid>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut swapped: Vec<(String, String)> = Vec::new();

    for m in matches {
        out.push_str(&text[last..m.span.start]);
        let id = match new_id(&m.id) {
            Some(id) => {
                let id = id.to_string();
                // As written in the text, and in canonical lowercase form
                swapped.push((m.url.id.clone(), id.clone()));
                swapped.push((m.id.to_string(), id.clone()));
                id
            }
            None => m.url.id.clone(),
        };
        out.push_str(&m.url.retarget(dest, id).to_string());
        last = m.span.end;
    }
    out.push_str(&text[last..]);

    for (old, new) in &swapped {
        if out.contains(old.as_str()) {
            out = out.replace(old.as_str(), new);
        }
    }

    out.replace(&source.attachments_path(), &dest.attachments_path())
}
