use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, TransferError};

/// Reference names of the fields the transfer reads or writes.
pub mod fields {
    pub const WORK_ITEM_TYPE: &str = "System.WorkItemType";
    pub const TITLE: &str = "System.Title";
    pub const DESCRIPTION: &str = "System.Description";
    pub const TAGS: &str = "System.Tags";
    pub const STATE: &str = "System.State";
    pub const ACCEPTANCE_CRITERIA: &str = "Microsoft.VSTS.Common.AcceptanceCriteria";
}

pub mod relation_kinds {
    pub const ATTACHED_FILE: &str = "AttachedFile";
    /// Points from a child at its parent
    pub const PARENT: &str = "System.LinkTypes.Hierarchy-Reverse";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkItemRecord {
    pub id: u32,
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Only populated when fetched with relations expanded
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl WorkItemRecord {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    fn required_str(&self, name: &str) -> Result<&str> {
        self.field_str(name).ok_or_else(|| TransferError::MissingField {
            id: self.id,
            field: name.to_string(),
        })
    }

    pub fn title(&self) -> Result<&str> {
        self.required_str(fields::TITLE)
    }

    pub fn work_item_type(&self) -> Result<&str> {
        self.required_str(fields::WORK_ITEM_TYPE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    pub rel: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub text: String,
    pub created_by: IdentityRef,
    pub created_date: DateTime<Utc>,
}

impl Comment {
    /// The destination attributes new comments to the caller, so the original
    /// author and date are folded into the text.
    pub fn flattened(&self) -> String {
        format!(
            "{} {}: {}",
            self.created_date.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.created_by.display_name,
            self.text
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentContent {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentRef {
    pub id: Uuid,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: Value,
}

/// Ordered edit operations submitted together on create or update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PatchDocument(Vec<PatchOperation>);

impl PatchDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, name: &str, value: Value) {
        self.0.push(PatchOperation {
            op: PatchOp::Add,
            path: format!("/fields/{name}"),
            value,
        });
    }

    pub fn add_relation(&mut self, rel: &str, url: &str) {
        self.0.push(PatchOperation {
            op: PatchOp::Add,
            path: "/relations/-".into(),
            value: serde_json::json!({ "rel": rel, "url": url }),
        });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }

    /// Value staged for a field, if any.
    #[cfg(test)]
    pub fn field_value(&self, name: &str) -> Option<&Value> {
        let path = format!("/fields/{name}");
        self.0.iter().find(|op| op.path == path).map(|op| &op.value)
    }
}
