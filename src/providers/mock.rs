use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use super::WorkItemTracker;
use crate::config::ProjectConfig;
use crate::error::{Result, TransferError};
use crate::model::work_item::{
    fields, AttachmentContent, AttachmentRef, Comment, IdentityRef, PatchDocument, Relation,
    WorkItemRecord,
};

#[derive(Default)]
pub struct MockState {
    pub items: BTreeMap<u32, WorkItemRecord>,
    pub comments: HashMap<u32, Vec<Comment>>,
    pub attachments: HashMap<Uuid, AttachmentContent>,
    pub next_id: u32,
    pub queries: Vec<String>,
    pub uploads: usize,
    pub updates: Vec<(u32, PatchDocument)>,
    /// Creates of items with these titles answer 400
    pub reject_titles: HashSet<String>,
    /// Every call answers with this status
    pub fail_status: Option<u16>,
}

/// In-memory tracker for one project.
#[derive(Clone)]
pub struct MockTracker {
    project: ProjectConfig,
    pub state: Arc<Mutex<MockState>>,
}

impl MockTracker {
    pub fn new(project: ProjectConfig, first_id: u32) -> Self {
        let state = MockState {
            next_id: first_id,
            ..MockState::default()
        };
        Self {
            project,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn insert(&self, item: WorkItemRecord) {
        self.state.lock().unwrap().items.insert(item.id, item);
    }

    pub fn insert_comment(&self, id: u32, author: &str, text: &str) {
        let mut state = self.state.lock().unwrap();
        let list = state.comments.entry(id).or_default();
        let created_date = Utc.with_ymd_and_hms(2024, 3, 14, 10, list.len() as u32, 0).unwrap();
        list.push(Comment {
            text: text.into(),
            created_by: IdentityRef {
                display_name: author.into(),
            },
            created_date,
        });
    }

    pub fn insert_attachment(&self, id: Uuid, bytes: &[u8]) {
        self.state.lock().unwrap().attachments.insert(
            id,
            AttachmentContent {
                bytes: bytes.to_vec(),
                content_type: Some("image/png".into()),
            },
        );
    }

    pub fn item(&self, id: u32) -> Option<WorkItemRecord> {
        self.state.lock().unwrap().items.get(&id).cloned()
    }

    pub fn items_titled(&self, title: &str) -> Vec<WorkItemRecord> {
        self.state
            .lock()
            .unwrap()
            .items
            .values()
            .filter(|i| i.field_str(fields::TITLE) == Some(title))
            .cloned()
            .collect()
    }

    pub fn comments(&self, id: u32) -> Vec<Comment> {
        self.state
            .lock()
            .unwrap()
            .comments
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn attachment(&self, id: &Uuid) -> Option<AttachmentContent> {
        self.state.lock().unwrap().attachments.get(id).cloned()
    }

    fn check(&self, context: &str) -> Result<()> {
        match self.state.lock().unwrap().fail_status {
            Some(status) => Err(TransferError::api(context, status, "mock failure")),
            None => Ok(()),
        }
    }
}

/// Build a record with the given fields and relations.
pub fn record(id: u32, fields: &[(&str, &str)], relations: &[(&str, String)]) -> WorkItemRecord {
    WorkItemRecord {
        id,
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect(),
        relations: relations
            .iter()
            .map(|(rel, url)| Relation {
                rel: rel.to_string(),
                url: url.clone(),
                attributes: Default::default(),
            })
            .collect(),
    }
}

pub fn project(org: &str, name: &str, project_id: &str) -> ProjectConfig {
    ProjectConfig {
        organization: org.into(),
        project: name.into(),
        project_id: project_id.into(),
        username: String::new(),
        pat: "pat".into(),
        base_url: "https://dev.azure.com".into(),
    }
}

/// Value of a `[field] = 'literal'` clause, with doubled quotes undone.
fn wiql_literal(wiql: &str, field: &str) -> Option<String> {
    let clause = format!("[{field}] = '");
    let start = wiql.find(&clause)? + clause.len();
    let rest = &wiql[start..];
    let mut value = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
                value.push('\'');
            } else {
                return Some(value);
            }
        } else {
            value.push(c);
        }
    }
    None
}

fn apply(item: &mut WorkItemRecord, document: &PatchDocument) {
    for op in document.operations() {
        if let Some(name) = op.path.strip_prefix("/fields/") {
            item.fields.insert(name.to_string(), op.value.clone());
        } else if op.path == "/relations/-" {
            item.relations.push(Relation {
                rel: op.value["rel"].as_str().unwrap_or_default().to_string(),
                url: op.value["url"].as_str().unwrap_or_default().to_string(),
                attributes: Default::default(),
            });
        }
    }
}

#[async_trait]
impl WorkItemTracker for MockTracker {
    fn project(&self) -> &ProjectConfig {
        &self.project
    }

    async fn query_ids(&self, wiql: &str) -> Result<Vec<u32>> {
        self.check("WIQL query")?;
        let mut state = self.state.lock().unwrap();
        state.queries.push(wiql.to_string());

        let filters: Vec<(&str, String)> = [fields::WORK_ITEM_TYPE, fields::TITLE]
            .into_iter()
            .filter_map(|f| wiql_literal(wiql, f).map(|v| (f, v)))
            .collect();

        Ok(state
            .items
            .values()
            .filter(|item| {
                filters
                    .iter()
                    .all(|(f, v)| item.field_str(f) == Some(v.as_str()))
            })
            .map(|item| item.id)
            .collect())
    }

    async fn get_work_item(&self, id: u32, expand_relations: bool) -> Result<WorkItemRecord> {
        let context = format!("get work item {id}");
        self.check(&context)?;
        let mut item = self
            .item(id)
            .ok_or_else(|| TransferError::api(&context, 404, "not found"))?;
        if !expand_relations {
            item.relations.clear();
        }
        Ok(item)
    }

    async fn get_comments(&self, id: u32) -> Result<Vec<Comment>> {
        self.check("get comments")?;
        Ok(self.comments(id))
    }

    async fn add_comment(&self, id: u32, text: &str) -> Result<()> {
        self.check("add comment")?;
        let mut state = self.state.lock().unwrap();
        if !state.items.contains_key(&id) {
            return Err(TransferError::api("add comment", 404, "not found"));
        }
        state.comments.entry(id).or_default().push(Comment {
            text: text.into(),
            created_by: IdentityRef {
                display_name: "Migration Bot".into(),
            },
            created_date: Utc::now(),
        });
        Ok(())
    }

    async fn get_attachment(&self, id: Uuid) -> Result<AttachmentContent> {
        self.check("download attachment")?;
        self.attachment(&id)
            .ok_or_else(|| TransferError::api("download attachment", 404, "not found"))
    }

    async fn create_attachment(
        &self,
        content: AttachmentContent,
        _file_name: &str,
    ) -> Result<AttachmentRef> {
        self.check("upload attachment")?;
        let id = Uuid::new_v4();
        let mut state = self.state.lock().unwrap();
        state.uploads += 1;
        state.attachments.insert(id, content);
        Ok(AttachmentRef {
            id,
            url: format!("{}{id}", self.project.attachments_prefix()),
        })
    }

    async fn create_work_item(
        &self,
        work_item_type: &str,
        document: &PatchDocument,
    ) -> Result<WorkItemRecord> {
        self.check("create work item")?;
        let mut state = self.state.lock().unwrap();
        let title = document
            .field_value(fields::TITLE)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if state.reject_titles.contains(&title) {
            return Err(TransferError::api(
                format!("create {work_item_type}"),
                400,
                "rejected",
            ));
        }

        let id = state.next_id;
        state.next_id += 1;
        let mut item = WorkItemRecord {
            id,
            fields: Default::default(),
            relations: Vec::new(),
        };
        apply(&mut item, document);
        item.fields
            .insert(fields::WORK_ITEM_TYPE.into(), json!(work_item_type));
        item.fields
            .entry(fields::STATE.to_string())
            .or_insert_with(|| json!("New"));
        state.items.insert(id, item.clone());
        Ok(item)
    }

    async fn update_work_item(
        &self,
        id: u32,
        document: &PatchDocument,
    ) -> Result<WorkItemRecord> {
        self.check("update work item")?;
        let mut state = self.state.lock().unwrap();
        let item = state
            .items
            .get_mut(&id)
            .ok_or_else(|| TransferError::api("update work item", 404, "not found"))?;
        apply(item, document);
        let updated = item.clone();
        state.updates.push((id, document.clone()));
        Ok(updated)
    }
}

#[test]
fn wiql_literal_unescapes_quotes() {
    let wiql = "SELECT [System.Id] FROM WorkItems WHERE [System.Title] = 'Don''t crash' AND x";
    assert_eq!(
        wiql_literal(wiql, fields::TITLE).as_deref(),
        Some("Don't crash")
    );
    assert_eq!(wiql_literal(wiql, fields::WORK_ITEM_TYPE), None);
}

#[tokio::test]
async fn mock_creates_items_in_new_state() {
    let tracker = MockTracker::new(project("org2", "Project Two", "proj2id"), 500);
    let mut doc = PatchDocument::new();
    doc.add_field(fields::TITLE, json!("A"));
    let created = tracker.create_work_item("Bug", &doc).await.unwrap();
    assert_eq!(created.id, 500);
    assert_eq!(created.field_str(fields::STATE), Some("New"));
    assert_eq!(created.work_item_type().unwrap(), "Bug");
}
