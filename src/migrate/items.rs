use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::MigrationConfig;
use crate::error::Result;
use crate::model::reference::{find_attachment_refs, rewrite_attachment_refs};
use crate::model::work_item::{fields, PatchDocument};
use crate::providers::WorkItemTracker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedItem {
    pub source_id: u32,
    pub dest_id: u32,
    pub attachments: usize,
    pub comments: usize,
}

/// Copies one source item, its pasted attachments and its comments into the
/// destination project.
pub struct ItemMigrator<'a> {
    source: &'a dyn WorkItemTracker,
    dest: &'a dyn WorkItemTracker,
    settings: &'a MigrationConfig,
}

impl<'a> ItemMigrator<'a> {
    pub fn new(
        source: &'a dyn WorkItemTracker,
        dest: &'a dyn WorkItemTracker,
        settings: &'a MigrationConfig,
    ) -> Self {
        Self {
            source,
            dest,
            settings,
        }
    }

    pub async fn migrate(&self, source_id: u32) -> Result<MigratedItem> {
        let item = self.source.get_work_item(source_id, true).await?;
        info!(
            "Transferring {source_id}: {}",
            item.field_str(fields::TITLE).unwrap_or_default()
        );

        let mut document = PatchDocument::new();
        let mut attachments = 0;

        let criteria_field = self.settings.acceptance_criteria_field.as_str();
        if let Some(criteria) = item.field_str(criteria_field) {
            let (rewritten, copied) = self.rehome_attachments(source_id, criteria).await?;
            document.add_field(criteria_field, Value::String(rewritten));
            attachments = copied;
        }

        for name in &self.settings.copy_fields {
            if name == criteria_field {
                continue;
            }
            match item.field(name) {
                Some(value) => document.add_field(name, value.clone()),
                None => debug!("{source_id} has no {name}, not copying"),
            }
        }

        let work_item_type = item.work_item_type()?;
        let created = self.dest.create_work_item(work_item_type, &document).await?;
        info!("Created {} {} from {source_id}", work_item_type, created.id);

        if self.settings.copy_state {
            if let Some(state) = item.field(fields::STATE) {
                let mut update = PatchDocument::new();
                update.add_field(fields::STATE, state.clone());
                self.dest.update_work_item(created.id, &update).await?;
            }
        }

        let comments = self.source.get_comments(source_id).await?;
        for comment in &comments {
            self.dest
                .add_comment(created.id, &comment.flattened())
                .await?;
        }
        if !comments.is_empty() {
            info!("Copied {} comments to {}", comments.len(), created.id);
        }

        Ok(MigratedItem {
            source_id,
            dest_id: created.id,
            attachments,
            comments: comments.len(),
        })
    }

    /// Re-upload every attachment referenced from `text` to the destination
    /// and point the references at the new copies. Returns the rewritten text
    /// and the number of attachments copied.
    ///
    /// An attachment referenced several times is copied once.
    pub async fn rehome_attachments(
        &self,
        source_id: u32,
        text: &str,
    ) -> Result<(String, usize)> {
        let matches = find_attachment_refs(text, self.source.project());
        let mut moved: HashMap<Uuid, Uuid> = HashMap::new();

        for m in &matches {
            if moved.contains_key(&m.id) {
                continue;
            }
            info!("{source_id} has pasted attachment {}. Copying to new project", m.id);
            let content = self.source.get_attachment(m.id).await?;
            let created = self
                .dest
                .create_attachment(content, &self.settings.attachment_file_name)
                .await?;
            info!("Created attachment {} at {}", created.id, created.url);
            moved.insert(m.id, created.id);
        }

        let rewritten = rewrite_attachment_refs(
            text,
            &matches,
            self.source.project(),
            self.dest.project(),
            |id| moved.get(id).copied(),
        );
        Ok((rewritten, moved.len()))
    }
}
