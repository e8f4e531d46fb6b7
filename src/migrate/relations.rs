use tracing::{info, warn};

use super::identity::{IdentityMap, Resolver};
use crate::error::{Result, TransferError};
use crate::model::reference::ResourceUrl;
use crate::model::work_item::{relation_kinds, PatchDocument, Relation};
use crate::providers::WorkItemTracker;

/// Second pass: re-creates parent links once every item exists in the
/// destination.
pub struct RelationLinker<'a> {
    source: &'a dyn WorkItemTracker,
    dest: &'a dyn WorkItemTracker,
    resolver: Resolver<'a>,
}

impl<'a> RelationLinker<'a> {
    pub fn new(
        source: &'a dyn WorkItemTracker,
        dest: &'a dyn WorkItemTracker,
        map: &'a IdentityMap,
    ) -> Self {
        Self {
            source,
            dest,
            resolver: Resolver::new(source, dest, map),
        }
    }

    /// Add the destination counterparts of `source_id`'s parent links.
    /// Returns how many relations were added; nothing is submitted when
    /// there are none.
    pub async fn link(&self, source_id: u32) -> Result<usize> {
        let item = self.source.get_work_item(source_id, true).await?;
        info!("Adding relationships for {source_id}");

        let mut document = PatchDocument::new();
        for relation in &item.relations {
            match relation.rel.as_str() {
                relation_kinds::ATTACHED_FILE => {
                    warn!("Manually transfer attachments for {source_id}");
                }
                relation_kinds::PARENT => {
                    let url = self.parent_url(relation).await?;
                    document.add_relation(&relation.rel, &url);
                }
                _ => {}
            }
        }

        if document.is_empty() {
            info!("No relations to add");
            return Ok(0);
        }

        let dest_id = self.resolver.resolve_record(&item).await?;
        self.dest.update_work_item(dest_id, &document).await?;
        info!("Linked {dest_id} ({} relations)", document.len());
        Ok(document.len())
    }

    /// The relation url re-pointed at the destination copy of the parent.
    async fn parent_url(&self, relation: &Relation) -> Result<String> {
        let url = ResourceUrl::parse(&relation.url)?;
        let parent_id = url
            .work_item_id()
            .ok_or_else(|| TransferError::InvalidUrl(relation.url.clone()))?;
        let dest_parent = self.resolver.resolve(parent_id).await?;
        Ok(url.retarget(self.dest.project(), dest_parent.to_string()).to_string())
    }
}
