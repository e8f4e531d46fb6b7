use std::collections::HashMap;

use tracing::debug;

use super::enumerate::items_titled;
use crate::error::{Result, TransferError};
use crate::model::work_item::WorkItemRecord;
use crate::providers::WorkItemTracker;

/// Source id to destination id, filled as items are created.
#[derive(Debug, Default, Clone)]
pub struct IdentityMap {
    ids: HashMap<u32, u32>,
}

impl IdentityMap {
    pub fn insert(&mut self, source_id: u32, dest_id: u32) {
        self.ids.insert(source_id, dest_id);
    }

    pub fn get(&self, source_id: u32) -> Option<u32> {
        self.ids.get(&source_id).copied()
    }
}

/// First destination item whose title equals `title` exactly.
///
/// Titles are not unique; when several items match, whichever the service
/// lists first wins.
pub async fn find_by_title(dest: &dyn WorkItemTracker, title: &str) -> Result<u32> {
    let wiql = items_titled(&dest.project().project, title);
    let ids = dest.query_ids(&wiql).await?;
    if ids.len() > 1 {
        debug!("{} items titled '{title}', using {}", ids.len(), ids[0]);
    }
    ids.first().copied().ok_or_else(|| TransferError::TitleNotFound {
        title: title.to_string(),
        project: dest.name(),
    })
}

/// Finds the destination copy of a source item, from the identity map when
/// it was created in this run and by title otherwise.
pub struct Resolver<'a> {
    source: &'a dyn WorkItemTracker,
    dest: &'a dyn WorkItemTracker,
    map: &'a IdentityMap,
}

impl<'a> Resolver<'a> {
    pub fn new(
        source: &'a dyn WorkItemTracker,
        dest: &'a dyn WorkItemTracker,
        map: &'a IdentityMap,
    ) -> Self {
        Self { source, dest, map }
    }

    pub async fn resolve(&self, source_id: u32) -> Result<u32> {
        if let Some(id) = self.map.get(source_id) {
            return Ok(id);
        }
        let item = self.source.get_work_item(source_id, false).await?;
        find_by_title(self.dest, item.title()?).await
    }

    /// Like [`Resolver::resolve`] for a record already fetched.
    pub async fn resolve_record(&self, item: &WorkItemRecord) -> Result<u32> {
        match self.map.get(item.id) {
            Some(id) => Ok(id),
            None => find_by_title(self.dest, item.title()?).await,
        }
    }
}
