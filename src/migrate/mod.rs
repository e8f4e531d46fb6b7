//! Two-phase transfer of work items between projects.
//!
//! Phase 1 creates every enumerated item in the destination. Phase 2 only
//! starts once phase 1 has finished, so every parent a child links to
//! already exists when links are added.

pub mod enumerate;
pub mod identity;
pub mod items;
pub mod relations;

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, error, info};

use crate::config::{FailurePolicy, MigrationConfig};
use crate::error::{Result, TransferError};
use crate::providers::WorkItemTracker;
use identity::IdentityMap;
use items::ItemMigrator;
use relations::RelationLinker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Create,
    Link,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Create => write!(f, "create"),
            Phase::Link => write!(f, "link"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub source_id: u32,
    pub phase: Phase,
    pub error: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub created: usize,
    pub attachments: usize,
    pub comments: usize,
    pub linked: usize,
    pub relations: usize,
    pub failures: Vec<ItemFailure>,
}

impl MigrationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Migration<'a> {
    source: &'a dyn WorkItemTracker,
    dest: &'a dyn WorkItemTracker,
    settings: &'a MigrationConfig,
}

impl<'a> Migration<'a> {
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

    /// Create every item in `ids`, then link them if `link` is set.
    pub async fn run(&self, ids: &[u32], link: bool) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();
        let mut map = IdentityMap::default();
        let mut not_created = HashSet::new();

        info!(
            "Starting work item transfer from {} to {}",
            self.source.name(),
            self.dest.name()
        );
        let migrator = ItemMigrator::new(self.source, self.dest, self.settings);
        for &id in ids {
            match migrator.migrate(id).await {
                Ok(item) => {
                    map.insert(item.source_id, item.dest_id);
                    report.created += 1;
                    report.attachments += item.attachments;
                    report.comments += item.comments;
                }
                Err(e) => {
                    self.record_failure(&mut report, id, Phase::Create, e)?;
                    not_created.insert(id);
                }
            }
        }

        if link {
            self.link_all(ids, &map, &not_created, &mut report).await?;
        }
        Ok(report)
    }

    /// Phase 2 on its own, for items created by an earlier run. Destination
    /// ids are found by title.
    pub async fn link_only(&self, ids: &[u32]) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();
        self.link_all(ids, &IdentityMap::default(), &HashSet::new(), &mut report)
            .await?;
        Ok(report)
    }

    /// Items in `skip` failed to create and have no destination copy of
    /// their own, so they are left out.
    async fn link_all(
        &self,
        ids: &[u32],
        map: &IdentityMap,
        skip: &HashSet<u32>,
        report: &mut MigrationReport,
    ) -> Result<()> {
        info!("Creating Parent/Child relationships");
        let linker = RelationLinker::new(self.source, self.dest, map);
        for &id in ids {
            if skip.contains(&id) {
                debug!("{id} was not created, not linking");
                continue;
            }
            match linker.link(id).await {
                Ok(0) => {}
                Ok(added) => {
                    report.linked += 1;
                    report.relations += added;
                }
                Err(e) => self.record_failure(report, id, Phase::Link, e)?,
            }
        }
        Ok(())
    }

    fn record_failure(
        &self,
        report: &mut MigrationReport,
        source_id: u32,
        phase: Phase,
        err: TransferError,
    ) -> Result<()> {
        if err.is_fatal() || self.settings.on_item_error == FailurePolicy::Abort {
            return Err(err);
        }
        error!("Failed to {phase} {source_id}: {err}");
        report.failures.push(ItemFailure {
            source_id,
            phase,
            error: err.to_string(),
        });
        Ok(())
    }
}
