use tracing::info;

use crate::error::Result;
use crate::model::work_item::fields;
use crate::providers::WorkItemTracker;

/// Quote a WIQL string literal.
fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn items_of_type(project: &str, work_item_type: &str) -> String {
    format!(
        "SELECT [System.Id] FROM WorkItems WHERE [System.TeamProject] = {} AND [{}] = {}",
        literal(project),
        fields::WORK_ITEM_TYPE,
        literal(work_item_type)
    )
}

pub fn items_titled(project: &str, title: &str) -> String {
    format!(
        "SELECT [System.Id] FROM WorkItems WHERE [System.TeamProject] = {} AND [{}] = {}",
        literal(project),
        fields::TITLE,
        literal(title)
    )
}

/// Ids of the source items of `work_item_type`, in the order the service
/// returns them. Results the service truncates are not fetched.
pub async fn enumerate(source: &dyn WorkItemTracker, work_item_type: &str) -> Result<Vec<u32>> {
    let wiql = items_of_type(&source.project().project, work_item_type);
    let ids = source.query_ids(&wiql).await?;
    info!("Found {} '{}' items in {}", ids.len(), work_item_type, source.name());
    Ok(ids)
}
