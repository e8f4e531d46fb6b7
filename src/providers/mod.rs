pub mod azure;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::ProjectConfig;
use crate::error::Result;
use crate::model::work_item::{
    AttachmentContent, AttachmentRef, Comment, PatchDocument, WorkItemRecord,
};

/// Work item tracking operations scoped to a single organization/project.
#[async_trait]
pub trait WorkItemTracker: Send + Sync {
    fn project(&self) -> &ProjectConfig;

    /// `organization/project`, for log lines.
    fn name(&self) -> String {
        let project = self.project();
        format!("{}/{}", project.organization, project.project)
    }

    /// Run a WIQL query, returning matching ids in service order.
    async fn query_ids(&self, wiql: &str) -> Result<Vec<u32>>;

    async fn get_work_item(&self, id: u32, expand_relations: bool) -> Result<WorkItemRecord>;

    /// All comments on an item, oldest first.
    async fn get_comments(&self, id: u32) -> Result<Vec<Comment>>;

    async fn add_comment(&self, id: u32, text: &str) -> Result<()>;

    async fn get_attachment(&self, id: Uuid) -> Result<AttachmentContent>;

    async fn create_attachment(
        &self,
        content: AttachmentContent,
        file_name: &str,
    ) -> Result<AttachmentRef>;

    async fn create_work_item(
        &self,
        work_item_type: &str,
        document: &PatchDocument,
    ) -> Result<WorkItemRecord>;

    async fn update_work_item(&self, id: u32, document: &PatchDocument)
        -> Result<WorkItemRecord>;
}

#[cfg(test)]
pub mod mock;

pub fn create_tracker(project: &ProjectConfig) -> Box<dyn WorkItemTracker> {
    Box::new(azure::AzureDevOpsClient::new(project.clone()))
}
