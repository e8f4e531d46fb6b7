use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use super::WorkItemTracker;
use crate::config::ProjectConfig;
use crate::error::{Result, TransferError};
use crate::model::work_item::{
    AttachmentContent, AttachmentRef, Comment, PatchDocument, WorkItemRecord,
};

const API_VERSION: &str = "7.1";
const COMMENTS_API_VERSION: &str = "7.1-preview.4";
const JSON_PATCH: &str = "application/json-patch+json";
const OCTET_STREAM: &str = "application/octet-stream";

/// REST client for the Azure DevOps work item tracking API.
pub struct AzureDevOpsClient {
    project: ProjectConfig,
    auth_header: String,
    client: reqwest::Client,
}

impl AzureDevOpsClient {
    pub fn new(project: ProjectConfig) -> Self {
        let creds = format!("{}:{}", project.username, project.pat);
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        Self {
            project,
            auth_header: format!("Basic {encoded}"),
            client: reqwest::Client::new(),
        }
    }

    /// `{base}/{org}/{project}/_apis/wit/{route}`
    fn wit_url(&self, route: &str) -> String {
        format!(
            "{}/{}/{}/_apis/wit/{route}",
            self.project.base_url(),
            self.project.organization,
            urlencoding::encode(&self.project.project)
        )
    }

    /// Attachment uploads are addressed by project id rather than name.
    fn attachment_upload_url(&self) -> String {
        format!(
            "{}/{}/{}/_apis/wit/attachments",
            self.project.base_url(),
            self.project.organization,
            self.project.project_id
        )
    }

    async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response> {
        let resp = request
            .header(AUTHORIZATION, &self.auth_header)
            .send()
            .await
            .map_err(|e| TransferError::transport(context, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransferError::api(context, status.as_u16(), body));
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T> {
        self.send(request, context)
            .await?
            .json()
            .await
            .map_err(|e| TransferError::Decode {
                context: context.to_string(),
                message: e.to_string(),
            })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WiqlResult {
    #[serde(default)]
    work_items: Vec<WorkItemReference>,
}

#[derive(Deserialize)]
struct WorkItemReference {
    id: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentList {
    #[serde(default)]
    comments: Vec<Comment>,
    continuation_token: Option<String>,
}

#[async_trait]
impl WorkItemTracker for AzureDevOpsClient {
    fn project(&self) -> &ProjectConfig {
        &self.project
    }

    async fn query_ids(&self, wiql: &str) -> Result<Vec<u32>> {
        let request = self
            .client
            .post(self.wit_url("wiql"))
            .query(&[("api-version", API_VERSION)])
            .json(&serde_json::json!({ "query": wiql }));

        let result: WiqlResult = self.send_json(request, "WIQL query").await?;
        Ok(result.work_items.into_iter().map(|w| w.id).collect())
    }

    async fn get_work_item(&self, id: u32, expand_relations: bool) -> Result<WorkItemRecord> {
        let mut request = self
            .client
            .get(self.wit_url(&format!("workitems/{id}")))
            .query(&[("api-version", API_VERSION)]);
        if expand_relations {
            request = request.query(&[("$expand", "all")]);
        }

        self.send_json(request, &format!("get work item {id}")).await
    }

    async fn get_comments(&self, id: u32) -> Result<Vec<Comment>> {
        let context = format!("get comments of {id}");
        let mut comments = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.wit_url(&format!("workItems/{id}/comments")))
                .query(&[("api-version", COMMENTS_API_VERSION), ("order", "asc")]);
            if let Some(token) = &continuation {
                request = request.query(&[("continuationToken", token.as_str())]);
            }

            let page: CommentList = self.send_json(request, &context).await?;
            comments.extend(page.comments);
            match page.continuation_token.filter(|t| !t.is_empty()) {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        Ok(comments)
    }

    async fn add_comment(&self, id: u32, text: &str) -> Result<()> {
        let request = self
            .client
            .post(self.wit_url(&format!("workItems/{id}/comments")))
            .query(&[("api-version", COMMENTS_API_VERSION)])
            .json(&serde_json::json!({ "text": text }));

        self.send(request, &format!("add comment to {id}")).await?;
        Ok(())
    }

    async fn get_attachment(&self, id: Uuid) -> Result<AttachmentContent> {
        let context = format!("download attachment {id}");
        let request = self
            .client
            .get(self.wit_url(&format!("attachments/{id}")))
            .query(&[("api-version", API_VERSION), ("download", "true")]);

        let resp = self.send(request, &context).await?;
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransferError::transport(context, e))?;

        Ok(AttachmentContent {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn create_attachment(
        &self,
        content: AttachmentContent,
        file_name: &str,
    ) -> Result<AttachmentRef> {
        let content_type = content
            .content_type
            .unwrap_or_else(|| OCTET_STREAM.to_string());
        let request = self
            .client
            .post(self.attachment_upload_url())
            .query(&[("fileName", file_name), ("api-version", API_VERSION)])
            .header(CONTENT_TYPE, content_type)
            .body(content.bytes);

        self.send_json(request, "upload attachment").await
    }

    async fn create_work_item(
        &self,
        work_item_type: &str,
        document: &PatchDocument,
    ) -> Result<WorkItemRecord> {
        let request = self
            .client
            .post(self.wit_url(&format!(
                "workitems/${}",
                urlencoding::encode(work_item_type)
            )))
            .query(&[("api-version", API_VERSION)])
            .header(CONTENT_TYPE, JSON_PATCH)
            .body(serde_json::to_vec(document)?);

        self.send_json(request, &format!("create {work_item_type}"))
            .await
    }

    async fn update_work_item(
        &self,
        id: u32,
        document: &PatchDocument,
    ) -> Result<WorkItemRecord> {
        let request = self
            .client
            .patch(self.wit_url(&format!("workitems/{id}")))
            .query(&[("api-version", API_VERSION)])
            .header(CONTENT_TYPE, JSON_PATCH)
            .body(serde_json::to_vec(document)?);

        self.send_json(request, &format!("update work item {id}"))
            .await
    }
}
