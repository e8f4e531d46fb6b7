use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::TransferError;
use crate::model::work_item::fields;

pub const SOURCE_PAT_ENV: &str = "ADO_TRANSFER_SOURCE_PAT";
pub const DESTINATION_PAT_ENV: &str = "ADO_TRANSFER_DESTINATION_PAT";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub source: ProjectConfig,
    pub destination: ProjectConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// One side of the transfer: an organization plus a project inside it.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    pub organization: String,
    /// Project name, used in queries and item-scoped routes
    pub project: String,
    /// Project GUID, used in attachment routes and embedded attachment URLs
    pub project_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub pat: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl ProjectConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Path segment every attachment URL of this project contains.
    pub fn attachments_path(&self) -> String {
        format!("/{}/{}/_apis/wit/attachments/", self.organization, self.project_id)
    }

    /// Absolute prefix of attachment URLs embedded in rich text.
    pub fn attachments_prefix(&self) -> String {
        format!("{}{}", self.base_url(), self.attachments_path())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failing item and continue with the next one
    #[default]
    Skip,
    /// Stop the run at the first failing item
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub work_item_type: String,
    pub copy_fields: Vec<String>,
    pub acceptance_criteria_field: String,
    pub attachment_file_name: String,
    /// Set the source state with a follow-up update after creation
    pub copy_state: bool,
    pub on_item_error: FailurePolicy,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            work_item_type: "Feedback Request".into(),
            copy_fields: vec![
                fields::WORK_ITEM_TYPE.into(),
                fields::TITLE.into(),
                fields::DESCRIPTION.into(),
                fields::TAGS.into(),
            ],
            acceptance_criteria_field: fields::ACCEPTANCE_CRITERIA.into(),
            attachment_file_name: "image.png".into(),
            copy_state: false,
            on_item_error: FailurePolicy::Skip,
        }
    }
}

fn default_base_url() -> String {
    "https://dev.azure.com".into()
}

pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ado-transfer")
        .join("config.toml")
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let mut config = parse_config(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

pub fn parse_config(contents: &str) -> std::result::Result<AppConfig, toml::de::Error> {
    toml::from_str(contents)
}

impl AppConfig {
    /// PATs from the environment win over the file.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(pat) = lookup(SOURCE_PAT_ENV).filter(|p| !p.is_empty()) {
            self.source.pat = pat;
        }
        if let Some(pat) = lookup(DESTINATION_PAT_ENV).filter(|p| !p.is_empty()) {
            self.destination.pat = pat;
        }
    }

    pub fn validate(&self) -> std::result::Result<(), TransferError> {
        for (side, project) in [("source", &self.source), ("destination", &self.destination)] {
            let required = [
                ("organization", &project.organization),
                ("project", &project.project),
                ("project_id", &project.project_id),
                ("pat", &project.pat),
            ];
            for (key, value) in required {
                if value.trim().is_empty() {
                    return Err(TransferError::Config(format!("{side}.{key} is required")));
                }
            }
        }

        if self.migration.work_item_type.trim().is_empty() {
            return Err(TransferError::Config(
                "migration.work_item_type cannot be empty".into(),
            ));
        }

        // New items must start in the initial state
        if self.migration.copy_fields.iter().any(|f| f == fields::STATE) {
            return Err(TransferError::Config(format!(
                "migration.copy_fields cannot include {}; set migration.copy_state instead",
                fields::STATE
            )));
        }

        if self.source.base_url() == self.destination.base_url()
            && self.source.organization == self.destination.organization
            && self.source.project_id == self.destination.project_id
        {
            return Err(TransferError::Config(
                "source and destination cannot be the same project".into(),
            ));
        }

        Ok(())
    }
}
