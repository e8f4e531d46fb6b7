//! Error types for transfer operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    /// Connection, TLS or timeout failure talking to the tracking service
    #[error("Request to {context} failed: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status
    #[error("{context} returned {status}: {body}")]
    Api {
        context: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode {context}: {message}")]
    Decode { context: String, message: String },

    /// A field the transfer depends on is absent from the record
    #[error("Work item {id} has no {field} field")]
    MissingField { id: u32, field: String },

    #[error("No work item titled '{title}' in {project}")]
    TitleNotFound { title: String, project: String },

    #[error("Invalid relation url: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransferError {
    pub fn api(context: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        TransferError::Api {
            context: context.into(),
            status,
            body: body.into(),
        }
    }

    pub fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        TransferError::Transport {
            context: context.into(),
            source,
        }
    }

    /// Transport and authentication failures abort the whole run regardless
    /// of the per-item failure policy.
    pub fn is_fatal(&self) -> bool {
        match self {
            TransferError::Transport { .. } | TransferError::Config(_) => true,
            TransferError::Api { status, .. } => matches!(status, 401 | 403),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_fatal() {
        assert!(TransferError::api("get work item 1", 401, "").is_fatal());
        assert!(TransferError::api("get work item 1", 403, "").is_fatal());
        assert!(!TransferError::api("get work item 1", 404, "").is_fatal());
    }

    #[test]
    fn lookup_misses_are_not_fatal() {
        let err = TransferError::TitleNotFound {
            title: "Nonexistent Parent".into(),
            project: "proj2".into(),
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("Nonexistent Parent"));
    }
}
