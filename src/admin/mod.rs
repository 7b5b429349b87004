pub mod http;
pub mod types;

use async_trait::async_trait;

use types::{DatabaseInstance, ExecuteSqlPayload, ExecuteSqlResponse};

/// Reason attached by the admin API when another operation holds the instance.
pub const OPERATION_IN_PROGRESS_REASON: &str = "operationInProgress";

/// Errors surfaced by the remote administrative API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdminError {
    #[error("instance '{instance}' not found in project '{project}'")]
    NotFound { project: String, instance: String },

    #[error("googleapi: Error {code}: {message}{}", reason_suffix(.reason))]
    Api {
        code: u16,
        reason: Option<String>,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!(", {}", r),
        None => String::new(),
    }
}

impl AdminError {
    /// "Operation already in progress on this instance" (HTTP 409 with the
    /// `operationInProgress` reason).
    pub fn operation_in_progress(message: &str) -> Self {
        AdminError::Api {
            code: 409,
            reason: Some(OPERATION_IN_PROGRESS_REASON.to_string()),
            message: message.to_string(),
        }
    }

    pub fn is_operation_in_progress(&self) -> bool {
        matches!(
            self,
            AdminError::Api { code: 409, reason: Some(r), .. } if r == OPERATION_IN_PROGRESS_REASON
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AdminError::NotFound { .. } | AdminError::Api { code: 404, .. })
    }
}

/// Remote administrative API consumed by the provisioning core.
#[async_trait]
pub trait SqlAdminApi: Send + Sync {
    /// Fetch instance metadata.
    async fn get_instance(
        &self,
        project: &str,
        instance: &str,
    ) -> Result<DatabaseInstance, AdminError>;

    /// Execute a SQL statement on the instance.
    async fn execute_sql(
        &self,
        project: &str,
        instance: &str,
        payload: &ExecuteSqlPayload,
    ) -> Result<ExecuteSqlResponse, AdminError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_operation_in_progress() {
        assert!(AdminError::operation_in_progress("busy").is_operation_in_progress());

        let conflict = AdminError::Api {
            code: 409,
            reason: Some("alreadyExists".to_string()),
            message: "exists".to_string(),
        };
        assert!(!conflict.is_operation_in_progress());
        assert!(!AdminError::Transport("reset".to_string()).is_operation_in_progress());
    }

    #[test]
    fn api_error_message_includes_reason() {
        let err = AdminError::operation_in_progress("Operation failed because another operation was already in progress.");
        assert_eq!(
            err.to_string(),
            "googleapi: Error 409: Operation failed because another operation was already in progress., operationInProgress"
        );
    }

    #[test]
    fn api_404_counts_as_not_found() {
        let err = AdminError::Api {
            code: 404,
            reason: None,
            message: "gone".to_string(),
        };
        assert!(err.is_not_found());
    }
}
