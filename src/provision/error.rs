use std::time::Duration;

use crate::admin::AdminError;

/// Failures of a provisioning request. All are terminal for the request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProvisionError {
    /// The target instance does not exist. Callers treat the logical
    /// resource as absent instead of failing.
    #[error("SQL Database Instance \"{instance}\" not found")]
    InstanceNotFound { instance: String },

    /// The instance exists but is not in a runnable state.
    #[error("Error, failed to run script {name} because instance {instance} is not up (activation policy {activation_policy:?})")]
    Precondition {
        name: String,
        instance: String,
        activation_policy: String,
    },

    /// Fetching instance metadata failed with a non-retryable error.
    #[error("Error, failed to read SQL Database Instance {instance} for script {name}: {source}")]
    Backend {
        name: String,
        instance: String,
        #[source]
        source: AdminError,
    },

    /// Network/auth/protocol failure while executing the script.
    #[error("Error, failed to run script {name} on instance {instance}: {source}")]
    Transport {
        name: String,
        instance: String,
        #[source]
        source: AdminError,
    },

    /// Transport succeeded but the in-band status code was non-zero.
    #[error("Error, failed to run script {name} on instance {instance}: {message}")]
    RemoteStatus {
        name: String,
        instance: String,
        code: i32,
        message: String,
    },

    /// The deadline passed while waiting on the instance.
    #[error("Error, timed out after {elapsed:?} waiting to run script {name} on instance {instance}{}", detail_suffix(.detail))]
    Timeout {
        name: String,
        instance: String,
        elapsed: Duration,
        detail: Option<String>,
    },
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {}", d),
        None => String::new(),
    }
}

impl ProvisionError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProvisionError::InstanceNotFound { .. })
    }

    /// Short label for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::InstanceNotFound { .. } => "not-found",
            ProvisionError::Precondition { .. } => "precondition",
            ProvisionError::Backend { .. } => "backend",
            ProvisionError::Transport { .. } => "transport",
            ProvisionError::RemoteStatus { .. } => "remote-status",
            ProvisionError::Timeout { .. } => "timeout",
        }
    }
}
