use std::sync::Arc;
use std::time::Duration;

use crate::admin::{AdminError, SqlAdminApi};
use crate::executor::retry::{retry_with_predicate, RetryDecision, RetryError, RetryOptions};

use super::error::ProvisionError;
use super::models::{InstanceState, PhaseLog, ProvisionPhase};

/// Retry predicate for instance fetches: only "operation already in progress
/// on this instance" is worth waiting out.
pub fn classify_fetch_error(err: &AdminError) -> RetryDecision {
    if err.is_operation_in_progress() {
        RetryDecision::Retry
    } else {
        RetryDecision::Abort
    }
}

/// Fetches instance metadata with a bounded retry loop and refuses to let a
/// script run on an instance that is not runnable.
pub struct StatusGate {
    admin: Arc<dyn SqlAdminApi>,
    base_delay: Duration,
    max_delay: Duration,
}

impl StatusGate {
    pub fn new(admin: Arc<dyn SqlAdminApi>, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            admin,
            base_delay,
            max_delay,
        }
    }

    pub async fn fetch_and_validate(
        &self,
        project: &str,
        instance: &str,
        script_name: &str,
        timeout: Duration,
        phases: &PhaseLog,
    ) -> Result<InstanceState, ProvisionError> {
        let options = RetryOptions {
            timeout,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
        };
        let admin = &self.admin;

        let fetched = retry_with_predicate(
            options,
            "get_instance",
            |err: &AdminError| {
                let decision = classify_fetch_error(err);
                if decision == RetryDecision::Retry {
                    phases.enter(ProvisionPhase::StatusRetrying);
                }
                decision
            },
            move || {
                phases.enter(ProvisionPhase::StatusChecking);
                admin.get_instance(project, instance)
            },
        )
        .await;

        let db_instance = match fetched {
            Ok(i) => i,
            Err(RetryError::Aborted(err)) if err.is_not_found() => {
                tracing::warn!(instance, script = script_name, "Instance not found");
                return Err(ProvisionError::InstanceNotFound {
                    instance: instance.to_string(),
                });
            }
            Err(RetryError::Aborted(err)) => {
                return Err(ProvisionError::Backend {
                    name: script_name.to_string(),
                    instance: instance.to_string(),
                    source: err,
                });
            }
            Err(RetryError::TimedOut { elapsed, last, .. }) => {
                return Err(ProvisionError::Timeout {
                    name: script_name.to_string(),
                    instance: instance.to_string(),
                    elapsed,
                    detail: last.map(|e| e.to_string()),
                });
            }
        };

        let state = InstanceState {
            instance: instance.to_string(),
            activation_policy: db_instance.settings.activation_policy,
        };

        if !state.is_runnable() {
            phases.enter(ProvisionPhase::StatusRejected);
            tracing::error!(
                instance,
                script = script_name,
                activation_policy = state.activation_policy.as_str(),
                "Instance is not up"
            );
            return Err(ProvisionError::Precondition {
                name: script_name.to_string(),
                instance: instance.to_string(),
                activation_policy: state.activation_policy,
            });
        }

        tracing::debug!(instance, project, "Instance is runnable");
        Ok(state)
    }
}
