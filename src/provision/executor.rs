use std::sync::Arc;

use crate::admin::types::{ExecuteSqlPayload, ExecuteSqlResponse};
use crate::admin::SqlAdminApi;

use super::error::ProvisionError;
use super::models::{ExecutionOutcome, ProvisionRequest};

/// Caller-identification tag attached to every execution.
pub const APPLICATION_TAG: &str = "sqlprov";

/// Build the single execution payload for a request.
pub fn build_payload(request: &ProvisionRequest) -> ExecuteSqlPayload {
    ExecuteSqlPayload {
        sql_statement: request.script.clone(),
        database: request.database_or_empty().to_string(),
        auto_iam_authn: true,
        application: APPLICATION_TAG.to_string(),
    }
}

/// Read the in-band status of a transport-level success.
pub fn interpret_response(resp: &ExecuteSqlResponse) -> ExecutionOutcome {
    match &resp.status {
        Some(status) if status.code != 0 => ExecutionOutcome {
            success: false,
            status_code: status.code,
            status_message: status.message.clone(),
        },
        Some(status) => ExecutionOutcome {
            success: true,
            status_code: 0,
            status_message: status.message.clone(),
        },
        None => ExecutionOutcome::succeeded(),
    }
}

/// Submits a script to the remote engine exactly once.
///
/// No retry: if the transport fails the script may or may not have run, and
/// only the caller can judge whether rerunning it is safe.
pub struct ScriptExecutor {
    admin: Arc<dyn SqlAdminApi>,
}

impl ScriptExecutor {
    pub fn new(admin: Arc<dyn SqlAdminApi>) -> Self {
        Self { admin }
    }

    pub async fn execute(
        &self,
        project: &str,
        request: &ProvisionRequest,
    ) -> Result<ExecutionOutcome, ProvisionError> {
        let payload = build_payload(request);

        tracing::info!(
            script = request.name.as_str(),
            database = request.database_or_empty(),
            instance = request.instance.as_str(),
            "Executing script"
        );

        let resp = self
            .admin
            .execute_sql(project, &request.instance, &payload)
            .await
            .map_err(|source| ProvisionError::Transport {
                name: request.name.clone(),
                instance: request.instance.clone(),
                source,
            })?;

        let outcome = interpret_response(&resp);
        if !outcome.success {
            return Err(ProvisionError::RemoteStatus {
                name: request.name.clone(),
                instance: request.instance.clone(),
                code: outcome.status_code,
                message: outcome
                    .status_message
                    .unwrap_or_else(|| format!("status code {}", outcome.status_code)),
            });
        }

        tracing::info!(
            script = request.name.as_str(),
            instance = request.instance.as_str(),
            messages = resp.messages.len(),
            results = resp.results.len(),
            "Script executed"
        );
        Ok(outcome)
    }
}
