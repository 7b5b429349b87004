use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::admin::SqlAdminApi;
use crate::state::lock::{InstanceLockKey, InstanceLockManager};

use super::error::ProvisionError;
use super::executor::ScriptExecutor;
use super::models::{PhaseLog, ProvisionPhase, ProvisionRequest, ResourceIdentity};
use super::status_gate::StatusGate;

/// Deadlines and backoff bounds for a create.
#[derive(Debug, Clone, Copy)]
pub struct ProvisionTimeouts {
    /// Overall deadline of one create, lock wait included.
    pub create: Duration,
    /// Bound of the instance status retry loop.
    pub read: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ProvisionTimeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(20 * 60),
            read: Duration::from_secs(20 * 60),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Result of a create that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The script ran; the resource now has this identity.
    Provisioned(ResourceIdentity),
    /// The target instance does not exist; nothing ran, nothing to track.
    InstanceAbsent,
}

/// Runs lock → status gate → execute for one request.
pub struct Provisioner {
    locks: Arc<InstanceLockManager>,
    gate: StatusGate,
    executor: ScriptExecutor,
    timeouts: ProvisionTimeouts,
}

impl Provisioner {
    pub fn new(
        admin: Arc<dyn SqlAdminApi>,
        locks: Arc<InstanceLockManager>,
        timeouts: ProvisionTimeouts,
    ) -> Self {
        Self {
            locks,
            gate: StatusGate::new(Arc::clone(&admin), timeouts.base_delay, timeouts.max_delay),
            executor: ScriptExecutor::new(admin),
            timeouts,
        }
    }

    /// Create the logical resource by running its script once.
    ///
    /// The instance lock is held for the status check and the execution and
    /// released on every exit path, deadline expiry included.
    pub async fn create(
        &self,
        project: &str,
        request: &ProvisionRequest,
        phases: &PhaseLog,
    ) -> Result<CreateOutcome, ProvisionError> {
        let started = Instant::now();

        match tokio::time::timeout(
            self.timeouts.create,
            self.create_locked(project, request, phases),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                let interrupted = phases.current();
                phases.enter(ProvisionPhase::Failed);
                tracing::error!(
                    script = request.name.as_str(),
                    instance = request.instance.as_str(),
                    phase = %interrupted,
                    "Create deadline exceeded"
                );
                Err(ProvisionError::Timeout {
                    name: request.name.clone(),
                    instance: request.instance.clone(),
                    elapsed: started.elapsed(),
                    detail: Some(format!("deadline exceeded while {}", interrupted)),
                })
            }
        }
    }

    async fn create_locked(
        &self,
        project: &str,
        request: &ProvisionRequest,
        phases: &PhaseLog,
    ) -> Result<CreateOutcome, ProvisionError> {
        let guard = self
            .locks
            .acquire(InstanceLockKey::new(project, &request.instance))
            .await;
        phases.enter(ProvisionPhase::Locked);

        let result = self.check_and_execute(project, request, phases).await;

        match &result {
            Ok(CreateOutcome::Provisioned(id)) => {
                phases.enter(ProvisionPhase::Succeeded);
                tracing::info!(id = id.as_str(), "Script provisioned");
            }
            Ok(CreateOutcome::InstanceAbsent) => {}
            Err(_) if phases.current().is_terminal() => {}
            Err(e) => {
                phases.enter(ProvisionPhase::Failed);
                tracing::error!(error = %e, kind = e.kind(), "Script failed");
            }
        }

        self.locks.release(guard);
        result
    }

    async fn check_and_execute(
        &self,
        project: &str,
        request: &ProvisionRequest,
        phases: &PhaseLog,
    ) -> Result<CreateOutcome, ProvisionError> {
        match self
            .gate
            .fetch_and_validate(
                project,
                &request.instance,
                &request.name,
                self.timeouts.read,
                phases,
            )
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(CreateOutcome::InstanceAbsent),
            Err(e) => return Err(e),
        }

        phases.enter(ProvisionPhase::Executing);
        self.executor.execute(project, request).await?;

        Ok(CreateOutcome::Provisioned(request.identity()))
    }
}
