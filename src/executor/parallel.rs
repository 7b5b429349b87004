use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use crate::planner::plan::{ExecutionPlan, ScriptAction};
use crate::provision::resource;
use crate::provision::{PhaseLog, ProvisionError, Provisioner};
use crate::state::store::StateStore;

/// Final status of one script address after apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStatus {
    Provisioned(String),
    Updated(String),
    Forgotten,
    Unchanged,
    /// Target instance does not exist; nothing ran.
    InstanceAbsent,
    Failed { kind: &'static str, message: String },
}

#[derive(Debug)]
pub struct ScriptResult {
    pub address: String,
    pub status: ScriptStatus,
}

/// Summary of an apply operation.
#[derive(Debug, Default)]
pub struct ApplySummary {
    pub results: Vec<ScriptResult>,
    pub provisioned: usize,
    pub changed: usize,
    pub forgotten: usize,
    pub absent: usize,
    pub failed: usize,
    pub elapsed_secs: u64,
}

impl ApplySummary {
    fn record(&mut self, address: &str, status: ScriptStatus) {
        match &status {
            ScriptStatus::Provisioned(_) => self.provisioned += 1,
            ScriptStatus::Updated(_) => self.changed += 1,
            ScriptStatus::Forgotten => self.forgotten += 1,
            ScriptStatus::InstanceAbsent => self.absent += 1,
            ScriptStatus::Failed { .. } => self.failed += 1,
            ScriptStatus::Unchanged => {}
        }
        self.results.push(ScriptResult {
            address: address.to_string(),
            status,
        });
    }
}

impl std::fmt::Display for ApplySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Apply complete! Scripts: {} run, {} changed, {} forgotten",
            self.provisioned, self.changed, self.forgotten
        )?;
        if self.absent > 0 {
            write!(f, ", {} skipped (instance not found)", self.absent)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        write!(f, ". Total time: {}s.", self.elapsed_secs)
    }
}

/// Apply a plan: local bookkeeping first, then run scripts in parallel.
///
/// Parallelism is bounded by a semaphore; scripts on the same instance are
/// still serialized by the provisioner's instance locks.
pub async fn apply_plan(
    provisioner: Arc<Provisioner>,
    store: &StateStore,
    plan: &ExecutionPlan,
    parallelism: usize,
    targets: &[String],
) -> Result<ApplySummary> {
    let started = Instant::now();
    let target_set: HashSet<&str> = targets.iter().map(|s| s.as_str()).collect();
    let selected = |address: &str| target_set.is_empty() || target_set.contains(address);
    let mut summary = ApplySummary::default();

    for planned in plan.scripts.iter().filter(|s| selected(&s.address)) {
        match (&planned.action, &planned.record, &planned.spec) {
            (ScriptAction::Update, Some(record), Some(spec)) => {
                let updated = resource::update(resource::read(record.clone()), &spec.request.name);
                store.upsert_script(&updated)?;
                tracing::info!(address = planned.address.as_str(), id = updated.id.as_str(), "Updated identity");
                summary.record(&planned.address, ScriptStatus::Updated(updated.id));
            }
            (ScriptAction::Forget, Some(record), _) => {
                resource::delete(store, record)?;
                summary.record(&planned.address, ScriptStatus::Forgotten);
            }
            (ScriptAction::Replace { changed }, Some(record), _) => {
                tracing::info!(
                    address = planned.address.as_str(),
                    changed = ?changed,
                    "Force-new attribute changed, rerunning script"
                );
                resource::delete(store, record)?;
            }
            (ScriptAction::NoOp, _, _) => {
                summary.record(&planned.address, ScriptStatus::Unchanged);
            }
            _ => {}
        }
    }

    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut addresses = Vec::new();
    let mut handles = Vec::new();

    for planned in plan.runs().filter(|s| selected(&s.address)) {
        let Some(spec) = planned.spec.clone() else {
            continue;
        };
        let permit = semaphore.clone().acquire_owned().await?;
        let provisioner = Arc::clone(&provisioner);

        let handle = tokio::spawn(async move {
            let _permit = permit;
            let phases = PhaseLog::new();
            let result =
                resource::create(&provisioner, &spec.address, &spec.project, &spec.request, &phases)
                    .await;
            tracing::debug!(
                address = spec.address.as_str(),
                phases = ?phases.history(),
                "Create finished"
            );
            result
        });
        addresses.push(planned.address.clone());
        handles.push(handle);
    }

    // Settle every task before returning: one failed write must not cost
    // another script that already ran its record.
    let joined = futures::future::join_all(handles).await;
    for (address, joined) in addresses.into_iter().zip(joined) {
        let status = match joined {
            Ok(Ok(Some(record))) => match store.upsert_script(&record) {
                Ok(()) => ScriptStatus::Provisioned(record.id),
                Err(e) => {
                    tracing::error!(
                        address = address.as_str(),
                        id = record.id.as_str(),
                        error = %e,
                        "Script ran but its state could not be saved"
                    );
                    ScriptStatus::Failed {
                        kind: "state",
                        message: format!(
                            "script ran as {} but state was not saved: {:#}",
                            record.id, e
                        ),
                    }
                }
            },
            Ok(Ok(None)) => {
                tracing::warn!(address = address.as_str(), "Instance not found, nothing to run");
                ScriptStatus::InstanceAbsent
            }
            Ok(Err(e)) => failed(&e),
            Err(e) => {
                tracing::error!(address = address.as_str(), error = %e, "Provision task aborted");
                ScriptStatus::Failed {
                    kind: "task",
                    message: e.to_string(),
                }
            }
        };
        summary.record(&address, status);
    }

    summary.results.sort_by(|a, b| a.address.cmp(&b.address));
    summary.elapsed_secs = started.elapsed().as_secs();
    Ok(summary)
}

fn failed(e: &ProvisionError) -> ScriptStatus {
    ScriptStatus::Failed {
        kind: e.kind(),
        message: e.to_string(),
    }
}

/// Forget tracked scripts. Never calls the remote API.
pub fn execute_destroy(store: &StateStore, targets: &[String]) -> Result<Vec<String>> {
    let target_set: HashSet<&str> = targets.iter().map(|s| s.as_str()).collect();
    let mut forgotten = Vec::new();

    for record in store.list_scripts()? {
        if !target_set.is_empty() && !target_set.contains(record.address.as_str()) {
            continue;
        }
        if resource::delete(store, &record)? {
            forgotten.push(record.address);
        }
    }
    Ok(forgotten)
}
