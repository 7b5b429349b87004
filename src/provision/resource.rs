//! Lifecycle hooks of the provision-script resource.
//!
//! Only `create` talks to the remote side. `read`, `update` and `delete` are
//! pass-throughs over the local tracking record.

use crate::state::models::{script_fingerprint, ScriptRecord};
use crate::state::store::StateStore;

use super::coordinator::{CreateOutcome, Provisioner};
use super::error::ProvisionError;
use super::models::{PhaseLog, ProvisionRequest, ResourceIdentity};

/// Run the script and build its tracking record. `Ok(None)` when the target
/// instance does not exist.
pub async fn create(
    provisioner: &Provisioner,
    address: &str,
    project: &str,
    request: &ProvisionRequest,
    phases: &PhaseLog,
) -> Result<Option<ScriptRecord>, ProvisionError> {
    match provisioner.create(project, request, phases).await? {
        CreateOutcome::Provisioned(id) => Ok(Some(new_record(address, project, request, &id))),
        CreateOutcome::InstanceAbsent => Ok(None),
    }
}

/// Build the record stored after a successful create.
pub fn new_record(
    address: &str,
    project: &str,
    request: &ProvisionRequest,
    id: &ResourceIdentity,
) -> ScriptRecord {
    let now = chrono::Utc::now().to_rfc3339();
    ScriptRecord {
        address: address.to_string(),
        id: id.to_string(),
        name: request.name.clone(),
        project: project.to_string(),
        instance: request.instance.clone(),
        database: request.database.clone(),
        deletion_policy: request.deletion_policy.to_string(),
        script_sha256: script_fingerprint(&request.script),
        created_at: now.clone(),
        updated_at: now,
    }
}

/// Nothing to refresh: the last known state is the state.
pub fn read(record: ScriptRecord) -> ScriptRecord {
    record
}

/// Apply a change to non-force-new fields and recompute the identity.
pub fn update(mut record: ScriptRecord, name: &str) -> ScriptRecord {
    record.name = name.to_string();
    record.id = ResourceIdentity::new(&record.instance, &record.name).to_string();
    record.updated_at = chrono::Utc::now().to_rfc3339();
    record
}

/// Forget the resource locally. Remote side effects are abandoned.
pub fn delete(store: &StateStore, record: &ScriptRecord) -> anyhow::Result<bool> {
    tracing::info!(
        id = record.id.as_str(),
        deletion_policy = record.deletion_policy.as_str(),
        "Abandoning provisioned script"
    );
    store.delete_script(&record.address)
}

/// Force-new attributes (`script`, `instance`, `database`) that differ between
/// a record and a desired request. A project change also moves the script to
/// a different instance.
pub fn requires_replace(
    record: &ScriptRecord,
    project: &str,
    request: &ProvisionRequest,
) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if record.script_sha256 != script_fingerprint(&request.script) {
        changed.push("script");
    }
    if record.instance != request.instance || record.project != project {
        changed.push("instance");
    }
    if record.database != request.database {
        changed.push("database");
    }
    changed
}
