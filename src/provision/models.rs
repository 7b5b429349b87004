use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Activation policy an instance must have before a script may run on it.
pub const RUNNABLE_ACTIVATION_POLICY: &str = "ALWAYS";

/// Declared behavior on logical-resource removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    /// Leave remote side effects untouched.
    #[default]
    #[serde(rename = "ABANDON")]
    Abandon,
}

impl DeletionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionPolicy::Abandon => "ABANDON",
        }
    }
}

impl fmt::Display for DeletionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeletionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ABANDON" => Ok(DeletionPolicy::Abandon),
            other => Err(format!(
                "expected deletion_policy to be one of [\"ABANDON\"], got \"{}\"",
                other
            )),
        }
    }
}

/// A named script bound to one instance (and optionally one database).
///
/// `script`, `instance` and `database` are fixed for the life of the logical
/// resource; changing any of them means recreating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub name: String,
    pub script: String,
    pub instance: String,
    pub database: Option<String>,
    pub deletion_policy: DeletionPolicy,
}

impl ProvisionRequest {
    pub fn new(name: &str, instance: &str, script: &str) -> Self {
        Self {
            name: name.to_string(),
            script: script.to_string(),
            instance: instance.to_string(),
            database: None,
            deletion_policy: DeletionPolicy::Abandon,
        }
    }

    /// Set the target database. An empty name means "no database".
    pub fn with_database(mut self, database: &str) -> Self {
        self.database = if database.is_empty() {
            None
        } else {
            Some(database.to_string())
        };
        self
    }

    /// Database name as sent on the wire (empty when unset).
    pub fn database_or_empty(&self) -> &str {
        self.database.as_deref().unwrap_or("")
    }

    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::new(&self.instance, &self.name)
    }
}

/// Snapshot of the target instance's activation state. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceState {
    pub instance: String,
    pub activation_policy: String,
}

impl InstanceState {
    pub fn is_runnable(&self) -> bool {
        self.activation_policy == RUNNABLE_ACTIVATION_POLICY
    }
}

/// Interpreted result of one script execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub status_code: i32,
    pub status_message: Option<String>,
}

impl ExecutionOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            status_code: 0,
            status_message: None,
        }
    }
}

/// Durable handle of a provisioned script: `instance/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity(String);

impl ResourceIdentity {
    pub fn new(instance: &str, name: &str) -> Self {
        Self(format!("{}/{}", instance, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a create request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionPhase {
    Pending,
    Locked,
    StatusChecking,
    StatusRetrying,
    StatusRejected,
    Executing,
    Succeeded,
    Failed,
}

impl ProvisionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProvisionPhase::StatusRejected | ProvisionPhase::Succeeded | ProvisionPhase::Failed
        )
    }
}

impl fmt::Display for ProvisionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProvisionPhase::Pending => "pending",
            ProvisionPhase::Locked => "locked",
            ProvisionPhase::StatusChecking => "status-checking",
            ProvisionPhase::StatusRetrying => "status-retrying",
            ProvisionPhase::StatusRejected => "status-rejected",
            ProvisionPhase::Executing => "executing",
            ProvisionPhase::Succeeded => "succeeded",
            ProvisionPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Ordered record of the phases a request went through.
#[derive(Debug, Default)]
pub struct PhaseLog {
    phases: std::sync::Mutex<Vec<ProvisionPhase>>,
}

impl PhaseLog {
    pub fn new() -> Self {
        let log = Self::default();
        log.enter(ProvisionPhase::Pending);
        log
    }

    pub fn enter(&self, phase: ProvisionPhase) {
        if let Ok(mut phases) = self.phases.lock() {
            phases.push(phase);
        }
    }

    pub fn current(&self) -> ProvisionPhase {
        self.phases
            .lock()
            .ok()
            .and_then(|p| p.last().copied())
            .unwrap_or(ProvisionPhase::Pending)
    }

    pub fn history(&self) -> Vec<ProvisionPhase> {
        self.phases.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_instance_slash_name() {
        let req = ProvisionRequest::new("s1", "db1", "SELECT 1");
        assert_eq!(req.identity().as_str(), "db1/s1");
    }

    #[test]
    fn empty_database_is_unset() {
        let req = ProvisionRequest::new("s1", "db1", "SELECT 1").with_database("");
        assert!(req.database.is_none());
        assert_eq!(req.database_or_empty(), "");

        let req = req.with_database("app");
        assert_eq!(req.database.as_deref(), Some("app"));
    }

    #[test]
    fn deletion_policy_only_accepts_abandon() {
        assert_eq!("ABANDON".parse::<DeletionPolicy>(), Ok(DeletionPolicy::Abandon));
        assert!("DELETE".parse::<DeletionPolicy>().is_err());
        assert!("abandon".parse::<DeletionPolicy>().is_err());
    }

    #[test]
    fn only_always_is_runnable() {
        let state = |p: &str| InstanceState {
            instance: "db1".to_string(),
            activation_policy: p.to_string(),
        };
        assert!(state("ALWAYS").is_runnable());
        assert!(!state("NEVER").is_runnable());
        assert!(!state("ON_DEMAND").is_runnable());
        assert!(!state("").is_runnable());
    }
}
