use std::collections::HashMap;

use crate::config::types::ScriptSpec;
use crate::provision::resource;
use crate::state::models::ScriptRecord;

/// The action to take for a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptAction {
    /// Not tracked yet: run it.
    Create,
    /// A force-new attribute changed: forget the old record and run again.
    Replace { changed: Vec<&'static str> },
    /// Only the name changed: recompute the identity, no remote call.
    Update,
    /// Tracked but no longer configured: drop the record, no remote call.
    Forget,
    NoOp,
}

impl std::fmt::Display for ScriptAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptAction::Create => write!(f, "+"),
            ScriptAction::Replace { .. } => write!(f, "-/+"),
            ScriptAction::Update => write!(f, "~"),
            ScriptAction::Forget => write!(f, "-"),
            ScriptAction::NoOp => write!(f, "(no changes)"),
        }
    }
}

/// A planned change for a single script address.
#[derive(Debug, Clone)]
pub struct PlannedScript {
    pub address: String,
    pub action: ScriptAction,
    /// Desired state; `None` for `Forget`.
    pub spec: Option<ScriptSpec>,
    /// Tracked state; `None` for `Create`.
    pub record: Option<ScriptRecord>,
}

/// The full plan, ordered by address.
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    pub scripts: Vec<PlannedScript>,
}

impl ExecutionPlan {
    /// Diff configured scripts against tracking records.
    pub fn build(specs: &[ScriptSpec], records: &[ScriptRecord]) -> Self {
        let mut by_address: HashMap<&str, &ScriptRecord> =
            records.iter().map(|r| (r.address.as_str(), r)).collect();

        let mut scripts = Vec::new();
        for spec in specs {
            let record = by_address.remove(spec.address.as_str());
            let action = match record {
                None => ScriptAction::Create,
                Some(r) => {
                    let changed = resource::requires_replace(r, &spec.project, &spec.request);
                    if !changed.is_empty() {
                        ScriptAction::Replace { changed }
                    } else if r.name != spec.request.name {
                        ScriptAction::Update
                    } else {
                        ScriptAction::NoOp
                    }
                }
            };
            scripts.push(PlannedScript {
                address: spec.address.clone(),
                action,
                spec: Some(spec.clone()),
                record: record.cloned(),
            });
        }

        for record in by_address.into_values() {
            scripts.push(PlannedScript {
                address: record.address.clone(),
                action: ScriptAction::Forget,
                spec: None,
                record: Some(record.clone()),
            });
        }

        scripts.sort_by(|a, b| a.address.cmp(&b.address));
        Self { scripts }
    }

    pub fn count(&self, pred: impl Fn(&ScriptAction) -> bool) -> usize {
        self.scripts.iter().filter(|s| pred(&s.action)).count()
    }

    /// Scripts that need a remote execution (creates and replaces).
    pub fn runs(&self) -> impl Iterator<Item = &PlannedScript> {
        self.scripts.iter().filter(|s| {
            matches!(s.action, ScriptAction::Create | ScriptAction::Replace { .. })
        })
    }

    pub fn has_changes(&self) -> bool {
        self.scripts.iter().any(|s| s.action != ScriptAction::NoOp)
    }
}

impl std::fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let creates = self.count(|a| *a == ScriptAction::Create);
        let replaces = self.count(|a| matches!(a, ScriptAction::Replace { .. }));
        let updates = self.count(|a| *a == ScriptAction::Update);
        let forgets = self.count(|a| *a == ScriptAction::Forget);

        let mut parts = Vec::new();
        if creates > 0 {
            parts.push(format!("{} to run", creates));
        }
        if replaces > 0 {
            parts.push(format!("{} to rerun", replaces));
        }
        if updates > 0 {
            parts.push(format!("{} to change", updates));
        }
        if forgets > 0 {
            parts.push(format!("{} to forget", forgets));
        }
        if parts.is_empty() {
            write!(f, "No changes.")
        } else {
            write!(f, "Plan: {}.", parts.join(", "))
        }
    }
}
