use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Local tracking record of a provisioned script.
///
/// Only the identity and the force-new inputs are kept; the script text is
/// reduced to a fingerprint so a change can be detected without storing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRecord {
    /// Local address of the script in configuration.
    pub address: String,
    /// Resource identity, `instance/name`.
    pub id: String,
    pub name: String,
    pub project: String,
    pub instance: String,
    pub database: Option<String>,
    pub deletion_policy: String,
    pub script_sha256: String,
    pub created_at: String,
    pub updated_at: String,
}

/// SHA-256 hex fingerprint of a script body.
pub fn script_fingerprint(script: &str) -> String {
    hex::encode(Sha256::digest(script.as_bytes()))
}
