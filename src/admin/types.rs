use serde::{Deserialize, Serialize};

// ─── Instances.Get ──────────────────────────────────────────────────────────

/// Subset of a managed database instance's metadata returned by the admin API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInstance {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub database_version: Option<String>,
    #[serde(default)]
    pub settings: InstanceSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSettings {
    #[serde(default)]
    pub activation_policy: String,
    #[serde(default)]
    pub tier: Option<String>,
}

impl DatabaseInstance {
    /// Build an instance snapshot with the given activation policy.
    pub fn with_activation_policy(name: &str, policy: &str) -> Self {
        Self {
            name: name.to_string(),
            settings: InstanceSettings {
                activation_policy: policy.to_string(),
                tier: None,
            },
            ..Default::default()
        }
    }
}

// ─── Instances.ExecuteSql ───────────────────────────────────────────────────

/// Request body for executing a SQL statement on an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteSqlPayload {
    pub sql_statement: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub database: String,
    /// Authenticate with the caller's IAM credentials instead of a password.
    pub auto_iam_authn: bool,
    pub application: String,
}

/// Structured response of an ExecuteSql call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteSqlResponse {
    #[serde(default)]
    pub status: Option<ExecuteSqlStatus>,
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

/// In-band status embedded in an otherwise successful transport response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSqlStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: Option<String>,
}

impl ExecuteSqlResponse {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_status(code: i32, message: &str) -> Self {
        Self {
            status: Some(ExecuteSqlStatus {
                code,
                message: Some(message.to_string()),
            }),
            ..Default::default()
        }
    }
}

// ─── Error envelope ─────────────────────────────────────────────────────────

/// Google-style JSON error envelope: `{"error": {"code", "message", "errors": [{"reason"}]}}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorItem {
    #[serde(default)]
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_omits_empty_database() {
        let payload = ExecuteSqlPayload {
            sql_statement: "SELECT 1".to_string(),
            database: String::new(),
            auto_iam_authn: true,
            application: "sqlprov".to_string(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["sqlStatement"], "SELECT 1");
        assert_eq!(json["autoIamAuthn"], true);
        assert!(json.get("database").is_none());
    }

    #[test]
    fn instance_parses_activation_policy() {
        let body = r#"{"name":"db1","state":"RUNNABLE","settings":{"activationPolicy":"ALWAYS","tier":"db-f1-micro"}}"#;
        let instance: DatabaseInstance = serde_json::from_str(body).unwrap();
        assert_eq!(instance.settings.activation_policy, "ALWAYS");
        assert_eq!(instance.state.as_deref(), Some("RUNNABLE"));
    }

    #[test]
    fn response_without_status_is_accepted() {
        let resp: ExecuteSqlResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.status.is_none());
    }
}
