use async_trait::async_trait;
use reqwest::StatusCode;

use super::types::{ApiErrorEnvelope, DatabaseInstance, ExecuteSqlPayload, ExecuteSqlResponse};
use super::{AdminError, SqlAdminApi};

pub const DEFAULT_ENDPOINT: &str = "https://sqladmin.googleapis.com/sql/v1beta4";

/// REST client for the managed SQL admin API (v1beta4 resource layout).
pub struct HttpSqlAdminClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpSqlAdminClient {
    /// Client for the API rooted at `base_url` (see [`DEFAULT_ENDPOINT`]).
    pub fn with_base_url(base_url: &str, access_token: Option<String>) -> Result<Self, AdminError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent())
            .build()
            .map_err(|e| AdminError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn instance_url(&self, project: &str, instance: &str) -> String {
        format!(
            "{}/projects/{}/instances/{}",
            self.base_url, project, instance
        )
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

/// User agent sent with every admin call.
pub fn user_agent() -> String {
    format!("sqlprov/{}", env!("CARGO_PKG_VERSION"))
}

#[async_trait]
impl SqlAdminApi for HttpSqlAdminClient {
    async fn get_instance(
        &self,
        project: &str,
        instance: &str,
    ) -> Result<DatabaseInstance, AdminError> {
        let url = self.instance_url(project, instance);
        tracing::debug!(url = url.as_str(), "Fetching instance");

        let resp = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|e| AdminError::Transport(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(AdminError::NotFound {
                project: project.to_string(),
                instance: instance.to_string(),
            });
        }
        let resp = check_status(resp).await?;

        resp.json::<DatabaseInstance>()
            .await
            .map_err(|e| AdminError::Transport(format!("failed to decode instance: {}", e)))
    }

    async fn execute_sql(
        &self,
        project: &str,
        instance: &str,
        payload: &ExecuteSqlPayload,
    ) -> Result<ExecuteSqlResponse, AdminError> {
        let url = format!("{}/executeSql", self.instance_url(project, instance));
        tracing::debug!(url = url.as_str(), "Submitting SQL statement");

        let resp = self
            .authorize(self.http.post(&url))
            .json(payload)
            .send()
            .await
            .map_err(|e| AdminError::Transport(e.to_string()))?;
        let resp = check_status(resp).await?;

        resp.json::<ExecuteSqlResponse>()
            .await
            .map_err(|e| AdminError::Transport(format!("failed to decode response: {}", e)))
    }
}

/// Turn a non-2xx response into an `AdminError::Api`, keeping the reason code.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, AdminError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(parse_api_error(status.as_u16(), &body))
}

pub(crate) fn parse_api_error(code: u16, body: &str) -> AdminError {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => AdminError::Api {
            code: if envelope.error.code == 0 {
                code
            } else {
                envelope.error.code
            },
            reason: envelope
                .error
                .errors
                .into_iter()
                .map(|e| e.reason)
                .find(|r| !r.is_empty()),
            message: envelope.error.message,
        },
        Err(_) => AdminError::Api {
            code,
            reason: None,
            message: body.trim().to_string(),
        },
    }
}
