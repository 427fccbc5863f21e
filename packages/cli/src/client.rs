// ABOUTME: HTTP client used by the CLI subcommands to talk to a running Wharf server
// ABOUTME: Unwraps the API response envelope into typed results

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use wharf_api::workspace_handlers::ExecResponse;
use wharf_sandbox::{StartResult, Workspace};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Could not reach the Wharf server: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{message} ({code}, HTTP {status})")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("Server response did not contain data")]
    MissingData,
}

#[derive(Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<Value>,
}

pub struct WharfClient {
    base_url: String,
    http: reqwest::Client,
}

impl WharfClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn start(&self, workspace_id: &str) -> Result<StartResult, ClientError> {
        let path = format!("/api/workspaces/{}/start", workspace_id);
        self.request(Method::POST, &path, None).await
    }

    pub async fn stop(&self, workspace_id: &str) -> Result<(), ClientError> {
        let path = format!("/api/workspaces/{}/stop", workspace_id);
        self.request_optional::<Value>(Method::POST, &path, None)
            .await
            .map(|_| ())
    }

    pub async fn exec(
        &self,
        workspace_id: &str,
        command: Vec<String>,
    ) -> Result<ExecResponse, ClientError> {
        let path = format!("/api/workspaces/{}/exec", workspace_id);
        self.request(Method::POST, &path, Some(json!({ "command": command })))
            .await
    }

    pub async fn list(&self) -> Result<Vec<Workspace>, ClientError> {
        self.request(Method::GET, "/api/workspaces", None).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        self.request_optional(method, path, body)
            .await?
            .ok_or(ClientError::MissingData)
    }

    async fn request_optional<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<T>, ClientError> {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let envelope: Envelope<T> = response.json().await?;

        if !status.is_success() || !envelope.success {
            let (code, message) = error_parts(envelope.error);
            return Err(ClientError::Api {
                status,
                code,
                message,
            });
        }

        Ok(envelope.data)
    }
}

/// Error bodies carry either `{ code, message }` or a plain string
fn error_parts(error: Option<Value>) -> (String, String) {
    match error {
        Some(Value::Object(detail)) => (
            detail
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN")
                .to_string(),
            detail
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Request failed")
                .to_string(),
        ),
        Some(Value::String(message)) => ("UNKNOWN".to_string(), message),
        _ => ("UNKNOWN".to_string(), "Request failed".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_start_parses_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/workspaces/ws-1/start"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"url": "http://localhost:3001", "port": 3001},
                "error": null
            })))
            .mount(&server)
            .await;

        let client = WharfClient::new(server.uri());
        let result = client.start("ws-1").await.unwrap();

        assert_eq!(
            result,
            StartResult {
                url: "http://localhost:3001".to_string(),
                port: 3001,
            }
        );
    }

    #[tokio::test]
    async fn test_stop_accepts_null_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/workspaces/ws-1/stop"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": null,
                "error": null
            })))
            .mount(&server)
            .await;

        WharfClient::new(server.uri()).stop("ws-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_exec_sends_command() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/workspaces/ws-1/exec"))
            .and(body_json(json!({"command": ["ls", "-la"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"output": "total 0\n", "exit_code": 0},
                "error": null
            })))
            .mount(&server)
            .await;

        let result = WharfClient::new(server.uri())
            .exec("ws-1", vec!["ls".into(), "-la".into()])
            .await
            .unwrap();

        assert_eq!(result.output, "total 0\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_api_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/workspaces/ws-1/start"))
            .respond_with(ResponseTemplate::new(502).set_body_json(json!({
                "success": false,
                "error": {"code": "PROVISIONING_FAILED", "message": "pull failed"},
                "request_id": "abc"
            })))
            .mount(&server)
            .await;

        let err = WharfClient::new(server.uri())
            .start("ws-1")
            .await
            .unwrap_err();

        match err {
            ClientError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(code, "PROVISIONING_FAILED");
                assert_eq!(message, "pull failed");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = WharfClient::new("http://localhost:4001/");
        assert_eq!(client.base_url(), "http://localhost:4001");
    }
}
