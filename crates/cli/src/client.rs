//! API client for communicating with the Workload Controller

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the Workload Controller
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        // Relative joins replace the last path segment unless it ends in '/'
        let mut base_url = Url::parse(base_url).context("Invalid API URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// Turn a non-2xx response into an error carrying the API's message
    async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(err) => anyhow::bail!("API error ({}, {}): {}", status, err.code, err.error),
            Err(_) => anyhow::bail!("API error ({}): {}", status, body),
        }
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .client
            .get(self.url(path)?)
            .query(query)
            .send()
            .await
            .context("Failed to send request")?;

        Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse response")
    }

    /// Make a GET request and return the body as text
    pub async fn get_text(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let response = self
            .client
            .get(self.url(path)?)
            .query(query)
            .send()
            .await
            .context("Failed to send request")?;

        Self::check(response)
            .await?
            .text()
            .await
            .context("Failed to read response")
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(self.url(path)?)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to parse response")
    }
}

/// Path of a namespaced workload resource
pub fn workload_path(namespace: &str, workload: &str, action: &str) -> String {
    format!("api/v1/namespaces/{}/workloads/{}/{}", namespace, workload, action)
}

/// Path of a namespaced pod resource
pub fn pod_path(namespace: &str, pod: &str, action: &str) -> String {
    format!("api/v1/namespaces/{}/pods/{}/{}", namespace, pod, action)
}

// API request and response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSummary {
    pub namespace: String,
    pub name: String,
    pub replicas: i32,
    pub ready_replicas: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodSummary {
    pub namespace: String,
    pub name: String,
    pub phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    pub restarts: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_record: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerResponse {
    pub namespace: String,
    pub pod: String,
    pub workload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionsResponse {
    pub namespace: String,
    pub workload: String,
    pub revisions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub revision: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleRequest {
    pub replicas: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub namespace: String,
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restarted_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerUsage {
    pub cpu_cores: f64,
    pub memory_mb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodUsage {
    pub phase: String,
    pub containers: BTreeMap<String, ContainerUsage>,
    pub total_cpu_cores: f64,
    pub total_memory_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadStatus {
    pub namespace: String,
    pub name: String,
    pub status: String,
    pub replicas: i32,
    pub pods: BTreeMap<String, PodUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub generated_at: i64,
    pub workloads: Vec<WorkloadStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_get_with_namespace_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/workloads")
            .match_query(Matcher::UrlEncoded("namespace".into(), "prod".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"namespace":"prod","name":"web","replicas":3,"ready_replicas":2,"images":["nginx:1.25"]}]"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let workloads: Vec<WorkloadSummary> = client
            .get("api/v1/workloads", &[("namespace", "prod")])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(workloads.len(), 1);
        assert_eq!(workloads[0].ready_replicas, 2);
        assert!(workloads[0].revision.is_none());
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/namespaces/prod/workloads/web/scale")
            .match_body(Matcher::Json(serde_json::json!({ "replicas": 4 })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"namespace":"prod","name":"web","message":"scaled to 4 replicas"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let response: ActionResponse = client
            .post(&workload_path("prod", "web", "scale"), &ScaleRequest { replicas: 4 })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.message, "scaled to 4 replicas");
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/namespaces/prod/workloads/web/rollback")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error":"revision 9 not found for deployment prod/web","code":"REVISION_NOT_FOUND"}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .post::<ActionResponse, _>(
                &workload_path("prod", "web", "rollback"),
                &RollbackRequest {
                    revision: "9".into(),
                },
            )
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("REVISION_NOT_FOUND"));
        assert!(message.contains("revision 9 not found"));
    }

    #[tokio::test]
    async fn test_base_url_with_path_prefix() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/controller/api/v1/status")
            .match_query(Matcher::UrlEncoded("format".into(), "text".into()))
            .with_status(200)
            .with_body("No deployments found\n")
            .create_async()
            .await;

        let client = ApiClient::new(&format!("{}/controller", server.url())).unwrap();
        let text = client
            .get_text("api/v1/status", &[("format", "text")])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(text, "No deployments found\n");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
