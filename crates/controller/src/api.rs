//! HTTP API: controller operations, health checks and Prometheus metrics

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use controller_lib::{
    health::{ComponentStatus, HealthRegistry},
    Controller, ControllerError, PodSummary, WorkloadSummary,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub controller: Controller,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(controller: Controller, health_registry: HealthRegistry) -> Self {
        Self {
            controller,
            health_registry,
        }
    }
}

/// Error body returned by every API route
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

/// Controller error rendered as an HTTP response
pub struct ApiFailure(ControllerError);

impl From<ControllerError> for ApiFailure {
    fn from(err: ControllerError) -> Self {
        Self(err)
    }
}

impl ApiFailure {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            ControllerError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ControllerError::OwnershipNotFound { .. } => {
                (StatusCode::NOT_FOUND, "OWNERSHIP_NOT_FOUND")
            }
            ControllerError::RevisionNotFound { .. } => {
                (StatusCode::NOT_FOUND, "REVISION_NOT_FOUND")
            }
            ControllerError::InvalidScale { .. } => (StatusCode::BAD_REQUEST, "INVALID_SCALE"),
            ControllerError::ConcurrencyExhausted { .. } => {
                (StatusCode::CONFLICT, "CONCURRENCY_EXHAUSTED")
            }
            ControllerError::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
            ControllerError::RemoteUnavailable { .. } => {
                (StatusCode::BAD_GATEWAY, "REMOTE_UNAVAILABLE")
            }
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self.0, code, "Request failed");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiFailure>;

#[derive(Debug, Deserialize)]
pub struct NamespaceQuery {
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub namespace: Option<String>,
    /// `text` renders the status tree instead of JSON
    pub format: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OwnerResponse {
    pub namespace: String,
    pub pod: String,
    pub workload: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevisionsResponse {
    pub namespace: String,
    pub workload: String,
    /// Newest first
    pub revisions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub revision: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScaleRequest {
    pub replicas: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub namespace: String,
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restarted_at: Option<String>,
}

impl ActionResponse {
    fn new(namespace: String, name: String, message: impl Into<String>) -> Self {
        Self {
            namespace,
            name,
            message: message.into(),
            restarted_at: None,
        }
    }
}

/// Health check: 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

async fn list_workloads(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NamespaceQuery>,
) -> ApiResult<Json<Vec<WorkloadSummary>>> {
    let deployments = state
        .controller
        .list_workloads(query.namespace.as_deref())
        .await?;
    Ok(Json(deployments.iter().map(WorkloadSummary::from).collect()))
}

async fn list_pods(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NamespaceQuery>,
) -> ApiResult<Json<Vec<PodSummary>>> {
    let pods = state.controller.list_pods(query.namespace.as_deref()).await?;
    Ok(Json(pods.iter().map(PodSummary::from).collect()))
}

async fn pod_owner(
    State(state): State<Arc<AppState>>,
    Path((namespace, pod)): Path<(String, String)>,
) -> ApiResult<Json<OwnerResponse>> {
    let object = state.controller.get_pod(&namespace, &pod).await?;
    let workload = state.controller.resolve_owning_workload(&object).await?;
    Ok(Json(OwnerResponse {
        namespace,
        pod,
        workload,
    }))
}

async fn restart_pod(
    State(state): State<Arc<AppState>>,
    Path((namespace, pod)): Path<(String, String)>,
) -> ApiResult<Json<ActionResponse>> {
    state.controller.restart_pod(&namespace, &pod).await?;
    Ok(Json(ActionResponse::new(namespace, pod, "pod deleted")))
}

async fn list_revisions(
    State(state): State<Arc<AppState>>,
    Path((namespace, workload)): Path<(String, String)>,
) -> ApiResult<Json<RevisionsResponse>> {
    let revisions = state
        .controller
        .list_revisions(&workload, &namespace)
        .await?;
    Ok(Json(RevisionsResponse {
        namespace,
        workload,
        revisions,
    }))
}

async fn rollback(
    State(state): State<Arc<AppState>>,
    Path((namespace, workload)): Path<(String, String)>,
    Json(request): Json<RollbackRequest>,
) -> ApiResult<Json<ActionResponse>> {
    state
        .controller
        .set_revision(&workload, &namespace, &request.revision)
        .await?;
    let message = format!("rolled back to revision {}", request.revision);
    Ok(Json(ActionResponse::new(namespace, workload, message)))
}

async fn scale(
    State(state): State<Arc<AppState>>,
    Path((namespace, workload)): Path<(String, String)>,
    Json(request): Json<ScaleRequest>,
) -> ApiResult<Json<ActionResponse>> {
    state
        .controller
        .scale(&workload, &namespace, request.replicas)
        .await?;
    let message = format!("scaled to {} replicas", request.replicas);
    Ok(Json(ActionResponse::new(namespace, workload, message)))
}

async fn restart_workload(
    State(state): State<Arc<AppState>>,
    Path((namespace, workload)): Path<(String, String)>,
) -> ApiResult<Json<ActionResponse>> {
    let restarted_at = state
        .controller
        .restart_workload(&workload, &namespace)
        .await?;
    let mut response = ActionResponse::new(namespace, workload, "rolling restart triggered");
    response.restarted_at = Some(restarted_at);
    Ok(Json(response))
}

async fn status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Response> {
    let snapshot = state
        .controller
        .status_snapshot(query.namespace.as_deref())
        .await?;

    let response = match query.format.as_deref() {
        Some("text") => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            snapshot.to_string(),
        )
            .into_response(),
        _ => Json(snapshot).into_response(),
    };
    Ok(response)
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/workloads", get(list_workloads))
        .route("/api/v1/pods", get(list_pods))
        .route("/api/v1/status", get(status))
        .route("/api/v1/namespaces/:namespace/pods/:pod/owner", get(pod_owner))
        .route(
            "/api/v1/namespaces/:namespace/pods/:pod/restart",
            post(restart_pod),
        )
        .route(
            "/api/v1/namespaces/:namespace/workloads/:workload/revisions",
            get(list_revisions),
        )
        .route(
            "/api/v1/namespaces/:namespace/workloads/:workload/rollback",
            post(rollback),
        )
        .route(
            "/api/v1/namespaces/:namespace/workloads/:workload/scale",
            post(scale),
        )
        .route(
            "/api/v1/namespaces/:namespace/workloads/:workload/restart",
            post(restart_workload),
        )
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
