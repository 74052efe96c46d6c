//! HTTP API for volume provisioning.
//!
//! Routes:
//! - `POST   /api/v1/volumes` - provision a share for a volume request
//! - `DELETE /api/v1/volumes` - delete the share behind a volume descriptor
//! - `GET    /healthz`        - liveness and registered protocols

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use sfs_share::{ProvisionError, Provisioner, ShareError, VolumeDescriptor, VolumeRequest};

/// Shared state for HTTP handlers
pub struct AppState {
    /// Provisioner serving every request
    pub provisioner: Arc<Provisioner>,
    /// Fired on shutdown; ends in-flight readiness waits
    pub shutdown: CancellationToken,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiError {
    error: String,
    message: String,
}

impl ApiError {
    fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    provisioner: String,
    protocols: Vec<String>,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// HTTP status for a provisioning failure.
pub fn status_for(err: &ShareError) -> StatusCode {
    match err {
        ShareError::UnsupportedSelector
        | ShareError::InvalidSize(_)
        | ShareError::MissingShareID => StatusCode::BAD_REQUEST,
        ShareError::RemoteNotFound(_) => StatusCode::NOT_FOUND,
        ShareError::BackendNotFound(_)
        | ShareError::MalformedLocation(_)
        | ShareError::NoExportLocation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ShareError::RemoteAccessDenied(_) => StatusCode::FORBIDDEN,
        ShareError::StatusTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ShareError::RemoteUnavailable(_) => StatusCode::BAD_GATEWAY,
        ShareError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
        ShareError::RemoteCreateFailed(_) | ShareError::RemoteDeleteFailed(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: ProvisionError) -> (StatusCode, Json<ApiError>) {
    let status = status_for(err.kind());
    warn!(code = err.kind().code(), error = %err, "Request failed");
    (
        status,
        Json(ApiError::new(err.kind().code(), &err.to_string())),
    )
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/v1/volumes",
            post(provision_volume).delete(delete_volume),
        )
        .route("/healthz", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn provision_volume(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VolumeRequest>,
) -> ApiResult<(StatusCode, Json<VolumeDescriptor>)> {
    let request_id = Uuid::new_v4();
    let span = info_span!("provision_volume", %request_id, volume = %request.name);

    async move {
        info!("Provision requested");
        let descriptor = state
            .provisioner
            .provision_with_cancel(&request, &state.shutdown)
            .await
            .map_err(error_response)?;

        info!(share_id = descriptor.share_id().unwrap_or_default(), "Volume provisioned");
        Ok((StatusCode::CREATED, Json(descriptor)))
    }
    .instrument(span)
    .await
}

async fn delete_volume(
    State(state): State<Arc<AppState>>,
    Json(descriptor): Json<VolumeDescriptor>,
) -> ApiResult<StatusCode> {
    let request_id = Uuid::new_v4();
    let span = info_span!("delete_volume", %request_id, volume = %descriptor.name);

    async move {
        state
            .provisioner
            .delete(&descriptor)
            .await
            .map_err(error_response)?;

        info!("Volume deleted");
        Ok(StatusCode::NO_CONTENT)
    }
    .instrument(span)
    .await
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        provisioner: state.provisioner.config().provisioner_name.clone(),
        protocols: state.provisioner.backends().protocols(),
    })
}
