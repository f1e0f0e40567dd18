use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::install::InstallRequest;
use crate::store::{BatchId, InstallStatus};

use super::AppState;
use super::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstallBody {
    #[serde(default)]
    sudo_password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartedBody {
    success: bool,
    installation_id: BatchId,
    total_apps: usize,
    status_url: String,
}

#[derive(Debug, Serialize)]
pub(super) struct StatusBody {
    status: InstallStatus,
    progress: u8,
    total: usize,
    error: Option<String>,
}

/// `POST /api/lists/:list_id/install`
pub(super) async fn start_install(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Path(list_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let caller = state.authorize(&headers)?;
    // An unreadable body carries no password.
    let body: InstallBody = serde_json::from_slice(&body).unwrap_or_default();
    tracing::info!(user = %caller.user_id, list = %list_id, "install request");

    let started = state
        .manager()
        .begin(InstallRequest {
            user_id: caller.user_id,
            device_id: caller.device_id,
            list_id,
            password: body.sudo_password.unwrap_or_default(),
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(StartedBody {
            success: true,
            installation_id: started.id,
            total_apps: started.total_apps,
            status_url: format!("/api/installations/{}/status", started.id),
        }),
    )
        .into_response())
}

/// `GET /api/installations/:id/status`
pub(super) async fn installation_status(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<StatusBody>, ApiError> {
    let caller = state.authorize(&headers)?;
    let id = parse_id(&id)?;
    let record = state
        .manager()
        .status(id, &caller.user_id)
        .await
        .map_err(|err| ApiError::internal("Status check failed", "STATUS_FAILED", err))?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(StatusBody {
        status: record.status,
        progress: record.progress,
        total: record.apps_count,
        error: record.error,
    }))
}

/// `POST /api/installations/:id/cancel`
pub(super) async fn cancel_installation(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let caller = state.authorize(&headers)?;
    let id = parse_id(&id)?;
    let found = state
        .manager()
        .cancel(id, &caller.user_id)
        .await
        .map_err(|err| ApiError::internal("Failed to cancel installation", "CANCEL_FAILED", err))?;
    if !found {
        return Err(ApiError::NotFound);
    }
    Ok(Json(json!({ "success": true })))
}

/// `GET /api/health`
pub(super) async fn health(Extension(state): Extension<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "platform": state.manager().platform().tag(),
    }))
}

/// Ids that are not numbers cannot exist.
fn parse_id(raw: &str) -> Result<BatchId, ApiError> {
    raw.trim().parse().map_err(|_| ApiError::NotFound)
}
