//! HTTP API route handlers.
//!
//! All endpoints return JSON. The caller is identified by the
//! `x-owner-id` header; handlers never see another owner's monitors.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::engine::commands::MonitorService;
use crate::types::{Monitor, MonitorError, MonitorId};

pub const OWNER_HEADER: &str = "x-owner-id";

pub type AppState = Arc<MonitorService>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AddMonitorRequest {
    pub product_url: String,
    #[serde(default)]
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub min_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStateResponse {
    pub id: MonitorId,
    pub active: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps domain errors onto HTTP status codes.
#[derive(Debug)]
pub struct ApiError(MonitorError);

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MonitorError::Validation(_) => StatusCode::BAD_REQUEST,
            MonitorError::NotFound { .. } => StatusCode::NOT_FOUND,
            other => {
                error!(error = %other, "API request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn owner_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| MonitorError::Validation(format!("missing {OWNER_HEADER} header")).into())
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/monitors
pub async fn list_monitors(
    State(svc): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Monitor>>, ApiError> {
    let owner = owner_id(&headers)?;
    Ok(Json(svc.list_monitors(&owner).await?))
}

/// POST /api/monitors
pub async fn add_monitor(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddMonitorRequest>,
) -> Result<(StatusCode, Json<Monitor>), ApiError> {
    let owner = owner_id(&headers)?;
    let monitor = svc
        .add_monitor(&owner, &req.product_url, req.max_price, req.min_price)
        .await?;
    Ok((StatusCode::CREATED, Json(monitor)))
}

/// DELETE /api/monitors/:id
pub async fn remove_monitor(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<MonitorId>,
) -> Result<StatusCode, ApiError> {
    let owner = owner_id(&headers)?;
    svc.remove_monitor(id, &owner).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/monitors/:id/pause
pub async fn pause_monitor(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<MonitorId>,
) -> Result<Json<MonitorStateResponse>, ApiError> {
    let owner = owner_id(&headers)?;
    svc.pause_monitor(id, &owner).await?;
    Ok(Json(MonitorStateResponse { id, active: false }))
}

/// POST /api/monitors/:id/resume
pub async fn resume_monitor(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<MonitorId>,
) -> Result<Json<MonitorStateResponse>, ApiError> {
    let owner = owner_id(&headers)?;
    svc.resume_monitor(id, &owner).await?;
    Ok(Json(MonitorStateResponse { id, active: true }))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
