//! HTTP API for the orchestrator.
//!
//! Authentication is an external collaborator; the owner id arrives in
//! the `x-user-id` header placed there by the fronting auth layer.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tryon_core::{
    AssetId, ErrorDetail, GarmentCategory, Task, TaskId, TaskState, TaskTiming, TryOnError,
    TryOnMode, UserId,
};

use crate::orchestrator::{Orchestrator, SubmitRequest};

/// Create the HTTP router.
pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/v1/tryon", post(submit))
        .route("/v1/tryon/:id", get(status).delete(delete_task))
        .route("/v1/tryon/:id/retry", post(retry))
        .route("/v1/tryon/:id/cancel", post(cancel))
        .route("/v1/tryon/:id/download", get(download))
        .route("/health", get(health_check))
        .with_state(orchestrator)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Request body for task submission.
#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub model_asset_id: String,
    pub garment_asset_ids: Vec<String>,
    pub garment_category: GarmentCategory,
    #[serde(default)]
    pub mode: TryOnMode,
    #[serde(default)]
    pub hd_mode: bool,
}

/// Task representation returned by the API.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: String,
    pub job_id: String,
    pub state: TaskState,
    pub progress: u8,
    pub mode: TryOnMode,
    pub garment_category: GarmentCategory,
    pub hd_mode: bool,
    pub retry_count: u32,
    pub inputs: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub timing: TaskTiming,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id.to_string(),
            job_id: task.job_id.to_string(),
            state: task.state,
            progress: task.progress,
            mode: task.mode,
            garment_category: task.garment_category,
            hd_mode: task.hd_mode,
            retry_count: task.retry_count,
            inputs: serde_json::json!({
                "model_asset_id": task.inputs.model_asset_id,
                "garment_asset_ids": task.inputs.garment_asset_ids,
                "model_image_url": task.inputs.model_image_url,
                "garment_image_urls": task.inputs.garment_image_urls,
            }),
            result: task.result.as_ref().map(|r| {
                serde_json::json!({
                    "result_asset_id": r.result_asset_id,
                    "result_image_url": r.result_image_url,
                    "quality_score": r.quality_score,
                    "processing_secs": r.processing_secs,
                })
            }),
            error: task.error_detail,
            timing: task.timing,
        }
    }
}

/// API error envelope with a stable code.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Domain(TryOnError),
}

impl From<TryOnError> for ApiError {
    fn from(e: TryOnError) -> Self {
        Self::Domain(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "missing x-user-id header".to_string(),
            ),
            Self::Domain(e) => {
                let status = match e {
                    TryOnError::TaskNotFound(_)
                    | TryOnError::AssetNotFound(_)
                    | TryOnError::AssetFileMissing(_)
                    | TryOnError::ResultNotAvailable => StatusCode::NOT_FOUND,
                    TryOnError::AssetNotValid(_)
                    | TryOnError::GarmentCardinality { .. }
                    | TryOnError::InvalidStateTransition { .. }
                    | TryOnError::RetryLimitExceeded => StatusCode::BAD_REQUEST,
                    TryOnError::ProviderRejected(_) | TryOnError::ProviderUnavailable(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                    TryOnError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.code(), e.to_string())
            }
        };

        let body = serde_json::json!({
            "success": false,
            "error": { "code": code, "message": message },
        });
        (status, Json(body)).into_response()
    }
}

/// Extract the owner id placed in headers by the auth layer.
fn owner_from(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(UserId::new)
        .ok_or(ApiError::Unauthorized)
}

async fn submit(
    State(orchestrator): State<Arc<Orchestrator>>,
    headers: HeaderMap,
    Json(body): Json<SubmitBody>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_from(&headers)?;
    debug!(owner = %owner, mode = %body.mode, "Submission request");

    let task = orchestrator
        .submit(SubmitRequest {
            owner,
            model_asset_id: AssetId::new(body.model_asset_id),
            garment_asset_ids: body.garment_asset_ids.into_iter().map(AssetId::new).collect(),
            garment_category: body.garment_category,
            mode: body.mode,
            hd_mode: body.hd_mode,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

async fn status(
    State(orchestrator): State<Arc<Orchestrator>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let owner = owner_from(&headers)?;
    let task = orchestrator.status(&TaskId::new(id), &owner).await?;
    Ok(Json(TaskResponse::from(task)))
}

async fn retry(
    State(orchestrator): State<Arc<Orchestrator>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let owner = owner_from(&headers)?;
    let task = orchestrator.retry(&TaskId::new(id), &owner).await?;
    Ok(Json(TaskResponse::from(task)))
}

async fn cancel(
    State(orchestrator): State<Arc<Orchestrator>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let owner = owner_from(&headers)?;
    let task = orchestrator.cancel(&TaskId::new(id), &owner).await?;
    Ok(Json(TaskResponse::from(task)))
}

async fn delete_task(
    State(orchestrator): State<Arc<Orchestrator>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner = owner_from(&headers)?;
    orchestrator.delete(&TaskId::new(id), &owner).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn download(
    State(orchestrator): State<Arc<Orchestrator>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let owner = owner_from(&headers)?;
    let result = orchestrator.download(&TaskId::new(id), &owner).await?;

    let headers = [
        (header::CONTENT_TYPE, result.mime_type.clone()),
        (header::CONTENT_LENGTH, result.bytes.len().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", result.file_name),
        ),
    ];
    Ok((headers, result.bytes).into_response())
}
