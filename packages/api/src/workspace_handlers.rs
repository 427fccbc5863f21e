// ABOUTME: HTTP request handlers for workspace sandbox lifecycle operations
// ABOUTME: Start, stop, inspect, list and one-shot exec

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use wharf_sandbox::{StartResult, Workspace};

use crate::error::{ApiResult, AppError};
use crate::response::ApiResponse;
use crate::AppState;

/// List registered workspaces
pub async fn list_workspaces(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<Workspace>>>> {
    let workspaces = state.manager.list().await;
    Ok(Json(ApiResponse::success(workspaces)))
}

/// Start (or return the already running) sandbox for a workspace
pub async fn start_workspace(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<StartResult>>> {
    info!("Start requested for workspace {}", id);
    let result = state.manager.start(&id).await?;
    Ok(Json(ApiResponse::success(result)))
}

pub async fn stop_workspace(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    info!("Stop requested for workspace {}", id);
    state.manager.stop(&id).await?;
    Ok(Json(ApiResponse::success(())))
}

pub async fn get_workspace(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Workspace>>> {
    state
        .manager
        .get(&id)
        .await
        .map(|workspace| Json(ApiResponse::success(workspace)))
        .ok_or_else(|| AppError::NotFound(format!("workspace {}", id)))
}

/// Request body for one-shot command execution
#[derive(Debug, Deserialize)]
pub struct ExecRequest {
    pub command: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecResponse {
    pub output: String,
    pub exit_code: i64,
}

pub async fn exec_workspace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ExecRequest>,
) -> ApiResult<Json<ApiResponse<ExecResponse>>> {
    if request.command.is_empty() {
        return Err(AppError::Validation("command must not be empty".to_string()));
    }

    let result = state.manager.exec(&id, request.command).await?;
    Ok(Json(ApiResponse::success(ExecResponse {
        output: result.output_text(),
        exit_code: result.exit_code,
    })))
}
