// ABOUTME: HTTP request handlers for the workspace file gateway
// ABOUTME: Path-scoped listing, reading and writing under a workspace directory

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use wharf_sandbox::FileEntry;

use crate::error::ApiResult;
use crate::response::ApiResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileContent {
    pub path: String,
    pub content: String,
}

pub async fn list_files(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<ApiResponse<Vec<FileEntry>>>> {
    debug!("Listing '{}' in workspace {}", query.path, id);
    let entries = state.files.list(&id, &query.path).await?;
    Ok(Json(ApiResponse::success(entries)))
}

pub async fn read_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<ApiResponse<FileContent>>> {
    let content = state.files.read(&id, &query.path).await?;
    Ok(Json(ApiResponse::success(FileContent {
        path: query.path,
        content,
    })))
}

pub async fn write_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<FileContent>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state
        .files
        .write(&id, &request.path, &request.content)
        .await?;
    Ok(Json(ApiResponse::success(())))
}
