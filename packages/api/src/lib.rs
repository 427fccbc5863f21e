// ABOUTME: HTTP API layer for Wharf providing REST endpoints and the terminal WebSocket
// ABOUTME: Integration layer wiring the sandbox manager, file gateway and terminal bridge into axum

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use wharf_sandbox::{SandboxManager, WorkspaceFiles};
use wharf_terminal::TerminalBridge;

pub mod error;
pub mod file_handlers;
pub mod health;
pub mod response;
pub mod terminal_handlers;
pub mod workspace_handlers;

pub use error::{ApiResult, AppError};
pub use response::ApiResponse;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SandboxManager>,
    pub files: Arc<WorkspaceFiles>,
    pub bridge: Arc<TerminalBridge>,
}

impl AppState {
    pub fn new(
        manager: Arc<SandboxManager>,
        files: WorkspaceFiles,
        bridge: Arc<TerminalBridge>,
    ) -> Self {
        Self {
            manager,
            files: Arc::new(files),
            bridge,
        }
    }
}

/// Creates the workspace API router
pub fn create_workspaces_router() -> Router<AppState> {
    Router::new()
        .route("/", get(workspace_handlers::list_workspaces))
        .route("/{id}", get(workspace_handlers::get_workspace))
        .route("/{id}/start", post(workspace_handlers::start_workspace))
        .route("/{id}/stop", post(workspace_handlers::stop_workspace))
        .route("/{id}/exec", post(workspace_handlers::exec_workspace))
        // File gateway
        .route("/{id}/files", get(file_handlers::list_files))
        .route(
            "/{id}/files/content",
            get(file_handlers::read_file).put(file_handlers::write_file),
        )
}

/// Creates the full application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_check))
        .nest("/api/workspaces", create_workspaces_router())
        .route("/ws/terminal/{id}", get(terminal_handlers::terminal_ws))
        .with_state(state)
}
