// ABOUTME: API server bootstrap wiring config, Docker provider, manager and terminal bridge
// ABOUTME: Serves the router with CORS and request tracing, stopping all sandboxes on shutdown

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use wharf_api::{create_router, AppState};
use wharf_config::Config;
use wharf_sandbox::{DockerProvider, Provider, SandboxManager, WorkspaceFiles};
use wharf_terminal::{ShellSource, TerminalBridge, TerminalJournal};

/// Assemble shared state around a container provider
pub async fn build_state(config: &Config, provider: Arc<dyn Provider>) -> Result<AppState> {
    tokio::fs::create_dir_all(&config.sandbox.workspaces_root)
        .await
        .with_context(|| {
            format!(
                "Failed to create workspaces root {}",
                config.sandbox.workspaces_root.display()
            )
        })?;

    let manager = Arc::new(SandboxManager::new(provider, config.sandbox.clone()));

    let journal_path = config.terminal_log_path();
    let journal = TerminalJournal::open(&journal_path)
        .await
        .with_context(|| format!("Failed to open terminal journal {}", journal_path.display()))?;

    let bridge = Arc::new(TerminalBridge::new(
        Arc::clone(&manager) as Arc<dyn ShellSource>,
        Arc::new(journal),
        config.terminal_idle_timeout,
    ));
    let files = WorkspaceFiles::new(config.sandbox.workspaces_root.clone());

    Ok(AppState::new(manager, files, bridge))
}

/// Router with CORS and tracing layers applied
pub fn build_app(state: AppState, cors_origin: &str) -> Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Ok(create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}

pub async fn run_server(config: Config) -> Result<()> {
    let provider = DockerProvider::with_pull_timeout(config.sandbox.pull_timeout)
        .context("Failed to connect to Docker")?;
    if !provider.is_available().await.unwrap_or(false) {
        warn!("Docker daemon is not responding; sandbox starts will fail until it is");
    }

    let state = build_state(&config, Arc::new(provider)).await?;
    let manager = Arc::clone(&state.manager);
    let app = build_app(state, &config.cors_origin)?;

    let listener = tokio::net::TcpListener::bind((config.api_host.as_str(), config.api_port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.api_host, config.api_port))?;
    let addr: SocketAddr = listener.local_addr()?;

    info!("Wharf API listening on http://{}", addr);
    info!(
        "Sandbox ports {}..{} on {}",
        config.sandbox.port_base,
        config.sandbox.port_base as u32 + config.sandbox.port_span as u32,
        config.sandbox.public_host
    );

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown requested");
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    manager.stop_all().await;
    info!("Wharf API stopped");
    Ok(())
}
