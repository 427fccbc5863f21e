// ABOUTME: Library half of the wharf binary
// ABOUTME: Server bootstrap, HTTP client for subcommands and logging setup

pub mod client;
pub mod server;

pub use client::{ClientError, WharfClient};
pub use server::{build_app, build_state, run_server};

/// Initialise structured logging; `RUST_LOG` overrides the default `info` filter
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();
}
