// ABOUTME: Error types for sandbox lifecycle operations
// ABOUTME: Separates missing sandboxes, provisioning failures and invalid input

use crate::providers::ProviderError;
use thiserror::Error;

/// Main error type for sandbox operations
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Workspace id contains characters that cannot form a container name
    #[error("Invalid workspace id: {0}")]
    InvalidWorkspaceId(String),

    /// No sandbox is registered for the workspace
    #[error("Sandbox not found for workspace: {0}")]
    NotFound(String),

    /// Sandbox exists but the engine reports it is not running
    #[error("Sandbox for workspace {0} is not running")]
    NotRunning(String),

    /// Every port in the configured range is taken
    #[error("No free sandbox ports in range {base}..{end}")]
    PortsExhausted { base: u16, end: u32 },

    /// Image pull, create or start failed
    #[error("Failed to provision sandbox for workspace {workspace_id}: {source}")]
    Provisioning {
        workspace_id: String,
        #[source]
        source: ProviderError,
    },

    /// Other container engine failures
    #[error("Container engine error: {0}")]
    Provider(#[from] ProviderError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results that return SandboxError
pub type Result<T> = std::result::Result<T, SandboxError>;
