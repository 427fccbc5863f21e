// ABOUTME: Core type definitions for workspaces and their sandboxes
// ABOUTME: Defines workspace status, sandbox handles and start results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of every derived sandbox name
pub const SANDBOX_NAME_PREFIX: &str = "wharf-";

/// Longest accepted workspace id
pub const MAX_WORKSPACE_ID_LEN: usize = 64;

/// Workspace lifecycle status
///
/// Advisory bookkeeping only; it is not re-probed against the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceStatus {
    Pending,
    Starting,
    Running,
    Stopped,
    Error,
}

impl std::fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkspaceStatus::Pending => "pending",
            WorkspaceStatus::Starting => "starting",
            WorkspaceStatus::Running => "running",
            WorkspaceStatus::Stopped => "stopped",
            WorkspaceStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Reference to the container backing a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxHandle {
    pub container_id: String,
    pub name: String,
}

/// A workspace with a sandbox believed to be running
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub status: WorkspaceStatus,
    pub port: u16,
    pub sandbox: SandboxHandle,
    pub created_at: DateTime<Utc>,
}

/// Returned by a successful start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResult {
    pub url: String,
    pub port: u16,
}

/// Deterministic container name for a workspace
pub fn sandbox_name(workspace_id: &str) -> String {
    format!("{}{}", SANDBOX_NAME_PREFIX, workspace_id)
}

/// Workspace ids become container names and directory names, so only
/// `[A-Za-z0-9_-]` is accepted
pub fn is_valid_workspace_id(workspace_id: &str) -> bool {
    !workspace_id.is_empty()
        && workspace_id.len() <= MAX_WORKSPACE_ID_LEN
        && workspace_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
