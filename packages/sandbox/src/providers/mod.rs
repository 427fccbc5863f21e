// ABOUTME: Container provider trait and shared types for sandbox backends
// ABOUTME: Defines the abstract interface the lifecycle manager drives the container engine through

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncWrite;

pub mod docker;

pub use docker::DockerProvider;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Container not found: {0}")]
    NotFound(String),

    #[error("Container error: {0}")]
    ContainerError(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Exec error: {0}")]
    ExecError(String),

    #[error("Stream error: {0}")]
    StreamError(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Container configuration for creating sandboxes
#[derive(Debug, Clone, Default)]
pub struct ContainerConfig {
    pub image: String,
    pub name: String,
    pub env_vars: HashMap<String, String>,
    pub volumes: Vec<VolumeMount>,
    pub ports: Vec<PortMapping>,
    pub command: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub labels: HashMap<String, String>,
    /// Remove the container as soon as it stops
    pub auto_remove: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeMount {
    pub host_path: String,
    pub container_path: String,
    pub readonly: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: String, // tcp or udp
}

/// Container runtime information
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub status: ContainerStatus,
    pub ports: HashMap<u16, u16>, // container_port -> host_port
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Stopped,
    Removing,
    Dead,
    Error(String),
}

/// Result of a one-shot command; stdout and stderr are interleaved in arrival order
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub exit_code: i64,
    pub output: Vec<u8>,
}

impl ExecResult {
    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Duplex stream of an interactive exec attached to a pseudo-terminal
pub struct ShellStream {
    /// Bytes produced by the command, in order
    pub output: BoxStream<'static, Result<Vec<u8>>>,
    /// Stdin of the command; shutting it down delivers EOF
    pub input: Pin<Box<dyn AsyncWrite + Send>>,
}

impl std::fmt::Debug for ShellStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellStream").finish_non_exhaustive()
    }
}

/// Provider trait for sandbox container backends
#[async_trait]
pub trait Provider: Send + Sync {
    /// Check if the provider is reachable
    async fn is_available(&self) -> Result<bool>;

    /// Create (but do not start) a container, returning its id
    async fn create_container(&self, config: &ContainerConfig) -> Result<String>;

    /// Start a created container
    async fn start_container(&self, container_id: &str) -> Result<()>;

    /// Stop a running container
    async fn stop_container(&self, container_id: &str, timeout_secs: u64) -> Result<()>;

    /// Remove a container
    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()>;

    /// Inspect a container by id or name
    async fn get_container_info(&self, container_id: &str) -> Result<ContainerInfo>;

    /// Run a command to completion and capture its combined output
    async fn exec_command(
        &self,
        container_id: &str,
        command: Vec<String>,
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<ExecResult>;

    /// Open an interactive command with stdin attached over a TTY
    async fn attach_shell(&self, container_id: &str, command: Vec<String>) -> Result<ShellStream>;

    /// Pull an image
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// Check if an image exists locally
    async fn image_exists(&self, image: &str) -> Result<bool>;
}
