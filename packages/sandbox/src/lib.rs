// ABOUTME: Workspace sandbox lifecycle on top of a container engine
// ABOUTME: Port allocation, registry, Docker provider and the host-side workspace file gateway

pub mod error;
pub mod files;
pub mod manager;
pub mod ports;
pub mod providers;
pub mod registry;
pub mod template;
pub mod types;

pub use error::{Result, SandboxError};
pub use files::{FileEntry, FileError, WorkspaceFiles};
pub use manager::{SandboxManager, DEFAULT_SHELL};
pub use ports::{PortAllocator, PortReservation};
pub use providers::{
    ContainerConfig, ContainerInfo, ContainerStatus, DockerProvider, ExecResult, Provider,
    ProviderError, ShellStream,
};
pub use registry::SandboxRegistry;
pub use template::SandboxTemplate;
pub use types::{
    is_valid_workspace_id, sandbox_name, SandboxHandle, StartResult, Workspace, WorkspaceStatus,
};
