// ABOUTME: Sandbox lifecycle manager orchestrating the registry and the container provider
// ABOUTME: Idempotent per-workspace start, best-effort stop, one-shot exec and interactive shells

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wharf_config::SandboxConfig;

use crate::error::{Result, SandboxError};
use crate::ports::{PortAllocator, PortReservation};
use crate::providers::{ContainerStatus, ExecResult, Provider, ProviderError, ShellStream};
use crate::registry::SandboxRegistry;
use crate::template::SandboxTemplate;
use crate::types::{
    is_valid_workspace_id, sandbox_name, SandboxHandle, StartResult, Workspace, WorkspaceStatus,
};

/// Command opened for interactive terminal sessions
pub const DEFAULT_SHELL: &[&str] = &["/bin/bash"];

/// Sandbox lifecycle manager
pub struct SandboxManager {
    provider: Arc<dyn Provider>,
    registry: Arc<SandboxRegistry>,
    template: SandboxTemplate,
}

impl SandboxManager {
    pub fn new(provider: Arc<dyn Provider>, config: SandboxConfig) -> Self {
        Self::with_template(provider, SandboxTemplate::new(config))
    }

    pub fn with_template(provider: Arc<dyn Provider>, template: SandboxTemplate) -> Self {
        let config = template.config();
        let allocator = PortAllocator::new(config.port_base, config.port_span);
        Self {
            provider,
            registry: Arc::new(SandboxRegistry::new(allocator)),
            template,
        }
    }

    pub fn registry(&self) -> &Arc<SandboxRegistry> {
        &self.registry
    }

    pub fn template(&self) -> &SandboxTemplate {
        &self.template
    }

    /// Start the sandbox for a workspace, or return the running one
    pub async fn start(&self, workspace_id: &str) -> Result<StartResult> {
        validate_id(workspace_id)?;
        let _guard = self.registry.lock_workspace(workspace_id).await;

        if let Some(existing) = self.registry.get(workspace_id).await {
            debug!(
                "Workspace {} already running on port {}",
                workspace_id, existing.port
            );
            return Ok(self.start_result(existing.port));
        }

        let reservation = self.registry.reserve_port().await?;
        let port = reservation.port();
        info!("Starting sandbox for workspace {} on port {}", workspace_id, port);

        // Reservation is dropped (port released) if provisioning fails
        let handle = self.provision(workspace_id, &reservation).await?;

        self.install_tools(workspace_id, &handle).await;

        let workspace = Workspace {
            id: workspace_id.to_string(),
            status: WorkspaceStatus::Running,
            port,
            sandbox: handle,
            created_at: Utc::now(),
        };
        self.registry.insert(workspace, reservation).await;

        let result = self.start_result(port);
        info!("Workspace {} available at {}", workspace_id, result.url);
        Ok(result)
    }

    async fn provision(
        &self,
        workspace_id: &str,
        reservation: &PortReservation,
    ) -> Result<SandboxHandle> {
        let name = sandbox_name(workspace_id);
        let config = self.template.config();

        self.template.prepare_host(workspace_id).await?;

        // Leftover from a previous process holding the same name
        if let Err(e) = self.provider.remove_container(&name, true).await {
            debug!("No stale sandbox {} removed: {}", name, e);
        }

        let provisioning = |source: ProviderError| SandboxError::Provisioning {
            workspace_id: workspace_id.to_string(),
            source,
        };

        let image_present = self
            .provider
            .image_exists(&config.image)
            .await
            .map_err(provisioning)?;
        if !image_present {
            info!("Image {} not present locally, pulling", config.image);
            self.provider
                .pull_image(&config.image)
                .await
                .map_err(provisioning)?;
        }

        let container_config = self
            .template
            .container_config(workspace_id, reservation.port());
        let container_id = self
            .provider
            .create_container(&container_config)
            .await
            .map_err(provisioning)?;

        if let Err(e) = self.provider.start_container(&container_id).await {
            if let Err(remove_err) = self.provider.remove_container(&container_id, true).await {
                warn!(
                    "Failed to remove unstarted sandbox {}: {}",
                    container_id, remove_err
                );
            }
            return Err(provisioning(e));
        }

        Ok(SandboxHandle { container_id, name })
    }

    async fn install_tools(&self, workspace_id: &str, handle: &SandboxHandle) {
        for command in self.template.tool_install_commands() {
            let tool = command.last().cloned().unwrap_or_default();
            match self
                .provider
                .exec_command(&handle.container_id, command, None)
                .await
            {
                Ok(result) if result.exit_code == 0 => {
                    debug!("Installed {} in workspace {}", tool, workspace_id);
                }
                Ok(result) => warn!(
                    "Installing {} in workspace {} exited with {}: {}",
                    tool,
                    workspace_id,
                    result.exit_code,
                    result.output_text().trim()
                ),
                Err(e) => warn!(
                    "Failed to install {} in workspace {}: {}",
                    tool, workspace_id, e
                ),
            }
        }
    }

    /// Stop the sandbox for a workspace.
    ///
    /// Engine failures are logged and swallowed; the registry entry is
    /// always removed.
    pub async fn stop(&self, workspace_id: &str) -> Result<()> {
        validate_id(workspace_id)?;
        let _guard = self.registry.lock_workspace(workspace_id).await;

        let target = match self.registry.get(workspace_id).await {
            Some(workspace) => workspace.sandbox.container_id,
            None => sandbox_name(workspace_id),
        };

        let timeout_secs = self.template.config().stop_timeout.as_secs();
        match self.provider.stop_container(&target, timeout_secs).await {
            Ok(()) => info!("Stopped sandbox {} for workspace {}", target, workspace_id),
            Err(e) => warn!(
                "Failed to stop sandbox {} for workspace {}: {}",
                target, workspace_id, e
            ),
        }

        self.registry.remove(workspace_id).await;
        Ok(())
    }

    /// Stop every registered sandbox
    pub async fn stop_all(&self) {
        let workspaces = self.registry.list().await;
        if workspaces.is_empty() {
            return;
        }
        info!("Stopping {} sandbox(es)", workspaces.len());
        for workspace in workspaces {
            if let Err(e) = self.stop(&workspace.id).await {
                warn!("Failed to stop workspace {}: {}", workspace.id, e);
            }
        }
    }

    /// Run a one-shot command inside a registered workspace's sandbox
    pub async fn exec(&self, workspace_id: &str, command: Vec<String>) -> Result<ExecResult> {
        validate_id(workspace_id)?;
        let workspace = self
            .registry
            .get(workspace_id)
            .await
            .ok_or_else(|| SandboxError::NotFound(workspace_id.to_string()))?;

        debug!("Exec in workspace {}: {:?}", workspace_id, command);
        let result = self
            .provider
            .exec_command(&workspace.sandbox.container_id, command, None)
            .await?;
        Ok(result)
    }

    pub async fn get(&self, workspace_id: &str) -> Option<Workspace> {
        self.registry.get(workspace_id).await
    }

    pub async fn list(&self) -> Vec<Workspace> {
        self.registry.list().await
    }

    /// Resolve a workspace's sandbox and confirm the engine reports it running.
    ///
    /// Falls back to the derived name for sandboxes not in the registry.
    pub async fn verify_running(&self, workspace_id: &str) -> Result<SandboxHandle> {
        validate_id(workspace_id)?;
        let handle = match self.registry.get(workspace_id).await {
            Some(workspace) => workspace.sandbox,
            None => {
                let name = sandbox_name(workspace_id);
                SandboxHandle {
                    container_id: name.clone(),
                    name,
                }
            }
        };

        let info = match self.provider.get_container_info(&handle.container_id).await {
            Ok(info) => info,
            Err(ProviderError::NotFound(_)) => {
                return Err(SandboxError::NotFound(workspace_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if info.status != ContainerStatus::Running {
            debug!(
                "Sandbox {} for workspace {} is {:?}",
                handle.name, workspace_id, info.status
            );
            return Err(SandboxError::NotRunning(workspace_id.to_string()));
        }

        Ok(SandboxHandle {
            container_id: info.id,
            name: handle.name,
        })
    }

    /// Open an interactive shell attached over a TTY
    pub async fn open_shell(&self, handle: &SandboxHandle) -> Result<ShellStream> {
        let command = DEFAULT_SHELL.iter().map(|s| s.to_string()).collect();
        let stream = self
            .provider
            .attach_shell(&handle.container_id, command)
            .await?;
        debug!("Opened shell in sandbox {}", handle.name);
        Ok(stream)
    }

    fn start_result(&self, port: u16) -> StartResult {
        StartResult {
            url: self.template.url_for(port),
            port,
        }
    }
}

fn validate_id(workspace_id: &str) -> Result<()> {
    if is_valid_workspace_id(workspace_id) {
        Ok(())
    } else {
        Err(SandboxError::InvalidWorkspaceId(workspace_id.to_string()))
    }
}
