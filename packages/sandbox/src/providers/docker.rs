// ABOUTME: Local Docker backend for workspace sandboxes
// ABOUTME: Uses bollard to create, inspect, exec into and tear down workspace containers

use super::{
    ContainerConfig, ContainerInfo, ContainerStatus, ExecResult, Provider, ProviderError, Result,
    ShellStream,
};
use async_trait::async_trait;
use bollard::{
    container::{
        Config, CreateContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
        StopContainerOptions,
    },
    errors::Error as BollardError,
    exec::{CreateExecOptions, StartExecOptions, StartExecResults},
    image::CreateImageOptions,
    Docker,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use wharf_config::DEFAULT_PULL_TIMEOUT_SECS;

/// Label marking containers created by Wharf
pub const MANAGED_LABEL: &str = "wharf.managed";

pub struct DockerProvider {
    docker: Docker,
    pull_timeout: Duration,
}

impl DockerProvider {
    /// Connect using the local socket or `DOCKER_HOST`
    pub fn new() -> Result<Self> {
        Self::with_pull_timeout(Duration::from_secs(DEFAULT_PULL_TIMEOUT_SECS))
    }

    /// Connect with a bound on how long a single image pull may take
    pub fn with_pull_timeout(pull_timeout: Duration) -> Result<Self> {
        let docker = Docker::connect_with_defaults()
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        Ok(Self::from_client(docker, pull_timeout))
    }

    pub fn from_client(docker: Docker, pull_timeout: Duration) -> Self {
        Self {
            docker,
            pull_timeout,
        }
    }

    fn to_bollard_config(config: &ContainerConfig) -> Config<String> {
        let mut labels = config.labels.clone();
        labels.insert(MANAGED_LABEL.to_string(), "true".to_string());

        let mut exposed_ports = HashMap::new();
        let mut port_bindings = HashMap::new();

        for port in &config.ports {
            let container_port = format!("{}/{}", port.container_port, port.protocol);
            exposed_ports.insert(container_port.clone(), HashMap::new());

            port_bindings.insert(
                container_port,
                Some(vec![bollard::models::PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some(port.host_port.to_string()),
                }]),
            );
        }

        let binds: Vec<String> = config
            .volumes
            .iter()
            .map(|mount| {
                let mode = if mount.readonly { "ro" } else { "rw" };
                format!("{}:{}:{}", mount.host_path, mount.container_path, mode)
            })
            .collect();

        let host_config = bollard::models::HostConfig {
            binds: Some(binds),
            port_bindings: if port_bindings.is_empty() {
                None
            } else {
                Some(port_bindings)
            },
            auto_remove: Some(config.auto_remove),
            ..Default::default()
        };

        Config {
            image: Some(config.image.clone()),
            cmd: config.command.clone(),
            env: Some(env_list(&config.env_vars)),
            working_dir: config.working_dir.clone(),
            labels: Some(labels),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        }
    }

    /// Restarting counts as running; anything unrecognised is surfaced as an error status
    fn convert_status(state: &str) -> ContainerStatus {
        match state.to_lowercase().as_str() {
            "running" | "restarting" => ContainerStatus::Running,
            "created" => ContainerStatus::Created,
            "paused" => ContainerStatus::Paused,
            "removing" => ContainerStatus::Removing,
            "exited" => ContainerStatus::Stopped,
            "dead" => ContainerStatus::Dead,
            other => ContainerStatus::Error(format!("unrecognised container state '{}'", other)),
        }
    }

    fn map_error(container_id: &str, e: BollardError) -> ProviderError {
        match e {
            BollardError::DockerResponseServerError {
                status_code: 404, ..
            } => ProviderError::NotFound(container_id.to_string()),
            other => ProviderError::ContainerError(other.to_string()),
        }
    }
}

fn env_list(vars: &HashMap<String, String>) -> Vec<String> {
    vars.iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect()
}

fn parse_timestamp(raw: Option<&String>) -> Option<chrono::DateTime<chrono::Utc>> {
    raw.and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

/// Container port to host port, from keys like `3000/tcp`
fn published_ports(
    port_map: &HashMap<String, Option<Vec<bollard::models::PortBinding>>>,
) -> HashMap<u16, u16> {
    port_map
        .iter()
        .filter_map(|(key, bindings)| {
            let container_port = key.split('/').next()?.parse::<u16>().ok()?;
            let host_port = bindings
                .as_ref()?
                .first()?
                .host_port
                .as_ref()?
                .parse::<u16>()
                .ok()?;
            Some((container_port, host_port))
        })
        .collect()
}

fn log_bytes(log: LogOutput) -> Vec<u8> {
    match log {
        LogOutput::StdOut { message }
        | LogOutput::StdErr { message }
        | LogOutput::Console { message }
        | LogOutput::StdIn { message } => message.to_vec(),
    }
}

#[async_trait]
impl Provider for DockerProvider {
    async fn is_available(&self) -> Result<bool> {
        if let Err(e) = self.docker.ping().await {
            warn!("Docker daemon did not answer ping: {}", e);
            return Ok(false);
        }
        Ok(true)
    }

    async fn create_container(&self, config: &ContainerConfig) -> Result<String> {
        let options = CreateContainerOptions {
            name: config.name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), Self::to_bollard_config(config))
            .await
            .map_err(|e| ProviderError::ContainerError(e.to_string()))?;

        info!("Created container {} ({})", config.name, response.id);
        Ok(response.id)
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        debug!("Starting container {}", container_id);

        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Self::map_error(container_id, e))
    }

    async fn stop_container(&self, container_id: &str, timeout_secs: u64) -> Result<()> {
        info!("Stopping container {} with {}s grace", container_id, timeout_secs);

        let options = StopContainerOptions {
            t: i64::try_from(timeout_secs).unwrap_or(i64::MAX),
        };

        match self
            .docker
            .stop_container(container_id, Some(options))
            .await
        {
            Ok(_) => Ok(()),
            // 304: not running
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                debug!("Container {} was not running", container_id);
                Ok(())
            }
            Err(e) => Err(Self::map_error(container_id, e)),
        }
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()> {
        debug!("Removing container {} (force={})", container_id, force);

        let options = RemoveContainerOptions {
            force,
            v: true,
            ..Default::default()
        };

        self.docker
            .remove_container(container_id, Some(options))
            .await
            .map_err(|e| Self::map_error(container_id, e))
    }

    async fn get_container_info(&self, container_id: &str) -> Result<ContainerInfo> {
        let inspect = self
            .docker
            .inspect_container(container_id, None)
            .await
            .map_err(|e| Self::map_error(container_id, e))?;

        let state = inspect.state.as_ref().ok_or_else(|| {
            ProviderError::ContainerError(format!("No state reported for {}", container_id))
        })?;

        let status = state
            .status
            .as_ref()
            .map(|s| Self::convert_status(s.as_ref()))
            .unwrap_or_else(|| ContainerStatus::Error("state missing".to_string()));

        let ports = inspect
            .network_settings
            .as_ref()
            .and_then(|ns| ns.ports.as_ref())
            .map(published_ports)
            .unwrap_or_default();

        let name = inspect
            .name
            .as_deref()
            .unwrap_or(container_id)
            .trim_start_matches('/')
            .to_string();

        Ok(ContainerInfo {
            id: inspect.id.clone().unwrap_or_else(|| container_id.to_string()),
            name,
            status,
            ports,
            created_at: parse_timestamp(inspect.created.as_ref()).unwrap_or_else(chrono::Utc::now),
            started_at: parse_timestamp(state.started_at.as_ref()),
        })
    }

    async fn exec_command(
        &self,
        container_id: &str,
        command: Vec<String>,
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<ExecResult> {
        debug!("exec in {}: {:?}", container_id, command);

        let exec_config = CreateExecOptions {
            cmd: Some(command),
            env: env_vars.as_ref().map(env_list),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(container_id, exec_config)
            .await
            .map_err(|e| Self::map_error(container_id, e))?;

        let StartExecResults::Attached {
            output: mut stream, ..
        } = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| ProviderError::ExecError(e.to_string()))?
        else {
            return Err(ProviderError::ExecError(format!(
                "exec in {} started detached",
                container_id
            )));
        };

        let mut output = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ProviderError::StreamError(e.to_string()))?;
            output.extend_from_slice(&log_bytes(chunk));
        }

        let exit_code = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| ProviderError::ExecError(e.to_string()))?
            .exit_code
            .unwrap_or(0);

        Ok(ExecResult { exit_code, output })
    }

    async fn attach_shell(&self, container_id: &str, command: Vec<String>) -> Result<ShellStream> {
        debug!("Attaching shell in {}: {:?}", container_id, command);

        let exec_config = CreateExecOptions {
            cmd: Some(command),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(true),
            env: Some(vec!["TERM=xterm-256color".to_string()]),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(container_id, exec_config)
            .await
            .map_err(|e| Self::map_error(container_id, e))?;

        let options = StartExecOptions {
            detach: false,
            tty: true,
            ..Default::default()
        };

        match self
            .docker
            .start_exec(&exec.id, Some(options))
            .await
            .map_err(|e| ProviderError::ExecError(e.to_string()))?
        {
            StartExecResults::Attached { output, input } => Ok(ShellStream {
                output: output
                    .map(|chunk| {
                        chunk
                            .map(log_bytes)
                            .map_err(|e| ProviderError::StreamError(e.to_string()))
                    })
                    .boxed(),
                input,
            }),
            StartExecResults::Detached => Err(ProviderError::ExecError(
                "Interactive exec was detached; no stream available".to_string(),
            )),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        info!("Pulling {} (limit {:?})", image, self.pull_timeout);

        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        let mut progress = self.docker.create_image(Some(options), None, None);

        let pull = async {
            while let Some(update) = progress.next().await {
                let update = update.map_err(|e| {
                    ProviderError::ImageError(format!("Pull of {} failed: {}", image, e))
                })?;
                if let Some(error) = update.error {
                    return Err(ProviderError::ImageError(format!(
                        "Pull of {} failed: {}",
                        image, error
                    )));
                }
                if let Some(status) = update.status {
                    debug!("{}: {}", image, status);
                }
            }
            Ok(())
        };

        tokio::time::timeout(self.pull_timeout, pull)
            .await
            .map_err(|_| {
                ProviderError::ImageError(format!(
                    "Pull of {} did not finish within {:?}",
                    image, self.pull_timeout
                ))
            })??;

        info!("Pulled {}", image);
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(ProviderError::ImageError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{PortMapping, VolumeMount};

    #[test]
    fn test_container_config_conversion() {
        let config = ContainerConfig {
            image: "alpine:latest".to_string(),
            name: "wharf-ws-1".to_string(),
            env_vars: HashMap::from([("FOO".to_string(), "bar".to_string())]),
            volumes: vec![VolumeMount {
                host_path: "/tmp/host".to_string(),
                container_path: "/home/workspace".to_string(),
                readonly: false,
            }],
            ports: vec![PortMapping {
                host_port: 3001,
                container_port: 3000,
                protocol: "tcp".to_string(),
            }],
            command: None,
            working_dir: Some("/home/workspace".to_string()),
            labels: HashMap::new(),
            auto_remove: true,
        };

        let bollard_config = DockerProvider::to_bollard_config(&config);

        assert_eq!(bollard_config.image, Some("alpine:latest".to_string()));
        assert_eq!(bollard_config.env, Some(vec!["FOO=bar".to_string()]));

        let labels = bollard_config.labels.unwrap();
        assert_eq!(labels.get(MANAGED_LABEL).map(String::as_str), Some("true"));

        let host_config = bollard_config.host_config.unwrap();
        assert_eq!(host_config.auto_remove, Some(true));
        assert_eq!(
            host_config.binds,
            Some(vec!["/tmp/host:/home/workspace:rw".to_string()])
        );

        let bindings = host_config.port_bindings.unwrap();
        let binding = bindings["3000/tcp"].as_ref().unwrap();
        assert_eq!(binding[0].host_port.as_deref(), Some("3001"));
    }

    #[test]
    fn test_published_ports_skips_unbound() {
        let port_map = HashMap::from([
            (
                "3000/tcp".to_string(),
                Some(vec![bollard::models::PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some("3004".to_string()),
                }]),
            ),
            ("8080/tcp".to_string(), None),
        ]);

        assert_eq!(published_ports(&port_map), HashMap::from([(3000, 3004)]));
    }

    #[test]
    fn test_convert_status() {
        assert_eq!(
            DockerProvider::convert_status("running"),
            ContainerStatus::Running
        );
        assert_eq!(
            DockerProvider::convert_status("EXITED"),
            ContainerStatus::Stopped
        );
        assert!(matches!(
            DockerProvider::convert_status("bogus"),
            ContainerStatus::Error(_)
        ));
    }
}
