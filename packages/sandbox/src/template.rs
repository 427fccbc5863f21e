// ABOUTME: Fixed sandbox template applied to every workspace container
// ABOUTME: Builds the container config, injected editor settings and the pre-installed tool set

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use wharf_config::SandboxConfig;

use crate::providers::{ContainerConfig, PortMapping, VolumeMount};
use crate::types::sandbox_name;

/// Mount point of the workspace directory inside the sandbox
pub const WORKSPACE_MOUNT: &str = "/home/workspace";

/// Where the injected editor settings land inside the sandbox
pub const SETTINGS_MOUNT: &str = "/home/.openvscode-server/data/Machine/settings.json";

/// Editor binary used to install tools
pub const EDITOR_BIN: &str = "/home/.openvscode-server/bin/openvscode-server";

/// Extensions installed into every sandbox after start
pub const DEFAULT_TOOLS: &[&str] = &[
    "esbenp.prettier-vscode",
    "dbaeumer.vscode-eslint",
    "ms-python.python",
    "rust-lang.rust-analyzer",
];

pub const WORKSPACE_LABEL: &str = "wharf.workspace_id";

const EDITOR_SETTINGS: &str = r#"{
  "telemetry.telemetryLevel": "off",
  "update.mode": "none",
  "extensions.autoCheckUpdates": false,
  "workbench.startupEditor": "none",
  "terminal.integrated.defaultProfile.linux": "bash",
  "files.autoSave": "afterDelay"
}
"#;

/// A file written on the host and mounted read-only into the sandbox
#[derive(Debug, Clone, PartialEq)]
pub struct InjectedFile {
    pub file_name: &'static str,
    pub container_path: &'static str,
    pub contents: &'static str,
}

#[derive(Debug, Clone)]
pub struct SandboxTemplate {
    config: SandboxConfig,
    injected_files: Vec<InjectedFile>,
    tools: Vec<String>,
}

impl SandboxTemplate {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            injected_files: vec![InjectedFile {
                file_name: "settings.json",
                container_path: SETTINGS_MOUNT,
                contents: EDITOR_SETTINGS,
            }],
            tools: DEFAULT_TOOLS.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Replace the tool set (an empty list skips installation)
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    /// Host directory bind-mounted as the workspace
    pub fn workspace_dir(&self, workspace_id: &str) -> PathBuf {
        self.config.workspaces_root.join(workspace_id)
    }

    /// Host directory holding injected configuration files
    pub fn config_dir(&self, workspace_id: &str) -> PathBuf {
        self.config
            .workspaces_root
            .join(".config")
            .join(workspace_id)
    }

    pub fn url_for(&self, port: u16) -> String {
        format!("http://{}:{}", self.config.public_host, port)
    }

    /// Fixed environment of every sandbox
    pub fn environment(&self) -> HashMap<String, String> {
        let gallery = serde_json::json!({
            "serviceUrl": self.config.extension_gallery_url,
            "itemUrl": self.config.extension_gallery_url.replace("/gallery", "/item"),
        });

        HashMap::from([
            ("DISABLE_TELEMETRY".to_string(), "true".to_string()),
            ("VSCODE_TELEMETRY_DISABLED".to_string(), "1".to_string()),
            (
                "CONNECTION_TOKEN".to_string(),
                self.config.access_token.clone(),
            ),
            ("EXTENSIONS_GALLERY".to_string(), gallery.to_string()),
        ])
    }

    /// Write the workspace directory and injected files on the host
    pub async fn prepare_host(&self, workspace_id: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.workspace_dir(workspace_id)).await?;

        let config_dir = self.config_dir(workspace_id);
        tokio::fs::create_dir_all(&config_dir).await?;
        for file in &self.injected_files {
            let path = config_dir.join(file.file_name);
            tokio::fs::write(&path, file.contents).await?;
            debug!("Wrote injected file {}", path.display());
        }
        Ok(())
    }

    /// Container configuration for one workspace bound to `host_port`
    pub fn container_config(&self, workspace_id: &str, host_port: u16) -> ContainerConfig {
        let mut volumes = vec![VolumeMount {
            host_path: path_string(&self.workspace_dir(workspace_id)),
            container_path: WORKSPACE_MOUNT.to_string(),
            readonly: false,
        }];
        let config_dir = self.config_dir(workspace_id);
        volumes.extend(self.injected_files.iter().map(|file| VolumeMount {
            host_path: path_string(&config_dir.join(file.file_name)),
            container_path: file.container_path.to_string(),
            readonly: true,
        }));

        let internal_port = self.config.internal_port.to_string();

        ContainerConfig {
            image: self.config.image.clone(),
            name: sandbox_name(workspace_id),
            env_vars: self.environment(),
            volumes,
            ports: vec![PortMapping {
                host_port,
                container_port: self.config.internal_port,
                protocol: "tcp".to_string(),
            }],
            command: Some(vec![
                "--host".to_string(),
                "0.0.0.0".to_string(),
                "--port".to_string(),
                internal_port,
                "--connection-token".to_string(),
                self.config.access_token.clone(),
            ]),
            working_dir: Some(WORKSPACE_MOUNT.to_string()),
            labels: HashMap::from([(WORKSPACE_LABEL.to_string(), workspace_id.to_string())]),
            auto_remove: true,
        }
    }

    /// One-shot commands that install the tool set
    pub fn tool_install_commands(&self) -> Vec<Vec<String>> {
        self.tools
            .iter()
            .map(|tool| {
                vec![
                    EDITOR_BIN.to_string(),
                    "--install-extension".to_string(),
                    tool.clone(),
                ]
            })
            .collect()
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn template(root: &Path) -> SandboxTemplate {
        SandboxTemplate::new(SandboxConfig::with_root(root.to_path_buf()))
    }

    #[test]
    fn test_container_config_for_workspace() {
        let template = template(Path::new("/srv/wharf"));
        let config = template.container_config("ws-1", 3001);

        assert_eq!(config.name, "wharf-ws-1");
        assert!(config.auto_remove);
        assert_eq!(
            config.ports,
            vec![PortMapping {
                host_port: 3001,
                container_port: 3000,
                protocol: "tcp".to_string(),
            }]
        );
        assert_eq!(config.volumes[0].host_path, "/srv/wharf/ws-1");
        assert_eq!(config.volumes[0].container_path, WORKSPACE_MOUNT);
        assert!(!config.volumes[0].readonly);
        assert_eq!(
            config.volumes[1].host_path,
            "/srv/wharf/.config/ws-1/settings.json"
        );
        assert!(config.volumes[1].readonly);
        assert_eq!(config.labels[WORKSPACE_LABEL], "ws-1");
    }

    #[test]
    fn test_environment_is_fixed() {
        let template = template(Path::new("/srv/wharf"));
        let env = template.environment();

        assert_eq!(env["DISABLE_TELEMETRY"], "true");
        assert_eq!(env["CONNECTION_TOKEN"], "wharf");

        let gallery: serde_json::Value = serde_json::from_str(&env["EXTENSIONS_GALLERY"]).unwrap();
        assert_eq!(
            gallery["serviceUrl"],
            "https://open-vsx.org/vscode/gallery"
        );
        assert_eq!(gallery["itemUrl"], "https://open-vsx.org/vscode/item");
    }

    #[test]
    fn test_url_for_port() {
        let template = template(Path::new("/srv/wharf"));
        assert_eq!(template.url_for(3001), "http://localhost:3001");
    }

    #[test]
    fn test_tool_install_commands() {
        let template =
            template(Path::new("/srv/wharf")).with_tools(vec!["rust-lang.rust-analyzer".into()]);

        assert_eq!(
            template.tool_install_commands(),
            vec![vec![
                EDITOR_BIN.to_string(),
                "--install-extension".to_string(),
                "rust-lang.rust-analyzer".to_string(),
            ]]
        );
    }

    #[tokio::test]
    async fn test_prepare_host_writes_injected_files() {
        let dir = tempfile::tempdir().unwrap();
        let template = template(dir.path());

        template.prepare_host("ws-1").await.unwrap();

        assert!(dir.path().join("ws-1").is_dir());
        let settings =
            std::fs::read_to_string(dir.path().join(".config/ws-1/settings.json")).unwrap();
        assert!(settings.contains("\"telemetry.telemetryLevel\": \"off\""));
    }
}
