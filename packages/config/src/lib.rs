// ABOUTME: Runtime configuration for the Wharf server, sandboxes and terminal bridge
// ABOUTME: Loads settings from environment variables with validated defaults

pub mod constants;

use std::env;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use constants::*;

pub const DEFAULT_API_HOST: &str = "127.0.0.1";
pub const DEFAULT_API_PORT: u16 = 4001;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_SANDBOX_IMAGE: &str = "gitpod/openvscode-server:latest";
pub const DEFAULT_PORT_BASE: u16 = 3001;
pub const DEFAULT_PORT_SPAN: u16 = 1000;
pub const DEFAULT_INTERNAL_PORT: u16 = 3000;
pub const DEFAULT_PUBLIC_HOST: &str = "localhost";
pub const DEFAULT_ACCESS_TOKEN: &str = "wharf";
pub const DEFAULT_EXTENSION_GALLERY_URL: &str = "https://open-vsx.org/vscode/gallery";
pub const DEFAULT_PULL_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 1800;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {source}")]
    InvalidNumber {
        name: &'static str,
        #[source]
        source: ParseIntError,
    },
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
    #[error("Sandbox port range {base}+{span} overflows the port space")]
    PortRangeOverflow { base: u16, span: u16 },
    #[error("Could not determine a data directory; set {0}")]
    NoDataDir(&'static str),
}

/// Settings for sandbox provisioning
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxConfig {
    pub image: String,
    /// First host port handed out to a sandbox
    pub port_base: u16,
    /// Number of ports available starting at `port_base`
    pub port_span: u16,
    /// Port the editor service listens on inside the sandbox
    pub internal_port: u16,
    /// Host name used when building sandbox URLs
    pub public_host: String,
    /// Parent directory of the per-workspace bind mounts
    pub workspaces_root: PathBuf,
    pub access_token: String,
    pub extension_gallery_url: String,
    pub pull_timeout: Duration,
    pub stop_timeout: Duration,
}

impl SandboxConfig {
    /// Defaults rooted at the given data directory
    pub fn with_root(workspaces_root: PathBuf) -> Self {
        Self {
            image: DEFAULT_SANDBOX_IMAGE.to_string(),
            port_base: DEFAULT_PORT_BASE,
            port_span: DEFAULT_PORT_SPAN,
            internal_port: DEFAULT_INTERNAL_PORT,
            public_host: DEFAULT_PUBLIC_HOST.to_string(),
            workspaces_root,
            access_token: DEFAULT_ACCESS_TOKEN.to_string(),
            extension_gallery_url: DEFAULT_EXTENSION_GALLERY_URL.to_string(),
            pull_timeout: Duration::from_secs(DEFAULT_PULL_TIMEOUT_SECS),
            stop_timeout: Duration::from_secs(DEFAULT_STOP_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    pub cors_origin: String,
    pub data_dir: PathBuf,
    pub sandbox: SandboxConfig,
    /// `None` disables the idle timeout for terminal sessions
    pub terminal_idle_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_host = env::var(WHARF_API_HOST).unwrap_or_else(|_| DEFAULT_API_HOST.to_string());

        let api_port = parse_port(WHARF_API_PORT, DEFAULT_API_PORT)?;

        let cors_origin =
            env::var(WHARF_CORS_ORIGIN).unwrap_or_else(|_| DEFAULT_CORS_ORIGIN.to_string());

        let data_dir = match env::var(WHARF_DATA_DIR) {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .map(|home| home.join(".wharf"))
                .ok_or(ConfigError::NoDataDir(WHARF_DATA_DIR))?,
        };

        let workspaces_root = match env::var(WHARF_WORKSPACES_ROOT) {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => data_dir.join("workspaces"),
        };

        let port_base = parse_port(WHARF_SANDBOX_PORT_BASE, DEFAULT_PORT_BASE)?;
        let port_span = parse_number::<u16>(WHARF_SANDBOX_PORT_SPAN, DEFAULT_PORT_SPAN)?;
        if port_base.checked_add(port_span.saturating_sub(1)).is_none() {
            return Err(ConfigError::PortRangeOverflow {
                base: port_base,
                span: port_span,
            });
        }

        let sandbox = SandboxConfig {
            image: env::var(WHARF_SANDBOX_IMAGE)
                .unwrap_or_else(|_| DEFAULT_SANDBOX_IMAGE.to_string()),
            port_base,
            port_span,
            internal_port: parse_port(WHARF_SANDBOX_INTERNAL_PORT, DEFAULT_INTERNAL_PORT)?,
            public_host: env::var(WHARF_PUBLIC_HOST)
                .unwrap_or_else(|_| DEFAULT_PUBLIC_HOST.to_string()),
            workspaces_root,
            access_token: env::var(WHARF_ACCESS_TOKEN)
                .unwrap_or_else(|_| DEFAULT_ACCESS_TOKEN.to_string()),
            extension_gallery_url: env::var(WHARF_EXTENSION_GALLERY_URL)
                .unwrap_or_else(|_| DEFAULT_EXTENSION_GALLERY_URL.to_string()),
            pull_timeout: Duration::from_secs(parse_number(
                WHARF_IMAGE_PULL_TIMEOUT_SECS,
                DEFAULT_PULL_TIMEOUT_SECS,
            )?),
            stop_timeout: Duration::from_secs(parse_number(
                WHARF_STOP_TIMEOUT_SECS,
                DEFAULT_STOP_TIMEOUT_SECS,
            )?),
        };

        let idle_secs = parse_number(WHARF_TERMINAL_IDLE_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT_SECS)?;
        let terminal_idle_timeout = (idle_secs > 0).then(|| Duration::from_secs(idle_secs));

        debug!(
            "Loaded config: api={}:{}, image={}, ports={}..{}",
            api_host,
            api_port,
            sandbox.image,
            sandbox.port_base,
            sandbox.port_base as u32 + sandbox.port_span as u32
        );

        Ok(Config {
            api_host,
            api_port,
            cors_origin,
            data_dir,
            sandbox,
            terminal_idle_timeout,
        })
    }

    /// Path of the append-only terminal journal
    pub fn terminal_log_path(&self) -> PathBuf {
        self.data_dir.join("terminal.log")
    }
}

fn parse_number<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = ParseIntError>,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|source| ConfigError::InvalidNumber { name, source }),
        _ => Ok(default),
    }
}

fn parse_port(name: &'static str, default: u16) -> Result<u16, ConfigError> {
    let port = parse_number::<u16>(name, default)?;
    if port == 0 {
        return Err(ConfigError::PortOutOfRange(port));
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    const ALL_VARS: &[&str] = &[
        WHARF_API_HOST,
        WHARF_API_PORT,
        WHARF_CORS_ORIGIN,
        WHARF_SANDBOX_IMAGE,
        WHARF_SANDBOX_PORT_BASE,
        WHARF_SANDBOX_PORT_SPAN,
        WHARF_SANDBOX_INTERNAL_PORT,
        WHARF_PUBLIC_HOST,
        WHARF_IMAGE_PULL_TIMEOUT_SECS,
        WHARF_STOP_TIMEOUT_SECS,
        WHARF_ACCESS_TOKEN,
        WHARF_EXTENSION_GALLERY_URL,
        WHARF_DATA_DIR,
        WHARF_WORKSPACES_ROOT,
        WHARF_TERMINAL_IDLE_TIMEOUT_SECS,
    ];

    fn clear_env() {
        for var in ALL_VARS {
            env::remove_var(var);
        }
        env::set_var(WHARF_DATA_DIR, "/tmp/wharf-test");
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_env();

        let config = Config::from_env().unwrap();

        assert_eq!(config.api_host, "127.0.0.1");
        assert_eq!(config.api_port, 4001);
        assert_eq!(config.sandbox.port_base, 3001);
        assert_eq!(config.sandbox.internal_port, 3000);
        assert_eq!(config.sandbox.public_host, "localhost");
        assert_eq!(
            config.sandbox.workspaces_root,
            PathBuf::from("/tmp/wharf-test/workspaces")
        );
        assert_eq!(
            config.terminal_log_path(),
            PathBuf::from("/tmp/wharf-test/terminal.log")
        );
        assert_eq!(config.terminal_idle_timeout, Some(Duration::from_secs(1800)));

        env::remove_var(WHARF_DATA_DIR);
    }

    #[test]
    #[serial]
    fn test_config_overrides() {
        clear_env();
        env::set_var(WHARF_API_PORT, "8080");
        env::set_var(WHARF_SANDBOX_PORT_BASE, "5000");
        env::set_var(WHARF_SANDBOX_IMAGE, "alpine:latest");
        env::set_var(WHARF_WORKSPACES_ROOT, "/srv/workspaces");
        env::set_var(WHARF_TERMINAL_IDLE_TIMEOUT_SECS, "0");

        let config = Config::from_env().unwrap();

        assert_eq!(config.api_port, 8080);
        assert_eq!(config.sandbox.port_base, 5000);
        assert_eq!(config.sandbox.image, "alpine:latest");
        assert_eq!(
            config.sandbox.workspaces_root,
            PathBuf::from("/srv/workspaces")
        );
        assert_eq!(config.terminal_idle_timeout, None);

        clear_env();
        env::remove_var(WHARF_DATA_DIR);
    }

    #[test]
    #[serial]
    fn test_config_invalid_port() {
        clear_env();
        env::set_var(WHARF_API_PORT, "not-a-number");

        let result = Config::from_env();

        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidNumber {
                name: WHARF_API_PORT,
                ..
            }
        ));

        clear_env();
        env::remove_var(WHARF_DATA_DIR);
    }

    #[test]
    #[serial]
    fn test_config_port_zero() {
        clear_env();
        env::set_var(WHARF_SANDBOX_PORT_BASE, "0");

        let result = Config::from_env();

        assert!(matches!(result.unwrap_err(), ConfigError::PortOutOfRange(0)));

        clear_env();
        env::remove_var(WHARF_DATA_DIR);
    }

    #[test]
    #[serial]
    fn test_config_port_range_overflow() {
        clear_env();
        env::set_var(WHARF_SANDBOX_PORT_BASE, "65000");
        env::set_var(WHARF_SANDBOX_PORT_SPAN, "1000");

        let result = Config::from_env();

        assert!(matches!(
            result.unwrap_err(),
            ConfigError::PortRangeOverflow {
                base: 65000,
                span: 1000
            }
        ));

        clear_env();
        env::remove_var(WHARF_DATA_DIR);
    }
}
