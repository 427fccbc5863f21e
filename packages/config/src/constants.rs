// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Wharf

// API Server Configuration
pub const WHARF_API_HOST: &str = "WHARF_API_HOST";
pub const WHARF_API_PORT: &str = "WHARF_API_PORT";
pub const WHARF_CORS_ORIGIN: &str = "WHARF_CORS_ORIGIN";

// Sandbox Configuration
pub const WHARF_SANDBOX_IMAGE: &str = "WHARF_SANDBOX_IMAGE";
pub const WHARF_SANDBOX_PORT_BASE: &str = "WHARF_SANDBOX_PORT_BASE";
pub const WHARF_SANDBOX_PORT_SPAN: &str = "WHARF_SANDBOX_PORT_SPAN";
pub const WHARF_SANDBOX_INTERNAL_PORT: &str = "WHARF_SANDBOX_INTERNAL_PORT";
pub const WHARF_PUBLIC_HOST: &str = "WHARF_PUBLIC_HOST";
pub const WHARF_IMAGE_PULL_TIMEOUT_SECS: &str = "WHARF_IMAGE_PULL_TIMEOUT_SECS";
pub const WHARF_STOP_TIMEOUT_SECS: &str = "WHARF_STOP_TIMEOUT_SECS";

// Injected sandbox environment
pub const WHARF_ACCESS_TOKEN: &str = "WHARF_ACCESS_TOKEN";
pub const WHARF_EXTENSION_GALLERY_URL: &str = "WHARF_EXTENSION_GALLERY_URL";

// Storage Paths
pub const WHARF_DATA_DIR: &str = "WHARF_DATA_DIR";
pub const WHARF_WORKSPACES_ROOT: &str = "WHARF_WORKSPACES_ROOT";

// Terminal Bridge
pub const WHARF_TERMINAL_IDLE_TIMEOUT_SECS: &str = "WHARF_TERMINAL_IDLE_TIMEOUT_SECS";

// System Environment Variables
pub const HOME: &str = "HOME";
pub const USERPROFILE: &str = "USERPROFILE"; // Windows
