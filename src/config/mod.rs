//! Configuration file loading and port resolution.
//!
//! # Configuration File Locations
//!
//! The configuration file is optional. It is searched in the following order:
//!
//! 1. Path specified via `--config` (must exist)
//! 2. Default location (skipped silently when absent):
//!    - **Linux/macOS:** `~/.diagrams-net-mcp/config.json`
//!    - **Windows:** `%USERPROFILE%\.diagrams-net-mcp\config.json`
//!
//! # Port Resolution
//!
//! The plugin port is taken from, in order: the command line,
//! `DIAGRAMS_NET_MCP_PORT_CURRENT` (exported by the running IDE),
//! `DIAGRAMS_NET_MCP_PORT`, the configuration file, then [`DEFAULT_PORT`].

mod settings;

pub use settings::{Config, LoggingConfig, TransportMode};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Port the plugin listens on when nothing else is configured.
pub const DEFAULT_PORT: u16 = 8765;

/// Port exported by the IDE whose MCP server is currently running.
pub const ENV_CURRENT_PORT: &str = "DIAGRAMS_NET_MCP_PORT_CURRENT";

/// User-provided base port.
pub const ENV_BASE_PORT: &str = "DIAGRAMS_NET_MCP_PORT";

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.diagrams-net-mcp/`
/// - **Windows:** `%USERPROFILE%\.diagrams-net-mcp\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".diagrams-net-mcp"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads and parses the configuration file.
///
/// If `path` is `None`, the default location is tried and built-in defaults
/// are returned when no file exists there.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - Fields are invalid
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound {
                    path: p.to_path_buf(),
                });
            }
            p.to_path_buf()
        }
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(Config::default()),
        },
    };

    let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;

    let config: Config = serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.clone(),
        source: e,
    })?;

    config.validate()?;

    Ok(config)
}

/// Resolves the plugin port from the process environment.
#[must_use]
pub fn resolve_port(cli_port: Option<u16>, config_port: Option<u16>) -> u16 {
    resolve_port_with(cli_port, config_port, |key| std::env::var(key).ok())
}

/// Resolves the plugin port using `lookup` for environment variables.
pub fn resolve_port_with(
    cli_port: Option<u16>,
    config_port: Option<u16>,
    lookup: impl Fn(&str) -> Option<String>,
) -> u16 {
    if let Some(port) = cli_port {
        return port;
    }

    for key in [ENV_CURRENT_PORT, ENV_BASE_PORT] {
        let Some(raw) = lookup(key) else {
            continue;
        };
        match raw.trim().parse::<u16>() {
            Ok(port) if port != 0 => {
                tracing::debug!(variable = key, port, "Using port from environment");
                return port;
            }
            _ => tracing::warn!(variable = key, value = %raw, "Ignoring invalid port"),
        }
    }

    config_port.unwrap_or(DEFAULT_PORT)
}
