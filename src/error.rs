//! Error types for diagrams-net-mcp-bridge.
//!
//! Each concern gets its own enum. Only `main` turns these into exit codes;
//! the stdio loop turns [`ToolError`] into JSON-RPC error objects.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors from a single call to the plugin HTTP API.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The plugin could not be reached (refused, unreachable, DNS).
    #[error("cannot connect to diagrams.net plugin at {url}: is the IDE running with the MCP server enabled?")]
    Connect {
        /// Requested URL.
        url: String,
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The plugin did not answer within the configured timeout.
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout {
        /// Requested URL.
        url: String,
        /// The configured total timeout.
        timeout: Duration,
    },

    /// The plugin answered with a non-2xx status.
    #[error("{}", status_display(*.status, .reason, .message.as_deref()))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status.
        reason: String,
        /// Message extracted from the error body, if any.
        message: Option<String>,
    },

    /// A 2xx response body was not valid JSON.
    #[error("invalid JSON in response from {url}")]
    Decode {
        /// Requested URL.
        url: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Any other failure while building or sending the request.
    #[error("request to {url} failed")]
    Request {
        /// Requested URL.
        url: String,
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },
}

fn status_display(status: u16, reason: &str, message: Option<&str>) -> String {
    message.map_or_else(|| format!("HTTP {status} {reason}"), ToString::to_string)
}

/// Failure of a tool call, already classified by JSON-RPC error category.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Missing or malformed tool arguments.
    #[error("{0}")]
    InvalidParams(String),

    /// The plugin reported an application-level failure.
    #[error("{0}")]
    Remote(String),

    /// The plugin could not be reached or answered garbage.
    #[error("{0}")]
    Transport(String),
}

impl ToolError {
    /// Classifies a client error. `fallback` is used when the plugin
    /// rejected the call without saying why.
    #[must_use]
    pub fn from_client(err: &ClientError, fallback: &str) -> Self {
        match err {
            ClientError::Status {
                message: Some(message),
                ..
            } => Self::Remote(message.clone()),
            ClientError::Status {
                status, reason, ..
            } => Self::Remote(format!("{fallback} (HTTP {status} {reason})")),
            other => Self::Transport(error_chain(other)),
        }
    }
}

/// Errors reported by the single-shot CLI front-end.
#[derive(Error, Debug)]
pub enum CliError {
    /// A markup file given on the command line does not exist.
    #[error("file not found: {}", .path.display())]
    FileNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// A markup file exists but could not be read.
    #[error("failed to read {}", .path.display())]
    ReadFile {
        /// The unreadable path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The plugin call failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The tool call failed.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Renders an error together with its `source()` chain on one line.
#[must_use]
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
