//! One-shot command-line operations.
//!
//! Each [`CliCommand`] performs a single plugin call through the same
//! handlers the stdio server uses and returns the text to print.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::client::PluginClient;
use crate::error::CliError;
use crate::mcp::tools::{self, CreateRequest, Tool, DEFAULT_FILE_TYPE};

/// A single operation requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Show plugin status.
    Status,
    /// List the tools the stdio server exposes.
    ListTools,
    /// List open diagrams.
    ListDiagrams,
    /// Show one diagram.
    GetDiagram {
        /// Diagram id.
        id: String,
    },
    /// Replace a diagram's markup with the contents of a file.
    UpdateDiagram {
        /// Diagram id.
        id: String,
        /// File holding the new markup.
        file: PathBuf,
    },
    /// Create a diagram file in a project.
    CreateDiagram {
        /// Target project name.
        project: String,
        /// Path relative to the project root.
        path: String,
        /// `svg`, `png` or `xml`; defaults to `svg`.
        file_type: Option<String>,
        /// File holding initial markup.
        content_file: Option<PathBuf>,
    },
}

/// What the process does after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Serve JSON-RPC on stdin/stdout until EOF.
    Stdio,
    /// Run one operation and exit.
    Cli(CliCommand),
}

/// Runs `command` and returns the text to print on stdout.
///
/// # Errors
///
/// Returns an error if a file cannot be read or the plugin call fails.
pub async fn execute(command: &CliCommand, client: &PluginClient) -> Result<String, CliError> {
    match command {
        CliCommand::Status => {
            let status = client.status().await?;
            Ok(render_status(&status))
        }
        CliCommand::ListTools => Ok(render_tools()),
        CliCommand::ListDiagrams => Ok(tools::list_diagrams(client).await?),
        CliCommand::GetDiagram { id } => Ok(tools::get_diagram(client, id).await?),
        CliCommand::UpdateDiagram { id, file } => {
            let xml = read_markup(file).await?;
            Ok(tools::update_diagram(client, id, &xml).await?)
        }
        CliCommand::CreateDiagram {
            project,
            path,
            file_type,
            content_file,
        } => {
            let content = match content_file {
                Some(file) => Some(read_markup(file).await?),
                None => None,
            };
            let request = CreateRequest {
                project: project.clone(),
                path: path.clone(),
                file_type: file_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FILE_TYPE.to_string()),
                content,
            };
            Ok(tools::create_diagram(client, &request).await?)
        }
    }
}

async fn read_markup(path: &Path) -> Result<String, CliError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CliError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(CliError::ReadFile {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Renders `GET /api/status`; unknown shapes are printed as JSON.
fn render_status(status: &Value) -> String {
    let mut text = String::new();
    for (key, label) in [
        ("status", "Status"),
        ("version", "Version"),
        ("port", "Port"),
        ("openDiagrams", "Open diagrams"),
    ] {
        let Some(value) = status.get(key) else {
            continue;
        };
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if !text.is_empty() {
            text.push('\n');
        }
        let _ = write!(text, "{label}: {value}");
    }

    if text.is_empty() {
        serde_json::to_string_pretty(status).unwrap_or_else(|_| status.to_string())
    } else {
        text
    }
}

fn render_tools() -> String {
    Tool::ALL
        .iter()
        .map(|tool| format!("{}: {}", tool.name(), tool.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::ClientSettings;
    use crate::error::ToolError;

    fn offline_client() -> PluginClient {
        PluginClient::new(&ClientSettings::localhost(1)).unwrap()
    }

    #[test]
    fn status_renders_known_fields() {
        let text = render_status(&json!({
            "status": "running",
            "version": "1.2.0",
            "port": 8765,
            "openDiagrams": 2,
            "extra": true
        }));
        assert_eq!(
            text,
            "Status: running\nVersion: 1.2.0\nPort: 8765\nOpen diagrams: 2"
        );
    }

    #[test]
    fn status_falls_back_to_json() {
        let text = render_status(&json!({"healthy": true}));
        assert!(text.contains("\"healthy\": true"));
    }

    #[test]
    fn tools_listing_has_one_line_per_tool() {
        let text = render_tools();
        assert_eq!(text.lines().count(), Tool::ALL.len());
        assert!(text.starts_with("list_diagrams: "));
    }

    #[tokio::test]
    async fn list_tools_needs_no_plugin() {
        let text = execute(&CliCommand::ListTools, &offline_client())
            .await
            .unwrap();
        assert!(text.contains("update_diagram: "));
    }

    #[tokio::test]
    async fn missing_update_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("missing.drawio");
        let err = execute(
            &CliCommand::UpdateDiagram {
                id: "a1".to_string(),
                file: file.clone(),
            },
            &offline_client(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CliError::FileNotFound { .. }));
        assert_eq!(err.to_string(), format!("file not found: {}", file.display()));
    }

    #[tokio::test]
    async fn unreachable_plugin_is_an_error() {
        let err = execute(&CliCommand::ListDiagrams, &offline_client())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Tool(_)));
        assert!(!err.to_string().is_empty());
    }

    #[tokio::test]
    async fn blank_arguments_fail_without_contacting_plugin() {
        let err = execute(
            &CliCommand::GetDiagram { id: String::new() },
            &offline_client(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CliError::Tool(ToolError::InvalidParams(_))));
        assert_eq!(err.to_string(), "Missing required argument 'id'");

        let err = execute(
            &CliCommand::CreateDiagram {
                project: String::new(),
                path: String::new(),
                file_type: None,
                content_file: None,
            },
            &offline_client(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CliError::Tool(ToolError::InvalidParams(_))));
        assert_eq!(
            err.to_string(),
            "Missing required parameters: project and path"
        );
    }
}
