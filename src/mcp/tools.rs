//! Tool registry and handlers.
//!
//! Every tool is a [`Tool`] variant. `tools/list` is generated from
//! [`Tool::ALL`] and `tools/call` routes through [`Tool::from_name`], so the
//! advertised set and the routable set cannot drift apart.
//!
//! Handlers translate arguments into one plugin API call and render the
//! reply as text. They never panic; every failure is a [`ToolError`].

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::client::{diagram_path, PluginClient, DIAGRAMS_PATH};
use crate::diagram::{CreateOutcome, DiagramDetail, DiagramList, UpdateOutcome};
use crate::error::{ClientError, ToolError};

/// File types the plugin can create.
pub const FILE_TYPES: [&str; 3] = ["svg", "png", "xml"];

/// File type used when `create_diagram` is called without one.
pub const DEFAULT_FILE_TYPE: &str = "svg";

/// A tool definition for the tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a successful tool call.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
}

impl ToolCallResult {
    /// Creates a text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
        }
    }

    /// Concatenated text of all content items.
    #[must_use]
    pub fn into_text(self) -> String {
        self.content
            .into_iter()
            .map(|c| match c {
                ToolContent::Text { text } => text,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Arguments of `create_diagram`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    /// Target project name.
    pub project: String,
    /// Path relative to the project root.
    pub path: String,
    /// One of [`FILE_TYPES`].
    pub file_type: String,
    /// Initial markup; the plugin writes an empty diagram when absent.
    pub content: Option<String>,
}

/// The tools this bridge exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// `list_diagrams`
    ListDiagrams,
    /// `get_diagram_by_id`
    GetDiagramById,
    /// `update_diagram`
    UpdateDiagram,
    /// `create_diagram`
    CreateDiagram,
}

impl Tool {
    /// Every tool, in `tools/list` order.
    pub const ALL: [Self; 4] = [
        Self::ListDiagrams,
        Self::GetDiagramById,
        Self::UpdateDiagram,
        Self::CreateDiagram,
    ];

    /// Wire name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ListDiagrams => "list_diagrams",
            Self::GetDiagramById => "get_diagram_by_id",
            Self::UpdateDiagram => "update_diagram",
            Self::CreateDiagram => "create_diagram",
        }
    }

    /// Looks a tool up by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Description shown to MCP clients.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ListDiagrams => {
                "List all open diagrams in the IDE. Returns diagram IDs, file names, paths, and project information."
            }
            Self::GetDiagramById => {
                "Get diagram content and metadata by ID. Returns the diagram XML (both raw and decoded mxGraphModel format), file path, and other metadata."
            }
            Self::UpdateDiagram => {
                "Update diagram content and save changes. Accepts either decoded mxGraphModel XML or encoded mxfile XML. Changes appear immediately in the IDE editor."
            }
            Self::CreateDiagram => {
                "Create a new diagram file in a project and open it in the IDE editor."
            }
        }
    }

    /// JSON Schema of the tool's arguments.
    #[must_use]
    pub fn input_schema(self) -> Value {
        let id = json!({
            "type": "string",
            "description": "The diagram ID (obtained from list_diagrams)"
        });
        match self {
            Self::ListDiagrams => json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            Self::GetDiagramById => json!({
                "type": "object",
                "properties": { "id": id },
                "required": ["id"]
            }),
            Self::UpdateDiagram => json!({
                "type": "object",
                "properties": {
                    "id": id,
                    "xml": {
                        "type": "string",
                        "description": "The new diagram XML content (mxGraphModel or mxfile format)"
                    }
                },
                "required": ["id", "xml"]
            }),
            Self::CreateDiagram => json!({
                "type": "object",
                "properties": {
                    "project": {
                        "type": "string",
                        "description": "Name of the open project to create the diagram in"
                    },
                    "path": {
                        "type": "string",
                        "description": "Path relative to the project root, e.g. docs/flow.drawio.svg"
                    },
                    "fileType": {
                        "type": "string",
                        "enum": FILE_TYPES,
                        "default": DEFAULT_FILE_TYPE,
                        "description": "File format of the new diagram"
                    },
                    "content": {
                        "type": "string",
                        "description": "Optional initial diagram XML"
                    }
                },
                "required": ["project", "path"]
            }),
        }
    }

    /// Definition for `tools/list`.
    #[must_use]
    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.name(),
            description: self.description(),
            input_schema: self.input_schema(),
        }
    }

    /// Definitions of every tool.
    #[must_use]
    pub fn definitions() -> Vec<ToolDefinition> {
        Self::ALL.into_iter().map(Self::definition).collect()
    }

    /// Runs the tool with JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidParams`] for bad arguments, otherwise the
    /// classified plugin failure.
    pub async fn call(
        self,
        client: &PluginClient,
        arguments: &Map<String, Value>,
    ) -> Result<ToolCallResult, ToolError> {
        let text = match self {
            Self::ListDiagrams => list_diagrams(client).await?,
            Self::GetDiagramById => {
                let id = required_str(arguments, "id")
                    .ok_or_else(|| missing_argument("id"))?;
                get_diagram(client, id).await?
            }
            Self::UpdateDiagram => {
                let id = required_str(arguments, "id")
                    .ok_or_else(|| missing_argument("id"))?;
                let xml = required_str(arguments, "xml")
                    .ok_or_else(|| missing_argument("xml"))?;
                update_diagram(client, id, xml).await?
            }
            Self::CreateDiagram => {
                let request = create_request(arguments)?;
                create_diagram(client, &request).await?
            }
        };
        Ok(ToolCallResult::text(text))
    }
}

fn required_str<'a>(arguments: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn missing_argument(name: &str) -> ToolError {
    ToolError::InvalidParams(format!("Missing required argument '{name}'"))
}

fn missing_project_or_path() -> ToolError {
    ToolError::InvalidParams("Missing required parameters: project and path".to_string())
}

fn create_request(arguments: &Map<String, Value>) -> Result<CreateRequest, ToolError> {
    let (Some(project), Some(path)) = (
        required_str(arguments, "project"),
        required_str(arguments, "path"),
    ) else {
        return Err(missing_project_or_path());
    };

    let file_type = match arguments.get("fileType") {
        None | Some(Value::Null) => DEFAULT_FILE_TYPE,
        Some(Value::String(t)) if FILE_TYPES.contains(&t.as_str()) => t.as_str(),
        Some(other) => {
            return Err(ToolError::InvalidParams(format!(
                "Invalid fileType {other}: expected one of {}",
                FILE_TYPES.join(", ")
            )))
        }
    };

    Ok(CreateRequest {
        project: project.to_string(),
        path: path.to_string(),
        file_type: file_type.to_string(),
        content: required_str(arguments, "content").map(ToString::to_string),
    })
}

/// Decodes a 2xx body into a typed record.
fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ToolError> {
    serde_json::from_value(value).map_err(|e| {
        ToolError::Transport(format!("Unexpected response from diagrams.net plugin: {e}"))
    })
}

fn classify(fallback: &'static str) -> impl Fn(ClientError) -> ToolError {
    move |err| {
        tracing::warn!(error = %err, "Plugin call failed");
        ToolError::from_client(&err, fallback)
    }
}

/// `GET /api/diagrams`, rendered as a list.
///
/// # Errors
///
/// Returns the classified plugin failure.
pub async fn list_diagrams(client: &PluginClient) -> Result<String, ToolError> {
    let body = client
        .get(DIAGRAMS_PATH)
        .await
        .map_err(classify("Failed to list diagrams"))?;
    let list: DiagramList = decode(body)?;
    Ok(list.render())
}

/// `GET /api/diagrams/{id}`, rendered with metadata and markup.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] for a blank id, otherwise the
/// classified plugin failure.
pub async fn get_diagram(client: &PluginClient, id: &str) -> Result<String, ToolError> {
    if id.trim().is_empty() {
        return Err(missing_argument("id"));
    }
    let body = client
        .get(&diagram_path(id))
        .await
        .map_err(classify("Diagram not found"))?;
    let mut detail: DiagramDetail = decode(body)?;
    if detail.summary.id.is_empty() {
        detail.summary.id = id.to_string();
    }
    Ok(detail.render())
}

/// `PUT /api/diagrams/{id}` with `{"xml": xml}`.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] for a blank id or markup, otherwise
/// the classified plugin failure.
pub async fn update_diagram(client: &PluginClient, id: &str, xml: &str) -> Result<String, ToolError> {
    if id.trim().is_empty() {
        return Err(missing_argument("id"));
    }
    if xml.trim().is_empty() {
        return Err(missing_argument("xml"));
    }
    let body = client
        .put(&diagram_path(id), &json!({ "xml": xml }))
        .await
        .map_err(classify("Failed to update diagram"))?;
    let outcome: UpdateOutcome = decode(body)?;
    Ok(outcome.render(id))
}

/// `POST /api/diagrams`.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] for a blank project or path,
/// otherwise the classified plugin failure.
pub async fn create_diagram(
    client: &PluginClient,
    request: &CreateRequest,
) -> Result<String, ToolError> {
    if request.project.trim().is_empty() || request.path.trim().is_empty() {
        return Err(missing_project_or_path());
    }
    let mut payload = json!({
        "project": request.project,
        "path": request.path,
        "fileType": request.file_type,
    });
    if let Some(content) = &request.content {
        payload["content"] = Value::String(content.clone());
    }

    let body = client
        .post(DIAGRAMS_PATH, &payload)
        .await
        .map_err(classify("Failed to create diagram"))?;
    let outcome: CreateOutcome = decode(body)?;
    Ok(outcome.render(&request.path))
}
