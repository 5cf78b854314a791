//! JSON-RPC 2.0 message types for the MCP stdio protocol.
//!
//! # Message Types
//!
//! - **Request**: any message that is not a notification, answered exactly
//!   once
//! - **Response**: a reply to a request (success or error)
//! - **Notification**: an id-less `notifications/*` (or `initialized`)
//!   message, never answered
//!
//! The reply mirrors the request id exactly: a value is echoed, an explicit
//! `"id": null` is answered with `"id": null`, and an absent `id` member is
//! answered without one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The MCP protocol version this implementation supports.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name for capability negotiation.
pub const SERVER_NAME: &str = "diagrams-net-intellij-mcp";

/// Error code for failures reported by the plugin itself.
pub const REMOTE_ERROR_CODE: i32 = -32000;

/// A JSON-RPC 2.0 request ID.
///
/// Numbers are kept as [`serde_json::Number`] so they are echoed exactly as
/// received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(serde_json::Number),
    /// String request ID.
    String(String),
    /// Explicit `null`.
    Null,
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => f.write_str("null"),
        }
    }
}

/// A JSON-RPC 2.0 request message.
#[derive(Debug, Clone)]
pub struct JsonRpcRequest {
    /// Request identifier; `None` when the message had no `id` member.
    pub id: Option<RequestId>,

    /// The method to invoke.
    pub method: String,

    /// Optional parameters for the method.
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Creates a request, mostly useful in tests.
    #[must_use]
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 notification message (incoming).
#[derive(Debug, Clone)]
pub struct JsonRpcNotification {
    /// The notification method.
    pub method: String,

    /// Optional parameters for the notification.
    pub params: Option<Value>,
}

/// A successful JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The request ID this response corresponds to; omitted when the
    /// request had none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// The result of the method call.
    pub result: Value,
}

impl JsonRpcResponse {
    /// Creates a new success response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Value is not const-compatible
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result,
        }
    }
}

/// Standard JSON-RPC 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received by the server.
    ParseError,
    /// The JSON sent is not a valid Request object.
    InvalidRequest,
    /// The method does not exist or is not available.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
    /// Server-defined error.
    ServerError(i32),
}

impl ErrorCode {
    /// Returns the numeric code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError(code) => code,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorData {
    /// The error code.
    pub code: i32,

    /// A short description of the error.
    pub message: String,

    /// Additional information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorData {
    /// Creates a new error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }
}

/// A JSON-RPC 2.0 error response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The request ID this error corresponds to; omitted when the request
    /// had none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// The error details.
    pub error: JsonRpcErrorData,
}

impl JsonRpcError {
    /// Creates a new error response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // JsonRpcErrorData contains String
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorData) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error,
        }
    }

    /// Creates a parse error response. The id is unknown, so it is `null`.
    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(
            Some(RequestId::Null),
            JsonRpcErrorData::with_message(ErrorCode::ParseError, message),
        )
    }

    /// Creates an invalid request error response.
    #[must_use]
    pub fn invalid_request(id: Option<RequestId>, reason: &str) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(
                ErrorCode::InvalidRequest,
                format!("Invalid Request: {reason}"),
            ),
        )
    }

    /// Creates a method not found error response.
    #[must_use]
    pub fn method_not_found(id: Option<RequestId>, method: &str) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(
                ErrorCode::MethodNotFound,
                format!("Unknown method: {method}"),
            ),
        )
    }

    /// Creates an unknown tool error response.
    #[must_use]
    pub fn unknown_tool(id: Option<RequestId>, name: &str) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(ErrorCode::MethodNotFound, format!("Unknown tool: {name}")),
        )
    }

    /// Creates an invalid params error response.
    #[must_use]
    pub fn invalid_params(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(ErrorCode::InvalidParams, message),
        )
    }

    /// Creates an internal error response.
    #[must_use]
    pub fn internal_error(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(ErrorCode::InternalError, message),
        )
    }

    /// Creates an error response for a failure reported by the plugin.
    #[must_use]
    pub fn remote_error(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(ErrorCode::ServerError(REMOTE_ERROR_CODE), message),
        )
    }
}

/// An incoming message that could be either a request or notification.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// A request expecting a response.
    Request(JsonRpcRequest),
    /// A notification (no response expected).
    Notification(JsonRpcNotification),
}

impl IncomingMessage {
    /// Returns the method name of this message.
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Request(req) => &req.method,
            Self::Notification(notif) => &notif.method,
        }
    }

    /// Returns `true` for requests.
    #[must_use]
    pub const fn expects_response(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    /// Returns the request ID if this is a request that carried one.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(req) => req.id.as_ref(),
            Self::Notification(_) => None,
        }
    }
}

/// Why a line could not be turned into a message.
#[derive(Debug, Clone)]
pub enum MessageError {
    /// Nothing to answer: not JSON, not an object, an unusable id, or an
    /// invalid notification. Logged and skipped.
    Unanswerable(String),
    /// Invalid request whose id could be recovered; answered with this error.
    Invalid(JsonRpcError),
}

impl std::fmt::Display for MessageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unanswerable(reason) => f.write_str(reason),
            Self::Invalid(error) => f.write_str(&error.error.message),
        }
    }
}

/// Reads the `id` member; `None` if it is not a string, number or null.
fn salvage_id(value: &Value) -> Option<RequestId> {
    match value {
        Value::Null => Some(RequestId::Null),
        Value::Number(n) => Some(RequestId::Number(n.clone())),
        Value::String(s) => Some(RequestId::String(s.clone())),
        _ => None,
    }
}

/// Methods that are never answered when sent without an id.
fn is_notification_method(method: &str) -> bool {
    method.starts_with("notifications/") || method == "initialized"
}

fn check_envelope(obj: &Map<String, Value>) -> Result<(String, Option<Value>), &'static str> {
    if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err("jsonrpc field must be \"2.0\"");
    }

    let method = match obj.get("method") {
        Some(Value::String(m)) if !m.is_empty() => m.clone(),
        Some(Value::String(_)) => return Err("method field cannot be empty"),
        Some(_) => return Err("method field must be a string"),
        None => return Err("missing method field"),
    };

    let params = match obj.get("params") {
        None | Some(Value::Null) => None,
        Some(p @ (Value::Object(_) | Value::Array(_))) => Some(p.clone()),
        Some(_) => return Err("params must be an object or array"),
    };

    Ok((method, params))
}

/// Parses one line into an incoming message.
///
/// # Errors
///
/// Returns a [`MessageError`] telling the caller whether the failure can be
/// answered.
pub fn parse_message(json: &str) -> Result<IncomingMessage, MessageError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| MessageError::Unanswerable(format!("invalid JSON: {e}")))?;

    let Value::Object(obj) = value else {
        return Err(MessageError::Unanswerable(
            "message is not a JSON object".to_string(),
        ));
    };

    let id = match obj.get("id") {
        None => None,
        Some(raw) => Some(salvage_id(raw).ok_or_else(|| {
            MessageError::Unanswerable("id must be a string, number or null".to_string())
        })?),
    };

    match (check_envelope(&obj), id) {
        (Ok((method, params)), None) if is_notification_method(&method) => {
            Ok(IncomingMessage::Notification(JsonRpcNotification { method, params }))
        }
        (Ok((method, params)), id) => {
            Ok(IncomingMessage::Request(JsonRpcRequest { id, method, params }))
        }
        (Err(reason), Some(id)) => Err(MessageError::Invalid(JsonRpcError::invalid_request(
            Some(id),
            reason,
        ))),
        (Err(reason), None) => Err(MessageError::Unanswerable(format!(
            "invalid notification: {reason}"
        ))),
    }
}
