//! MCP bridge server: the stdio loop and the method dispatcher.
//!
//! The bridge is stateless. Every line is read, dispatched, answered and
//! flushed before the next one is read. In [`TransportMode::Rest`] requests
//! are dispatched here and translated into REST calls; in
//! [`TransportMode::Passthrough`] they are relayed verbatim to the plugin's
//! `/mcp` endpoint.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::client::PluginClient;
use crate::config::TransportMode;
use crate::error::{error_chain, ToolError};
use crate::mcp::protocol::{
    parse_message, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, MessageError, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::tools::Tool;
use crate::mcp::transport::{InputLine, StdioTransport};

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
}

/// Tool-specific capabilities. The tool list never changes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Routes parsed requests to handlers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: PluginClient,
}

impl Dispatcher {
    /// Creates a dispatcher calling the plugin through `client`.
    #[must_use]
    pub const fn new(client: PluginClient) -> Self {
        Self { client }
    }

    /// Handles one request. Exactly one of success or error is returned,
    /// carrying the request id as received.
    ///
    /// # Errors
    ///
    /// Returns the JSON-RPC error to send back to the client.
    pub async fn handle_request(
        &self,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        match req.method.as_str() {
            "initialize" => Ok(Self::handle_initialize(req)),
            "tools/list" => Ok(Self::handle_tools_list(req)),
            "tools/call" => self.handle_tools_call(req).await,
            "ping" => Ok(Self::handle_ping(req)),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(req: &JsonRpcRequest) -> JsonRpcResponse {
        if let Some(client) = req
            .params
            .as_ref()
            .and_then(|p| p.get("clientInfo"))
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
        {
            tracing::info!(client, "MCP client connected");
        }

        let result = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default(),
        });

        JsonRpcResponse::success(req.id.clone(), result)
    }

    /// Handles the tools/list request.
    fn handle_tools_list(req: &JsonRpcRequest) -> JsonRpcResponse {
        let result = json!({
            "tools": Tool::definitions(),
        });

        JsonRpcResponse::success(req.id.clone(), result)
    }

    /// Handles the tools/call request.
    async fn handle_tools_call(
        &self,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        let params: ToolCallParams = match &req.params {
            Some(p @ Value::Object(_)) => serde_json::from_value(p.clone()).map_err(|e| {
                JsonRpcError::invalid_params(
                    req.id.clone(),
                    format!("Invalid tool call params: {e}"),
                )
            })?,
            Some(_) => {
                return Err(JsonRpcError::invalid_params(
                    req.id.clone(),
                    "Tool call params must be an object",
                ))
            }
            None => {
                return Err(JsonRpcError::invalid_params(
                    req.id.clone(),
                    "Missing tool call params",
                ))
            }
        };

        let arguments = match params.arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => {
                return Err(JsonRpcError::invalid_params(
                    req.id.clone(),
                    "Tool arguments must be an object",
                ))
            }
        };

        let Some(tool) = Tool::from_name(&params.name) else {
            return Err(JsonRpcError::unknown_tool(req.id.clone(), &params.name));
        };

        tracing::debug!(tool = tool.name(), "Calling tool");

        let result = tool
            .call(&self.client, &arguments)
            .await
            .map_err(|e| tool_error(req, &e))?;

        let result_value = serde_json::to_value(&result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(
                req.id.clone(),
                "Internal error: failed to serialise result",
            )
        })?;

        Ok(JsonRpcResponse::success(req.id.clone(), result_value))
    }

    /// Handles the ping request.
    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }
}

/// Maps a tool failure onto its JSON-RPC error code.
fn tool_error(req: &JsonRpcRequest, error: &ToolError) -> JsonRpcError {
    let id = req.id.clone();
    match error {
        ToolError::InvalidParams(message) => JsonRpcError::invalid_params(id, message.clone()),
        ToolError::Remote(message) => JsonRpcError::remote_error(id, message.clone()),
        ToolError::Transport(message) => JsonRpcError::internal_error(id, message.clone()),
    }
}

/// How requests reach the plugin.
#[derive(Debug, Clone)]
enum Backend {
    Local(Dispatcher),
    Passthrough(PluginClient),
}

/// The stdio bridge.
pub struct McpServer<R = tokio::io::BufReader<tokio::io::Stdin>, W = tokio::io::Stdout> {
    /// The transport layer.
    transport: StdioTransport<R, W>,
    /// Where requests go.
    backend: Backend,
}

impl McpServer {
    /// Creates a bridge over the process stdin and stdout.
    #[must_use]
    pub fn new(client: PluginClient, mode: TransportMode) -> Self {
        Self::with_transport(StdioTransport::new(), client, mode)
    }
}

impl<R, W> McpServer<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a bridge over an arbitrary transport.
    #[must_use]
    pub fn with_transport(
        transport: StdioTransport<R, W>,
        client: PluginClient,
        mode: TransportMode,
    ) -> Self {
        let backend = match mode {
            TransportMode::Rest => Backend::Local(Dispatcher::new(client)),
            TransportMode::Passthrough => Backend::Passthrough(client),
        };
        Self { transport, backend }
    }

    /// Consumes the server, returning the transport.
    pub fn into_transport(self) -> StdioTransport<R, W> {
        self.transport
    }

    /// Runs until EOF or a termination signal.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> std::io::Result<()> {
        tokio::select! {
            () = shutdown_signal() => {
                tracing::info!("Received termination signal, shutting down");
                Ok(())
            }
            result = self.serve() => result,
        }
    }

    /// Runs until EOF.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input or writing output fails.
    pub async fn serve(&mut self) -> std::io::Result<()> {
        while let Some(input) = self.transport.read_line().await? {
            match input {
                InputLine::Text(line) => self.handle_line(&line).await?,
                InputLine::Oversized { bytes } => self.reject_oversized(bytes).await?,
            }
        }
        tracing::info!("Input closed");
        Ok(())
    }

    /// Answers a line that was too long to read.
    async fn reject_oversized(&mut self, bytes: usize) -> std::io::Result<()> {
        let limit = self.transport.max_line_bytes();
        tracing::warn!(bytes, limit, "Dropping oversized message");
        let error = JsonRpcError::parse_error(format!(
            "Parse error: message of {bytes} bytes exceeds the {limit} byte limit"
        ));
        self.transport.write_error(&error).await
    }

    /// Handles a single line of input.
    async fn handle_line(&mut self, line: &str) -> std::io::Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        match parse_message(line) {
            Ok(msg) => self.handle_message(line, msg).await,
            Err(MessageError::Unanswerable(reason)) => {
                tracing::warn!(%reason, "Skipping unparseable message");
                Ok(())
            }
            Err(MessageError::Invalid(error)) => {
                tracing::warn!(reason = %error.error.message, "Rejecting invalid request");
                self.transport.write_error(&error).await
            }
        }
    }

    /// Handles a parsed incoming message.
    async fn handle_message(&mut self, line: &str, msg: IncomingMessage) -> std::io::Result<()> {
        tracing::debug!(method = msg.method(), id = ?msg.id(), "Received message");

        let dispatcher = match &self.backend {
            Backend::Local(dispatcher) => dispatcher,
            Backend::Passthrough(client) => {
                return Self::relay(&mut self.transport, client, line, &msg).await;
            }
        };

        match msg {
            IncomingMessage::Request(req) => match dispatcher.handle_request(&req).await {
                Ok(resp) => self.transport.write_response(&resp).await,
                Err(error) => {
                    tracing::debug!(
                        method = %req.method,
                        code = error.error.code,
                        message = %error.error.message,
                        "Request failed"
                    );
                    self.transport.write_error(&error).await
                }
            },
            IncomingMessage::Notification(notif) => {
                handle_notification(&notif);
                Ok(())
            }
        }
    }

    /// Forwards a message to `POST /mcp` and relays the answer.
    async fn relay(
        transport: &mut StdioTransport<R, W>,
        client: &PluginClient,
        line: &str,
        msg: &IncomingMessage,
    ) -> std::io::Result<()> {
        let id = msg.id().cloned();
        let outcome = client.forward(line).await;

        if !msg.expects_response() {
            if let Err(e) = outcome {
                tracing::warn!(error = %error_chain(&e), "Failed to forward notification");
            }
            return Ok(());
        }

        match outcome.map(|body| serde_json::from_str::<Value>(&body)) {
            Ok(Ok(value)) => transport.write_json(&value).await,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Plugin returned a non-JSON body");
                let error = JsonRpcError::internal_error(
                    id,
                    format!("Invalid response from diagrams.net plugin: {e}"),
                );
                transport.write_error(&error).await
            }
            Err(e) => {
                let message = error_chain(&e);
                tracing::warn!(error = %message, "Failed to forward request");
                transport
                    .write_error(&JsonRpcError::internal_error(id, message))
                    .await
            }
        }
    }
}

/// Handles an incoming notification.
fn handle_notification(notif: &JsonRpcNotification) {
    if notif.method == "notifications/initialized" || notif.method == "initialized" {
        tracing::info!("Client initialisation complete");
    } else {
        tracing::debug!(method = %notif.method, "Ignoring notification");
    }
}

/// Resolves when the process is asked to terminate.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut sigint), Ok(mut sigterm)) = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) else {
        tracing::warn!("Could not install signal handlers");
        return std::future::pending().await;
    };

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}

/// Resolves when the process is asked to terminate.
#[cfg(windows)]
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("Could not install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientSettings;
    use crate::mcp::protocol::RequestId;

    fn offline_dispatcher() -> Dispatcher {
        // Port 1 is never served; tests here must not reach the network.
        Dispatcher::new(PluginClient::new(&ClientSettings::localhost(1)).unwrap())
    }

    async fn run_lines(input: &str) -> Vec<Value> {
        run_lines_with_limit(input, crate::mcp::transport::MAX_MESSAGE_BYTES).await
    }

    async fn run_lines_with_limit(input: &str, max_line_bytes: usize) -> Vec<Value> {
        let client = PluginClient::new(&ClientSettings::localhost(1)).unwrap();
        let transport = StdioTransport::with_io(input.as_bytes(), Vec::new())
            .with_max_line_bytes(max_line_bytes);
        let mut server = McpServer::with_transport(transport, client, TransportMode::Rest);
        server.serve().await.unwrap();
        let out = String::from_utf8(server.into_transport().into_writer()).unwrap();
        out.lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn initialize_returns_descriptor() {
        let req = JsonRpcRequest::new(1, "initialize", Some(json!({})));
        let resp = offline_dispatcher().handle_request(&req).await.unwrap();
        assert_eq!(resp.id, Some(RequestId::from(1)));
        assert_eq!(resp.result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(resp.result["capabilities"], json!({"tools": {}}));
        assert_eq!(resp.result["serverInfo"]["name"], SERVER_NAME);
    }

    #[tokio::test]
    async fn tools_list_matches_registry() {
        let req = JsonRpcRequest::new("t", "tools/list", None);
        let resp = offline_dispatcher().handle_request(&req).await.unwrap();
        let names: Vec<&str> = resp.result["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        let expected: Vec<&str> = Tool::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let req = JsonRpcRequest::new(7, "resources/list", None);
        let err = offline_dispatcher().handle_request(&req).await.unwrap_err();
        assert_eq!(err.id, Some(RequestId::from(7)));
        assert_eq!(err.error.code, -32601);
        assert_eq!(err.error.message, "Unknown method: resources/list");
    }

    #[tokio::test]
    async fn unknown_tool_is_method_not_found() {
        let req = JsonRpcRequest::new(
            8,
            "tools/call",
            Some(json!({"name": "delete_diagram", "arguments": {}})),
        );
        let err = offline_dispatcher().handle_request(&req).await.unwrap_err();
        assert_eq!(err.error.code, -32601);
        assert_eq!(err.error.message, "Unknown tool: delete_diagram");
    }

    #[tokio::test]
    async fn missing_tool_params_are_invalid() {
        let req = JsonRpcRequest::new(9, "tools/call", None);
        let err = offline_dispatcher().handle_request(&req).await.unwrap_err();
        assert_eq!(err.error.code, -32602);

        let req = JsonRpcRequest::new(
            10,
            "tools/call",
            Some(json!({"name": "get_diagram_by_id", "arguments": "id=1"})),
        );
        let err = offline_dispatcher().handle_request(&req).await.unwrap_err();
        assert_eq!(err.error.code, -32602);
    }

    #[tokio::test]
    async fn get_without_id_is_invalid_params() {
        let req = JsonRpcRequest::new(
            11,
            "tools/call",
            Some(json!({"name": "get_diagram_by_id", "arguments": {}})),
        );
        let err = offline_dispatcher().handle_request(&req).await.unwrap_err();
        assert_eq!(err.error.code, -32602);
    }

    #[tokio::test]
    async fn ping_answers_locally() {
        let req = JsonRpcRequest::new(12, "ping", None);
        let resp = offline_dispatcher().handle_request(&req).await.unwrap();
        assert_eq!(resp.result, json!({}));
    }

    #[tokio::test]
    async fn loop_skips_blank_and_garbage_lines() {
        let input = concat!(
            "\n",
            "   \n",
            "{not json\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":null,"method":"nope"}"#,
            "\n",
            r#"{"id":5,"method":"ping"}"#,
            "\n",
        );

        let responses = run_lines(input).await;
        assert_eq!(responses.len(), 3);

        assert_eq!(responses[0], json!({"jsonrpc": "2.0", "id": "a", "result": {}}));

        assert_eq!(responses[1]["id"], Value::Null);
        assert_eq!(responses[1]["error"]["code"], -32601);

        assert_eq!(responses[2]["id"], 5);
        assert_eq!(responses[2]["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn tool_call_params_must_be_an_object() {
        let req = JsonRpcRequest::new(
            13,
            "tools/call",
            Some(json!(["get_diagram_by_id", {"id": "a1"}])),
        );
        let err = offline_dispatcher().handle_request(&req).await.unwrap_err();
        assert_eq!(err.error.code, -32602);
        assert_eq!(err.error.message, "Tool call params must be an object");
    }

    #[tokio::test]
    async fn idless_requests_are_answered_without_id() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"tools/list"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"bogus/method"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{}}"#,
            "\n",
        );

        let responses = run_lines(input).await;
        assert_eq!(responses.len(), 2);

        assert!(responses[0].get("id").is_none());
        assert_eq!(responses[0]["result"]["tools"].as_array().unwrap().len(), 4);

        assert!(responses[1].get("id").is_none());
        assert_eq!(responses[1]["error"]["code"], -32601);
        assert_eq!(responses[1]["error"]["message"], "Unknown method: bogus/method");
    }

    #[tokio::test]
    async fn oversized_line_gets_parse_error_and_loop_continues() {
        let mut input = "x".repeat(crate::mcp::transport::MAX_MESSAGE_BYTES + 1);
        input.push('\n');
        input.push_str(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        input.push('\n');

        let responses = run_lines(&input).await;
        assert_eq!(responses.len(), 2);

        assert_eq!(responses[0]["id"], Value::Null);
        assert!(responses[0].as_object().unwrap().contains_key("id"));
        assert_eq!(responses[0]["error"]["code"], -32700);

        assert_eq!(responses[1], json!({"jsonrpc": "2.0", "id": 1, "result": {}}));
    }

    #[tokio::test]
    async fn line_at_the_limit_is_parsed() {
        let ping = r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#;
        let input = format!("{ping}\n{ping} \n");

        let responses = run_lines_with_limit(&input, ping.len()).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 2);
        assert_eq!(responses[1]["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn every_response_has_exactly_one_outcome() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"update_diagram","arguments":{"id":"x"}}}"#,
            "\n",
        );

        let responses = run_lines(input).await;
        assert_eq!(responses.len(), 3);
        for (i, response) in responses.iter().enumerate() {
            assert_eq!(response["id"], json!(i + 1));
            let has_result = response.get("result").is_some();
            let has_error = response.get("error").is_some();
            assert!(has_result ^ has_error, "response {i}: {response}");
        }
    }
}
