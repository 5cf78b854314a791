//! HTTP client for the diagrams.net plugin API.
//!
//! Every call is a single request with bounded connect and total timeouts.
//! Success yields the decoded JSON body; every failure is a [`ClientError`]
//! that keeps transport problems apart from errors reported by the plugin.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use crate::error::ClientError;

/// Endpoint listing open diagrams and creating new ones.
pub const DIAGRAMS_PATH: &str = "/api/diagrams";

/// Plugin health endpoint.
pub const STATUS_PATH: &str = "/api/status";

/// JSON-RPC passthrough endpoint.
pub const MCP_PATH: &str = "/mcp";

/// Where and how to reach the plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Total timeout for one call.
    pub timeout: Duration,
    /// Connect timeout for one call.
    pub connect_timeout: Duration,
}

impl ClientSettings {
    /// Settings for `localhost:<port>` with default timeouts.
    #[must_use]
    pub fn localhost(port: u16) -> Self {
        Self {
            host: "localhost".to_string(),
            port,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Returns the resource path for one diagram, percent-encoding the id.
#[must_use]
pub fn diagram_path(id: &str) -> String {
    format!("{DIAGRAMS_PATH}/{}", urlencoding::encode(id))
}

/// Client for the plugin HTTP API.
#[derive(Debug, Clone)]
pub struct PluginClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl PluginClient {
    /// Creates a client for the given settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        let base_url = settings.base_url();
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.timeout)
            .build()
            .map_err(|source| ClientError::Request {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self {
            http,
            base_url,
            timeout: settings.timeout,
        })
    }

    /// Base URL of the plugin.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET path`.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.send_json(Method::GET, path, None).await
    }

    /// `POST path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.send_json(Method::POST, path, Some(body)).await
    }

    /// `PUT path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.send_json(Method::PUT, path, Some(body)).await
    }

    /// `GET /api/status`.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn status(&self) -> Result<Value, ClientError> {
        self.get(STATUS_PATH).await
    }

    /// Forwards an already framed JSON-RPC message to `POST /mcp` and
    /// returns the response body as received.
    ///
    /// The plugin reports JSON-RPC errors with non-2xx statuses too, so any
    /// body that looks like a JSON-RPC message is returned regardless of
    /// status.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn forward(&self, message: &str) -> Result<String, ClientError> {
        let url = self.url(MCP_PATH);
        tracing::debug!(%url, bytes = message.len(), "Forwarding JSON-RPC message");

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(message.to_owned())
            .send()
            .await
            .map_err(|e| self.classify(&url, e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(&url, e))?;

        let is_jsonrpc = serde_json::from_str::<Value>(&text)
            .ok()
            .is_some_and(|v| v.get("jsonrpc").is_some());
        if status.is_success() || is_jsonrpc {
            return Ok(text);
        }

        Err(status_error(status, &text))
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let url = self.url(path);
        tracing::debug!(%method, %url, "Calling plugin API");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.classify(&url, e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(&url, e))?;

        if !status.is_success() {
            let error = status_error(status, &text);
            tracing::debug!(%url, status = status.as_u16(), error = %error, "Plugin returned error");
            return Err(error);
        }

        if text.trim().is_empty() {
            return Ok(json!({}));
        }

        serde_json::from_str(&text).map_err(|source| ClientError::Decode { url, source })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn classify(&self, url: &str, source: reqwest::Error) -> ClientError {
        let url = url.to_string();
        if source.is_timeout() {
            ClientError::Timeout {
                url,
                timeout: self.timeout,
            }
        } else if source.is_connect() {
            ClientError::Connect { url, source }
        } else {
            ClientError::Request { url, source }
        }
    }
}

/// Builds a status error, pulling `message` (or `error`) out of a JSON body.
fn status_error(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["message", "error"]
            .iter()
            .filter_map(|key| v.get(*key).and_then(Value::as_str))
            .find(|s| !s.trim().is_empty())
            .map(ToString::to_string)
    });

    ClientError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        message,
    }
}
