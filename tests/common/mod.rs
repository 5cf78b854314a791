//! In-process stand-in for the diagrams.net plugin HTTP API.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use diagrams_net_mcp_bridge::client::{ClientSettings, PluginClient};

/// Diagrams held by the mock, keyed by id.
#[derive(Clone, Default)]
pub struct MockPlugin {
    diagrams: Arc<Mutex<HashMap<String, Value>>>,
}

impl MockPlugin {
    /// A plugin with one open diagram, `a1`.
    pub fn with_sample() -> Self {
        let plugin = Self::default();
        plugin.insert(json!({
            "id": "a1",
            "fileName": "flow.drawio",
            "filePath": "/work/demo/docs/flow.drawio",
            "relativePath": "docs/flow.drawio",
            "fileType": "xml",
            "project": "demo",
            "isOpen": true,
            "isModified": false,
            "xml": "<mxGraphModel><root><mxCell id=\"0\"/></root></mxGraphModel>"
        }));
        plugin
    }

    pub fn insert(&self, diagram: Value) {
        let id = diagram["id"].as_str().unwrap_or_default().to_string();
        self.diagrams.lock().unwrap().insert(id, diagram);
    }

    pub fn xml_of(&self, id: &str) -> Option<String> {
        self.diagrams
            .lock()
            .unwrap()
            .get(id)
            .and_then(|d| d["xml"].as_str().map(ToString::to_string))
    }

    /// Serves the mock on an ephemeral port.
    pub async fn serve(self) -> SocketAddr {
        serve(self.router()).await
    }

    fn router(self) -> Router {
        Router::new()
            .route("/api/status", get(status))
            .route("/api/diagrams", get(list).post(create))
            .route("/api/diagrams/{id}", get(fetch).put(update))
            .route("/mcp", post(mcp))
            .with_state(self)
    }
}

async fn status(State(plugin): State<MockPlugin>) -> Json<Value> {
    let open = plugin.diagrams.lock().unwrap().len();
    Json(json!({"status": "running", "version": "0.0.0-test", "port": 8765, "openDiagrams": open}))
}

async fn list(State(plugin): State<MockPlugin>) -> Json<Value> {
    let mut diagrams: Vec<Value> = plugin
        .diagrams
        .lock()
        .unwrap()
        .values()
        .map(|d| {
            let mut d = d.clone();
            if let Some(obj) = d.as_object_mut() {
                obj.remove("xml");
            }
            d
        })
        .collect();
    diagrams.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
    Json(json!({"diagrams": diagrams}))
}

async fn fetch(State(plugin): State<MockPlugin>, Path(id): Path<String>) -> Response {
    if id == "boom" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Internal server error", "message": "boom"})),
        )
            .into_response();
    }
    if id == "slow" {
        tokio::time::sleep(Duration::from_secs(10)).await;
    }
    match plugin.diagrams.lock().unwrap().get(&id) {
        Some(diagram) => Json(diagram.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Diagram not found: {id}")})),
        )
            .into_response(),
    }
}

async fn update(
    State(plugin): State<MockPlugin>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut diagrams = plugin.diagrams.lock().unwrap();
    let (Some(diagram), Some(xml)) = (diagrams.get_mut(&id), body["xml"].as_str()) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Diagram not found: {id}")})),
        )
            .into_response();
    };
    diagram["xml"] = Value::String(xml.to_string());
    Json(json!({"success": true, "message": "Diagram updated"})).into_response()
}

async fn create(State(plugin): State<MockPlugin>, Json(body): Json<Value>) -> Response {
    let (Some(project), Some(path)) = (body["project"].as_str(), body["path"].as_str()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing required parameters"})),
        )
            .into_response();
    };
    let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
    let diagram = json!({
        "id": format!("new-{file_name}"),
        "fileName": file_name,
        "filePath": format!("/work/{project}/{path}"),
        "relativePath": path,
        "fileType": body["fileType"],
        "project": project,
        "xml": body.get("content").cloned().unwrap_or(Value::Null),
    });
    plugin.insert(diagram.clone());

    let mut reply = diagram;
    reply["success"] = Value::Bool(true);
    Json(reply).into_response()
}

/// Answers requests with `{"echo": <method>}` and notifications with 202.
async fn mcp(Json(body): Json<Value>) -> Response {
    match body.get("id") {
        Some(id) => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {"echo": body["method"]}
        }))
        .into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Serves `router` on an ephemeral local port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A local address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn client_for(addr: SocketAddr, timeout: Duration) -> PluginClient {
    PluginClient::new(&ClientSettings {
        host: addr.ip().to_string(),
        port: addr.port(),
        timeout,
        connect_timeout: timeout,
    })
    .unwrap()
}
