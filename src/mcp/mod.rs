//! Model Context Protocol (MCP) bridge.
//!
//! MCP clients talk JSON-RPC 2.0 over stdio; the diagrams.net plugin talks
//! HTTP. This module sits in between.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          MCP Bridge                          │
//! │                                                              │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │   │  Transport  │───▶│   Server    │───▶│   Tools     │      │
//! │   │   (stdio)   │    │ (dispatch)  │    │  (handlers) │      │
//! │   └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                             │                  │             │
//! │                             ▼                  ▼             │
//! │                      ┌─────────────────────────────┐         │
//! │                      │  PluginClient (HTTP/JSON)   │         │
//! │                      └─────────────────────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::{Dispatcher, McpServer};
pub use tools::Tool;
pub use transport::StdioTransport;
