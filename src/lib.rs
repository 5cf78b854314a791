//! diagrams-net-mcp-bridge: MCP stdio bridge for the diagrams.net IDE plugin
//!
//! The plugin runs inside the IDE and serves open diagrams over a local HTTP
//! API. This crate lets MCP clients (AI assistants) list, read, update and
//! create those diagrams by speaking JSON-RPC 2.0 on stdin and stdout.
//!
//! # Architecture
//!
//! The bridge is stateless. Each request becomes at most one HTTP call:
//!
//! - **REST mode** (default): MCP tool calls are translated into calls on
//!   `/api/diagrams`
//! - **Passthrough mode**: JSON-RPC messages are relayed verbatim to the
//!   plugin's own `/mcp` endpoint
//!
//! The same operations are also available as one-shot CLI commands.
//!
//! # Modules
//!
//! - [`cli`] — One-shot command-line operations
//! - [`client`] — Plugin HTTP client
//! - [`config`] — Configuration loading, validation and port discovery
//! - [`diagram`] — Diagram records and markup decoding
//! - [`error`] — Error types
//! - [`mcp`] — MCP protocol implementation

pub mod cli;
pub mod client;
pub mod config;
pub mod diagram;
pub mod error;
pub mod mcp;
