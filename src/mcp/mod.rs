//! Model Context Protocol (MCP) server.
//!
//! Exposes BOM extraction, the component tree and catalog reconciliation as
//! tools over a stdio JSON-RPC 2.0 transport.
//!
//! ```text
//!   stdin ──▶ StdioTransport ──▶ McpServer ──▶ tool handlers
//!                                    │              │
//!                                    │              ├─▶ SnapshotHost (designs)
//!                                    │              └─▶ Session (catalog)
//!   stdout ◀─────────────────────────┘
//! ```
//!
//! Protocol version 2024-11-05.

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::McpServer;
pub use transport::StdioTransport;
