//! MCP client implementation
//!
//! The client half of the runtime: connection and handshake management,
//! typed operations, and handlers for server-initiated requests.

pub mod mcp_client;
pub mod request_handler;

pub use mcp_client::{ClientConfig, McpClient};
pub use request_handler::{ClientRequestHandler, DefaultClientRequestHandler};
