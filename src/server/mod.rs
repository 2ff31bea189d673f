//! MCP server implementation
//!
//! The server half of the runtime: session state and registries, built-in
//! request handlers, tool sets, and server-initiated requests.

pub mod mcp_server;
pub mod session;
pub mod toolset;

pub use mcp_server::{McpServer, ServerConfig};
pub use session::{ListKind, PAGE_SIZE, ServerSession, paginate};
pub use toolset::{ParamKind, ToolMethod, ToolOutput, ToolSet, ToolValue};
