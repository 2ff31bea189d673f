//! # duplex-mcp
//!
//! A bidirectional Rust runtime for the
//! [Model Context Protocol (MCP)](https://modelcontextprotocol.io/): both
//! the client and server halves of the JSON-RPC 2.0 conversation used to
//! exchange tools, prompts, resources and sampling messages between an AI
//! host and a tool-providing peer.
//!
//! The runtime is three layers:
//!
//! - [`protocol`]: the typed message layer — every request, result,
//!   notification and content union the protocol permits, with versioned
//!   JSON serialization (revisions 2024-11-05 and 2025-03-26).
//! - [`dispatcher`]: the symmetric JSON-RPC correlator — request/response
//!   matching, handler routing, notification fan-out, version negotiation,
//!   cancellation and timeouts.
//! - [`transport`]: pluggable session-keyed transports — line-delimited
//!   stdio, an SSE HTTP listener multiplexing many sessions, and an
//!   in-process channel pair.
//!
//! ## Server example
//!
//! ```rust,no_run
//! use duplex_mcp::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> McpResult<()> {
//!     let server = McpServer::new("echo-server", "1.0.0");
//!     let transport = StdioServerTransport::new();
//!     let session = transport.session();
//!     server.serve(transport, "").await?;
//!
//!     let tools = Arc::new(ToolSet::anonymous().method(
//!         ToolMethod::new("echo", |args| {
//!             ToolOutput::Text(args[0].as_str().unwrap_or_default().to_string())
//!         })
//!         .with_description("Echo a message")
//!         .param("message", ParamKind::String),
//!     ));
//!     server.register_tool_set(session, tools).await?;
//!
//!     // Serve until the peer closes stdin.
//!     std::future::pending::<()>().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Client example
//!
//! ```rust,no_run
//! use duplex_mcp::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> McpResult<()> {
//!     let client = McpClient::new("inspector", "0.1.0");
//!     let transport = StdioClientTransport::new("echo-server", vec![]);
//!     client.connect(transport, "").await?;
//!     client.initialize().await?;
//!
//!     let tools = client.list_tools(None).await?;
//!     println!("{} tools", tools.tools.len());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod core;
pub mod dispatcher;
pub mod protocol;
pub mod server;
pub mod transport;

// Re-export commonly used types for convenience
pub use core::error::{McpError, McpResult};
pub use protocol::types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::error::{McpError, McpResult};

    pub use crate::protocol::messages::*;
    pub use crate::protocol::methods;
    pub use crate::protocol::types::*;
    pub use crate::protocol::version::ProtocolVersion;

    pub use crate::client::{ClientRequestHandler, DefaultClientRequestHandler, McpClient};
    pub use crate::server::{
        McpServer, ParamKind, ToolMethod, ToolOutput, ToolSet, ToolValue,
    };

    pub use crate::transport::{SessionId, Transport, TransportEvent};

    pub use crate::transport::ChannelTransport;

    #[cfg(feature = "stdio")]
    pub use crate::transport::{StdioClientTransport, StdioServerTransport};

    #[cfg(feature = "http")]
    pub use crate::transport::{SseClientTransport, SseServerTransport};

    pub use async_trait::async_trait;
    pub use serde_json::{Value, json};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _error = McpError::Protocol("test".to_string());
        let _version = protocol::ProtocolVersion::LATEST;
    }
}
