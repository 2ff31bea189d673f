//! Core abstractions for the duplex MCP runtime
//!
//! This module contains the fundamental building blocks shared by both
//! halves of the runtime, primarily the error taxonomy.

pub mod error;

pub use error::{McpError, McpResult};
