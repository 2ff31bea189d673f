//! MCP protocol implementation
//!
//! This module contains the typed message layer: scalar kinds, content
//! unions, request/result/notification types, the JSON-RPC envelope, batch
//! handling and protocol-version-conditioned serialization.

pub mod batch;
pub mod messages;
pub mod methods;
pub mod types;
pub mod version;

pub use messages::*;
pub use types::*;
pub use version::{
    JSONRPC_VERSION, ProtocolVersion, decode_versioned, encode_versioned,
};
