// ! Error types for the duplex MCP runtime
// !
// ! Module defines all error types that can occur within the runtime,
// ! including the mapping to and from on-wire JSON-RPC error objects.

use thiserror::Error;

use crate::protocol::types::ErrorObject;

/// The main error type for the MCP runtime
#[derive(Error, Debug, Clone)]
pub enum McpError {
    /// Transport-related errors (connection, I/O, framing)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol-level errors (invalid messages, unexpected responses)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid URI format or content
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// Requested tool was not found
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Requested resource was not found
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Requested prompt was not found
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// Method not found (JSON-RPC error)
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Invalid parameters (JSON-RPC error)
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Connection-related errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// An error object received from the remote peer
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// On-wire error code; positive lifecycle codes are preserved
        code: i64,
        /// On-wire error message
        message: String,
    },

    /// I/O errors from the standard library
    #[error("I/O error: {0}")]
    Io(String),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(String),

    /// HTTP-related errors when using the SSE transport
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Cancellation errors
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {0}")]
    Internal(String),
}

// Manual From implementations for types that don't implement Clone
impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        McpError::Io(err.to_string())
    }
}

impl From<url::ParseError> for McpError {
    fn from(err: url::ParseError) -> Self {
        McpError::Url(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for McpError {
    fn from(err: reqwest::Error) -> Self {
        McpError::Http(err.to_string())
    }
}

impl From<ErrorObject> for McpError {
    fn from(err: ErrorObject) -> Self {
        McpError::Rpc {
            code: err.code,
            message: err.message,
        }
    }
}

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;

impl McpError {
    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new serialization error from serde_json::Error
    pub fn serialization(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// Convert this error into an on-wire JSON-RPC error object.
    ///
    /// Lifecycle errors keep the custom positive codes the reference
    /// protocol uses; everything else maps to the standard negative codes.
    pub fn to_error_object(&self) -> ErrorObject {
        use crate::protocol::types::error_codes;

        let (code, message) = match self {
            McpError::Rpc { code, message } => (*code, message.clone()),
            McpError::MethodNotFound(m) => (error_codes::METHOD_NOT_FOUND, m.clone()),
            McpError::InvalidParams(m) => (error_codes::INVALID_PARAMS, m.clone()),
            McpError::Serialization(m) => (error_codes::INVALID_PARAMS, m.clone()),
            McpError::ToolNotFound(m) => {
                (error_codes::INVALID_PARAMS, format!("Tool not found: {m}"))
            }
            McpError::ResourceNotFound(m) => (
                error_codes::INVALID_PARAMS,
                format!("Resource not found: {m}"),
            ),
            McpError::PromptNotFound(m) => (
                error_codes::INVALID_PARAMS,
                format!("Prompt not found: {m}"),
            ),
            other => (error_codes::INTERNAL_ERROR, other.to_string()),
        };

        ErrorObject {
            code,
            message,
            data: None,
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            McpError::Transport(_) => "transport",
            McpError::Protocol(_) => "protocol",
            McpError::Connection(_) => "connection",
            McpError::Timeout(_) => "timeout",
            McpError::ToolNotFound(_) => "not_found",
            McpError::ResourceNotFound(_) => "not_found",
            McpError::PromptNotFound(_) => "not_found",
            McpError::MethodNotFound(_) => "not_found",
            McpError::InvalidParams(_) => "validation",
            McpError::Serialization(_) => "serialization",
            McpError::InvalidUri(_) => "validation",
            McpError::Rpc { .. } => "rpc",
            McpError::Io(_) => "io",
            McpError::Url(_) => "validation",
            #[cfg(feature = "http")]
            McpError::Http(_) => "http",
            McpError::Cancelled(_) => "cancelled",
            McpError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = McpError::transport("Connection failed");
        assert_eq!(error.to_string(), "Transport error: Connection failed");
        assert_eq!(error.category(), "transport");
    }

    #[test]
    fn test_rpc_error_round_trip() {
        let wire = ErrorObject {
            code: 1,
            message: "Not initialized".to_string(),
            data: None,
        };
        let error = McpError::from(wire.clone());
        assert_eq!(error.to_string(), "RPC error 1: Not initialized");
        assert_eq!(error.to_error_object(), wire);
    }

    #[test]
    fn test_error_object_mapping() {
        let object = McpError::MethodNotFound("tools/list".to_string()).to_error_object();
        assert_eq!(object.code, -32601);

        let object = McpError::InvalidParams("uri".to_string()).to_error_object();
        assert_eq!(object.code, -32602);
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(McpError::protocol("bad message").category(), "protocol");
        assert_eq!(
            McpError::ToolNotFound("missing".to_string()).category(),
            "not_found"
        );
        assert_eq!(
            McpError::Rpc {
                code: 20241105,
                message: "Protocol Version 9999-99-99 is not supported".to_string()
            }
            .category(),
            "rpc"
        );
    }
}
