// ! Handlers for server-initiated requests
// !
// ! A server may ask the client to run a sampling completion, enumerate
// ! its roots, or answer a ping. Hosts implement this trait to supply
// ! those answers; the default handler serves a configured roots list,
// ! answers pings, and declines sampling.

use async_trait::async_trait;

use crate::core::error::{McpError, McpResult};
use crate::protocol::messages::{
    CreateMessageParams, CreateMessageResult, EmptyResult, ListRootsResult,
};
use crate::protocol::types::Root;

/// Answers the requests a server may initiate toward the client
#[async_trait]
pub trait ClientRequestHandler: Send + Sync {
    /// Handle sampling/createMessage
    async fn handle_create_message(
        &self,
        _params: CreateMessageParams,
    ) -> McpResult<CreateMessageResult> {
        Err(McpError::MethodNotFound(
            "sampling is not available on this client".to_string(),
        ))
    }

    /// Handle roots/list
    async fn handle_list_roots(&self) -> McpResult<ListRootsResult> {
        Ok(ListRootsResult::default())
    }

    /// Handle ping
    async fn handle_ping(&self) -> McpResult<EmptyResult> {
        Ok(EmptyResult::default())
    }
}

/// Default handler: static roots, pings answered, sampling declined
#[derive(Debug, Default)]
pub struct DefaultClientRequestHandler {
    roots: Vec<Root>,
}

impl DefaultClientRequestHandler {
    /// Create a handler with no roots
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root the server may enumerate
    pub fn with_root<S: Into<String>>(mut self, uri: S, name: Option<S>) -> Self {
        let mut root = Root::new(uri);
        root.name = name.map(Into::into);
        self.roots.push(root);
        self
    }
}

#[async_trait]
impl ClientRequestHandler for DefaultClientRequestHandler {
    async fn handle_list_roots(&self) -> McpResult<ListRootsResult> {
        Ok(ListRootsResult {
            roots: self.roots.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_handler_serves_roots() {
        let handler =
            DefaultClientRequestHandler::new().with_root("file:///home/user", Some("Home"));
        let result = handler.handle_list_roots().await.unwrap();
        assert_eq!(result.roots.len(), 1);
        assert_eq!(result.roots[0].uri, "file:///home/user");
        assert_eq!(result.roots[0].name.as_deref(), Some("Home"));
    }

    #[tokio::test]
    async fn test_default_handler_declines_sampling() {
        let handler = DefaultClientRequestHandler::new();
        let params = CreateMessageParams {
            messages: Vec::new(),
            model_preferences: None,
            system_prompt: None,
            include_context: None,
            temperature: None,
            max_tokens: 16,
            stop_sequences: None,
            metadata: None,
        };
        assert!(handler.handle_create_message(params).await.is_err());
    }

    #[tokio::test]
    async fn test_default_handler_answers_ping() {
        let handler = DefaultClientRequestHandler::new();
        assert!(handler.handle_ping().await.is_ok());
    }
}
