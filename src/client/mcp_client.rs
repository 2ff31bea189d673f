// ! MCP client
// !
// ! The client half of the runtime: drives the initialize handshake with
// ! version capture, exposes typed operations for the whole method
// ! catalogue, routes server-initiated requests to a handler, and fans
// ! out server notifications to subscribers.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};

use crate::client::request_handler::{ClientRequestHandler, DefaultClientRequestHandler};
use crate::core::error::{McpError, McpResult};
use crate::dispatcher::Dispatcher;
use crate::protocol::messages::*;
use crate::protocol::methods;
use crate::protocol::types::*;
use crate::protocol::version::ProtocolVersion;
use crate::transport::traits::{SessionId, Transport, TransportEvent};

/// Configuration for the MCP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for outbound requests
    pub request_timeout: Option<Duration>,
    /// How long to wait for the transport to announce its session
    pub connect_timeout: Duration,
    /// Protocol revisions this client accepts during negotiation
    pub supported_versions: Vec<ProtocolVersion>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            connect_timeout: Duration::from_secs(10),
            supported_versions: ProtocolVersion::SUPPORTED.to_vec(),
        }
    }
}

struct ClientInner {
    info: ClientInfo,
    capabilities: ClientCapabilities,
    config: ClientConfig,
    dispatcher: Arc<Dispatcher>,
    session_tx: watch::Sender<Option<SessionId>>,
    session_rx: watch::Receiver<Option<SessionId>>,
    server_info: RwLock<Option<ServerInfo>>,
    server_capabilities: RwLock<Option<ServerCapabilities>>,
    protocol_version: RwLock<ProtocolVersion>,
    handler: RwLock<Arc<dyn ClientRequestHandler>>,
    initialize_id: RwLock<Option<RequestId>>,
}

/// The client half of the MCP runtime
pub struct McpClient {
    inner: Arc<ClientInner>,
}

impl McpClient {
    /// Create a client identified by name and version
    pub fn new<S: Into<String>>(name: S, version: S) -> Self {
        Self::with_config(name, version, ClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config<S: Into<String>>(name: S, version: S, config: ClientConfig) -> Self {
        let (session_tx, session_rx) = watch::channel(None);
        Self {
            inner: Arc::new(ClientInner {
                info: ClientInfo::new(name.into(), version.into()),
                capabilities: ClientCapabilities {
                    roots: Some(RootsCapability {
                        list_changed: Some(true),
                    }),
                    ..Default::default()
                },
                config,
                dispatcher: Dispatcher::new(),
                session_tx,
                session_rx,
                server_info: RwLock::new(None),
                server_capabilities: RwLock::new(None),
                protocol_version: RwLock::new(ProtocolVersion::LATEST),
                handler: RwLock::new(Arc::new(DefaultClientRequestHandler::new())),
                initialize_id: RwLock::new(None),
            }),
        }
    }

    /// The client's identity
    pub fn info(&self) -> &ClientInfo {
        &self.inner.info
    }

    /// The protocol version negotiated for this connection
    pub async fn protocol_version(&self) -> ProtocolVersion {
        *self.inner.protocol_version.read().await
    }

    /// The server's identity, once initialized
    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.inner.server_info.read().await.clone()
    }

    /// The server's capabilities, once initialized
    pub async fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.inner.server_capabilities.read().await.clone()
    }

    /// Install the handler for server-initiated requests
    pub async fn set_request_handler<H: ClientRequestHandler + 'static>(&self, handler: H) {
        *self.inner.handler.write().await = Arc::new(handler);
    }

    /// The session this client speaks on
    pub fn session(&self) -> McpResult<SessionId> {
        (*self.inner.session_rx.borrow()).ok_or_else(|| McpError::connection("not connected"))
    }

    /// Connect over a transport: starts it, waits for the session
    /// announcement, and wires the dispatcher. Does not initialize.
    pub async fn connect<T: Transport + 'static>(
        &self,
        mut transport: T,
        endpoint: &str,
    ) -> McpResult<()> {
        let events = transport
            .take_events()
            .ok_or_else(|| McpError::transport("transport events already taken"))?;
        transport.start(endpoint).await?;

        self.register_incoming_handlers().await;
        let transport: Arc<dyn Transport> = Arc::new(transport);
        self.inner.dispatcher.bind_transport(transport).await;

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut events = events;
            while let Some(event) = events.recv().await {
                match event {
                    TransportEvent::Started => {
                        tracing::debug!("client transport started");
                    }
                    TransportEvent::NewSession(session) => {
                        let _ = inner.session_tx.send(Some(session));
                    }
                    TransportEvent::Received(session, frame) => {
                        inner.dispatcher.handle_frame(session, frame).await;
                    }
                    TransportEvent::Error(message) => {
                        tracing::error!("transport error: {message}");
                    }
                    TransportEvent::SessionClosed(session) => {
                        inner.dispatcher.fail_session(session, "session closed").await;
                    }
                    TransportEvent::Finished => {
                        let current_session = *inner.session_rx.borrow();
                        if let Some(session) = current_session {
                            inner
                                .dispatcher
                                .fail_session(session, "transport finished")
                                .await;
                        }
                        let _ = inner.session_tx.send(None);
                        break;
                    }
                }
            }
        });

        // Wait for the transport to mint the session.
        let mut session_rx = self.inner.session_rx.clone();
        tokio::time::timeout(self.inner.config.connect_timeout, async {
            loop {
                if session_rx.borrow().is_some() {
                    return Ok::<(), McpError>(());
                }
                session_rx
                    .changed()
                    .await
                    .map_err(|_| McpError::connection("transport closed before session"))?;
            }
        })
        .await
        .map_err(|_| McpError::timeout("no session announced by transport"))??;

        Ok(())
    }

    /// Run the initialize handshake.
    ///
    /// Sends our preferred version; if the response names a version inside
    /// our supported set, the session adopts it for all future
    /// serialization. Finishes with the initialized notification.
    pub async fn initialize(&self) -> McpResult<InitializeResult> {
        let session = self.session()?;
        let params = InitializeParams {
            protocol_version: self.protocol_version().await.to_string(),
            capabilities: self.inner.capabilities.clone(),
            client_info: self.inner.info.clone(),
        };

        let (id, receiver) = self
            .inner
            .dispatcher
            .request(
                session,
                methods::INITIALIZE,
                Some(serde_json::to_value(&params)?),
            )
            .await?;
        *self.inner.initialize_id.write().await = Some(id);

        let reply = match self.inner.config.request_timeout {
            Some(deadline) => tokio::time::timeout(deadline, receiver)
                .await
                .map_err(|_| McpError::timeout("initialize timed out"))?,
            None => receiver.await,
        }
        .map_err(|_| McpError::transport("reply channel closed"))?;
        let result: InitializeResult = serde_json::from_value(reply?)?;

        if let Ok(version) = result.protocol_version.parse::<ProtocolVersion>() {
            if self.inner.config.supported_versions.contains(&version) {
                *self.inner.protocol_version.write().await = version;
                self.inner
                    .dispatcher
                    .set_session_version(session, version)
                    .await;
            }
        }

        *self.inner.server_info.write().await = Some(result.server_info.clone());
        *self.inner.server_capabilities.write().await = Some(result.capabilities.clone());

        self.inner
            .dispatcher
            .notify(session, methods::INITIALIZED, None)
            .await?;

        Ok(result)
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> McpResult<T> {
        let session = self.session()?;
        let value = self
            .inner
            .dispatcher
            .request_and_wait(session, method, params, self.inner.config.request_timeout)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    // ========================================================================
    // Typed operations
    // ========================================================================

    /// Ping the server; works before initialization
    pub async fn ping(&self) -> McpResult<()> {
        self.request::<EmptyResult>(methods::PING, None).await?;
        Ok(())
    }

    /// List one page of the server's resources
    pub async fn list_resources(&self, cursor: Option<Cursor>) -> McpResult<ListResourcesResult> {
        let params = serde_json::to_value(ListParams { cursor })?;
        self.request(methods::RESOURCES_LIST, Some(params)).await
    }

    /// Read every contents entry at a resource URI
    pub async fn read_resource<S: Into<String>>(&self, uri: S) -> McpResult<ReadResourceResult> {
        let params = serde_json::to_value(ReadResourceParams { uri: uri.into() })?;
        self.request(methods::RESOURCES_READ, Some(params)).await
    }

    /// List one page of the server's resource templates
    pub async fn list_resource_templates(
        &self,
        cursor: Option<Cursor>,
    ) -> McpResult<ListResourceTemplatesResult> {
        let params = serde_json::to_value(ListParams { cursor })?;
        self.request(methods::RESOURCES_TEMPLATES_LIST, Some(params))
            .await
    }

    /// Subscribe to update notifications for a resource URI
    pub async fn subscribe_resource<S: Into<String>>(&self, uri: S) -> McpResult<()> {
        let params = serde_json::to_value(SubscribeParams { uri: uri.into() })?;
        self.request::<EmptyResult>(methods::RESOURCES_SUBSCRIBE, Some(params))
            .await?;
        Ok(())
    }

    /// Drop the subscription for a resource URI
    pub async fn unsubscribe_resource<S: Into<String>>(&self, uri: S) -> McpResult<()> {
        let params = serde_json::to_value(UnsubscribeParams { uri: uri.into() })?;
        self.request::<EmptyResult>(methods::RESOURCES_UNSUBSCRIBE, Some(params))
            .await?;
        Ok(())
    }

    /// List one page of the server's prompts
    pub async fn list_prompts(&self, cursor: Option<Cursor>) -> McpResult<ListPromptsResult> {
        let params = serde_json::to_value(ListParams { cursor })?;
        self.request(methods::PROMPTS_LIST, Some(params)).await
    }

    /// Materialize a prompt with arguments
    pub async fn get_prompt<S: Into<String>>(
        &self,
        name: S,
        arguments: Option<std::collections::HashMap<String, String>>,
    ) -> McpResult<GetPromptResult> {
        let params = serde_json::to_value(GetPromptParams {
            name: name.into(),
            arguments,
        })?;
        self.request(methods::PROMPTS_GET, Some(params)).await
    }

    /// List one page of the server's tools
    pub async fn list_tools(&self, cursor: Option<Cursor>) -> McpResult<ListToolsResult> {
        let params = serde_json::to_value(ListParams { cursor })?;
        self.request(methods::TOOLS_LIST, Some(params)).await
    }

    /// Invoke a tool by name
    pub async fn call_tool<S: Into<String>>(
        &self,
        name: S,
        arguments: Option<Map<String, Value>>,
    ) -> McpResult<CallToolResult> {
        let params = serde_json::to_value(CallToolParams {
            name: name.into(),
            arguments,
        })?;
        self.request(methods::TOOLS_CALL, Some(params)).await
    }

    /// Ask the server to deliver log messages at `level` and above
    pub async fn set_logging_level(&self, level: LoggingLevel) -> McpResult<()> {
        let params = serde_json::to_value(SetLevelParams { level })?;
        self.request::<EmptyResult>(methods::LOGGING_SET_LEVEL, Some(params))
            .await?;
        Ok(())
    }

    /// Request completions for a prompt or resource-template argument
    pub async fn complete(
        &self,
        reference: CompletionReference,
        argument: CompletionArgument,
    ) -> McpResult<CompleteResult> {
        let params = serde_json::to_value(CompleteParams {
            reference,
            argument,
        })?;
        self.request(methods::COMPLETION_COMPLETE, Some(params))
            .await
    }

    /// Cancel an in-flight request by ID.
    ///
    /// The initialize request cannot be cancelled. Any reply that still
    /// arrives for the ID is discarded silently.
    pub async fn cancel(&self, id: RequestId, reason: Option<String>) -> McpResult<()> {
        if self.inner.initialize_id.read().await.as_ref() == Some(&id) {
            return Err(McpError::protocol("initialize cannot be cancelled"));
        }
        let session = self.session()?;
        self.inner.dispatcher.cancel(session, id, reason).await
    }

    /// Subscribe to a server notification method.
    ///
    /// Handlers run in registration order; decode failures are logged and
    /// swallowed.
    pub async fn on_notification<F>(&self, method: &str, handler: F)
    where
        F: Fn(ServerNotification) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.inner
            .dispatcher
            .register_notification_handler(
                method,
                Arc::new(move |_session, notification| {
                    let handler = Arc::clone(&handler);
                    Box::pin(async move {
                        match ServerNotification::from_notification(&notification) {
                            Ok(typed) => handler(typed),
                            Err(e) => {
                                tracing::warn!("bad {} notification: {e}", notification.method);
                            }
                        }
                    })
                }),
            )
            .await;
    }

    /// Subscribe to resources/updated notifications, receiving the URI
    pub async fn on_resource_updated<F>(&self, handler: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.on_notification(methods::RESOURCES_UPDATED, move |notification| {
            if let ServerNotification::ResourcesUpdated(params) = notification {
                handler(params.uri);
            }
        })
        .await;
    }

    /// Tell the server the client's roots changed.
    ///
    /// The server drops its recorded roots until the next roots/list
    /// round trip.
    pub async fn notify_roots_changed(&self) -> McpResult<()> {
        let session = self.session()?;
        self.inner
            .dispatcher
            .notify(session, methods::ROOTS_LIST_CHANGED, None)
            .await
    }

    /// Shut the connection down, failing anything still pending
    pub async fn disconnect(&self) -> McpResult<()> {
        if let Ok(session) = self.session() {
            self.inner
                .dispatcher
                .fail_session(session, "client disconnected")
                .await;
        }
        let _ = self.inner.session_tx.send(None);
        Ok(())
    }

    // ========================================================================
    // Server-initiated requests
    // ========================================================================

    async fn register_incoming_handlers(&self) {
        let dispatcher = &self.inner.dispatcher;

        let inner = Arc::downgrade(&self.inner);
        dispatcher
            .register_request_handler(
                methods::SAMPLING_CREATE_MESSAGE,
                Arc::new(move |_session, request| {
                    let inner = inner.clone();
                    Box::pin(async move {
                        let Some(inner) = inner.upgrade() else {
                            return Err(ErrorObject::new(
                                error_codes::INTERNAL_ERROR,
                                "client is gone",
                            ));
                        };
                        let params: CreateMessageParams =
                            decode_request_params(&request)?;
                        let handler = inner.handler.read().await.clone();
                        match handler.handle_create_message(params).await {
                            Ok(result) => encode_handler_result(&result),
                            Err(e) => Err(e.to_error_object()),
                        }
                    })
                }),
            )
            .await;

        let inner = Arc::downgrade(&self.inner);
        dispatcher
            .register_request_handler(
                methods::ROOTS_LIST,
                Arc::new(move |_session, _request| {
                    let inner = inner.clone();
                    Box::pin(async move {
                        let Some(inner) = inner.upgrade() else {
                            return Err(ErrorObject::new(
                                error_codes::INTERNAL_ERROR,
                                "client is gone",
                            ));
                        };
                        let handler = inner.handler.read().await.clone();
                        match handler.handle_list_roots().await {
                            Ok(result) => encode_handler_result(&result),
                            Err(e) => Err(e.to_error_object()),
                        }
                    })
                }),
            )
            .await;

        let inner = Arc::downgrade(&self.inner);
        dispatcher
            .register_request_handler(
                methods::PING,
                Arc::new(move |_session, _request| {
                    let inner = inner.clone();
                    Box::pin(async move {
                        let Some(inner) = inner.upgrade() else {
                            return Err(ErrorObject::new(
                                error_codes::INTERNAL_ERROR,
                                "client is gone",
                            ));
                        };
                        let handler = inner.handler.read().await.clone();
                        match handler.handle_ping().await {
                            Ok(result) => encode_handler_result(&result),
                            Err(e) => Err(e.to_error_object()),
                        }
                    })
                }),
            )
            .await;
    }
}

fn decode_request_params<T: serde::de::DeserializeOwned>(
    request: &JsonRpcRequest,
) -> Result<T, ErrorObject> {
    match &request.params {
        Some(params) => serde_json::from_value(params.clone()).map_err(|e| {
            ErrorObject::new(
                error_codes::INVALID_PARAMS,
                format!("{}: {e}", request.method),
            )
        }),
        None => Err(ErrorObject::new(
            error_codes::INVALID_PARAMS,
            format!("{}: missing params", request.method),
        )),
    }
}

fn encode_handler_result<T: serde::Serialize>(result: &T) -> Result<Value, ErrorObject> {
    serde_json::to_value(result)
        .map_err(|e| ErrorObject::new(error_codes::INTERNAL_ERROR, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults() {
        let client = McpClient::new("inspector", "0.1.0");
        assert_eq!(client.info().name, "inspector");
        assert!(client.session().is_err());
    }

    #[tokio::test]
    async fn test_cancel_refuses_initialize() {
        let client = McpClient::new("inspector", "0.1.0");
        *client.inner.initialize_id.write().await = Some(RequestId::Number(0));
        let err = client.cancel(RequestId::Number(0), None).await.unwrap_err();
        assert!(matches!(err, McpError::Protocol(_)));
    }
}
