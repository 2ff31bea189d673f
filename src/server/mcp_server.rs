// ! MCP server
// !
// ! The server half of the runtime: owns the per-session state, registers
// ! the built-in request handlers, relays session notifications onto the
// ! wire, and issues server-initiated requests (sampling, roots, ping).

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc};

use crate::core::error::{McpError, McpResult};
use crate::dispatcher::{Dispatcher, HandlerResult, RequestHandler};
use crate::protocol::messages::*;
use crate::protocol::methods;
use crate::protocol::types::*;
use crate::protocol::version::ProtocolVersion;
use crate::server::session::{NotificationSender, ServerSession};
use crate::server::toolset::ToolSet;
use crate::transport::traits::{SessionId, Transport, TransportEvent};

/// Configuration for the MCP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Deadline for server-initiated requests
    pub request_timeout: Option<Duration>,
    /// Protocol revisions accepted during initialization
    pub supported_versions: Vec<ProtocolVersion>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            supported_versions: ProtocolVersion::SUPPORTED.to_vec(),
        }
    }
}

struct ServerInner {
    info: ServerInfo,
    config: ServerConfig,
    capabilities: RwLock<ServerCapabilities>,
    instructions: RwLock<Option<String>>,
    dispatcher: Arc<Dispatcher>,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<ServerSession>>>>,
    notify_tx: NotificationSender,
    notify_rx: Mutex<Option<mpsc::UnboundedReceiver<(SessionId, ServerNotification)>>>,
}

/// The server half of the MCP runtime
pub struct McpServer {
    inner: Arc<ServerInner>,
}

impl McpServer {
    /// Create a server identified by name and version
    pub fn new<S: Into<String>>(name: S, version: S) -> Self {
        Self::with_config(name, version, ServerConfig::default())
    }

    /// Create a server with custom configuration
    pub fn with_config<S: Into<String>>(name: S, version: S, config: ServerConfig) -> Self {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let capabilities = ServerCapabilities {
            logging: Some(LoggingCapability::default()),
            prompts: Some(PromptsCapability {
                list_changed: Some(true),
            }),
            resources: Some(ResourcesCapability {
                subscribe: Some(true),
                list_changed: Some(true),
            }),
            tools: Some(ToolsCapability {
                list_changed: Some(true),
            }),
            experimental: None,
        };
        Self {
            inner: Arc::new(ServerInner {
                info: ServerInfo::new(name.into(), version.into()),
                config,
                capabilities: RwLock::new(capabilities),
                instructions: RwLock::new(None),
                dispatcher: Dispatcher::new(),
                sessions: RwLock::new(HashMap::new()),
                notify_tx,
                notify_rx: Mutex::new(Some(notify_rx)),
            }),
        }
    }

    /// The server's identity
    pub fn info(&self) -> &ServerInfo {
        &self.inner.info
    }

    /// Replace the advertised capabilities
    pub async fn set_capabilities(&self, capabilities: ServerCapabilities) {
        *self.inner.capabilities.write().await = capabilities;
    }

    /// Set the instructions returned from initialize
    pub async fn set_instructions<S: Into<String>>(&self, instructions: S) {
        *self.inner.instructions.write().await = Some(instructions.into());
    }

    /// Start serving over a transport.
    ///
    /// Registers the built-in handlers, starts the transport and spawns
    /// the event loop. Returns once the transport is listening.
    pub async fn serve<T: Transport + 'static>(
        &self,
        mut transport: T,
        endpoint: &str,
    ) -> McpResult<()> {
        let events = transport
            .take_events()
            .ok_or_else(|| McpError::transport("transport events already taken"))?;
        transport.start(endpoint).await?;

        self.register_builtin_handlers().await;
        let transport: Arc<dyn Transport> = Arc::new(transport);
        self.inner.dispatcher.bind_transport(transport).await;

        // Relay session notifications (list changes, resource updates,
        // log messages) onto the wire.
        let notify_rx = self.inner.notify_rx.lock().await.take();
        if let Some(mut notify_rx) = notify_rx {
            let inner = Arc::downgrade(&self.inner);
            tokio::spawn(async move {
                while let Some((session, notification)) = notify_rx.recv().await {
                    let Some(inner) = inner.upgrade() else { break };
                    let params = match notification.params() {
                        Ok(params) => params,
                        Err(e) => {
                            tracing::error!("failed to encode notification: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = inner
                        .dispatcher
                        .notify(session, notification.method(), params)
                        .await
                    {
                        tracing::warn!("failed to deliver notification: {e}");
                    }
                }
            });
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut events = events;
            while let Some(event) = events.recv().await {
                match event {
                    TransportEvent::Started => {
                        tracing::debug!("server transport started");
                    }
                    TransportEvent::NewSession(session) => {
                        tracing::debug!("new session {session}");
                        inner.sessions.write().await.insert(
                            session,
                            Arc::new(Mutex::new(ServerSession::new(
                                session,
                                inner.notify_tx.clone(),
                            ))),
                        );
                    }
                    TransportEvent::Received(session, frame) => {
                        inner.dispatcher.handle_frame(session, frame).await;
                    }
                    TransportEvent::Error(message) => {
                        tracing::error!("transport error: {message}");
                    }
                    TransportEvent::SessionClosed(session) => {
                        inner.dispatcher.fail_session(session, "session closed").await;
                        inner.sessions.write().await.remove(&session);
                    }
                    TransportEvent::Finished => {
                        let sessions: Vec<SessionId> =
                            inner.sessions.read().await.keys().copied().collect();
                        for session in sessions {
                            inner
                                .dispatcher
                                .fail_session(session, "transport finished")
                                .await;
                        }
                        inner.sessions.write().await.clear();
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    // ========================================================================
    // Session access
    // ========================================================================

    /// The state of one session, if it exists
    pub async fn session(&self, session: SessionId) -> Option<Arc<Mutex<ServerSession>>> {
        self.inner.sessions.read().await.get(&session).cloned()
    }

    /// IDs of every live session
    pub async fn sessions(&self) -> Vec<SessionId> {
        self.inner.sessions.read().await.keys().copied().collect()
    }

    /// Whether a session has completed the initialized notification
    pub async fn is_initialized(&self, session: SessionId) -> bool {
        match self.session(session).await {
            Some(state) => state.lock().await.is_initialized(),
            None => false,
        }
    }

    async fn session_or_err(&self, session: SessionId) -> McpResult<Arc<Mutex<ServerSession>>> {
        self.session(session)
            .await
            .ok_or_else(|| McpError::protocol(format!("unknown session {session}")))
    }

    /// Append a resource with its contents to a session
    pub async fn append_resource(
        &self,
        session: SessionId,
        resource: Resource,
        contents: ResourceContents,
    ) -> McpResult<()> {
        let state = self.session_or_err(session).await?;
        state.lock().await.append_resource(resource, contents);
        Ok(())
    }

    /// Replace a session's resource at a URI; notifies subscribers
    pub async fn replace_resource(
        &self,
        session: SessionId,
        uri: &str,
        resource: Resource,
        contents: ResourceContents,
    ) -> McpResult<bool> {
        let state = self.session_or_err(session).await?;
        let replaced = state.lock().await.replace_resource(uri, resource, contents);
        Ok(replaced)
    }

    /// Remove a session's resource at a URI
    pub async fn remove_resource(&self, session: SessionId, uri: &str) -> McpResult<bool> {
        let state = self.session_or_err(session).await?;
        let removed = state.lock().await.remove_resource(uri);
        Ok(removed)
    }

    /// Append a resource template to a session
    pub async fn append_resource_template(
        &self,
        session: SessionId,
        template: ResourceTemplate,
    ) -> McpResult<()> {
        let state = self.session_or_err(session).await?;
        state.lock().await.append_resource_template(template);
        Ok(())
    }

    /// Append a prompt with its materialized message to a session
    pub async fn append_prompt(
        &self,
        session: SessionId,
        prompt: Prompt,
        message: PromptMessage,
    ) -> McpResult<()> {
        let state = self.session_or_err(session).await?;
        state.lock().await.append_prompt(prompt, message);
        Ok(())
    }

    /// Register a tool set on a session
    pub async fn register_tool_set(
        &self,
        session: SessionId,
        tool_set: Arc<ToolSet>,
    ) -> McpResult<()> {
        let state = self.session_or_err(session).await?;
        state.lock().await.register_tool_set(tool_set);
        Ok(())
    }

    // ========================================================================
    // Server-initiated traffic
    // ========================================================================

    /// Ask the client to run a sampling completion
    pub async fn create_message(
        &self,
        session: SessionId,
        params: CreateMessageParams,
    ) -> McpResult<CreateMessageResult> {
        let value = self
            .inner
            .dispatcher
            .request_and_wait(
                session,
                methods::SAMPLING_CREATE_MESSAGE,
                Some(serde_json::to_value(&params)?),
                self.inner.config.request_timeout,
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Ask the client for its roots and record them on the session
    pub async fn list_roots(&self, session: SessionId) -> McpResult<ListRootsResult> {
        let value = self
            .inner
            .dispatcher
            .request_and_wait(
                session,
                methods::ROOTS_LIST,
                None,
                self.inner.config.request_timeout,
            )
            .await?;
        let result: ListRootsResult = serde_json::from_value(value)?;
        if let Some(state) = self.session(session).await {
            state.lock().await.set_roots(result.roots.clone());
        }
        Ok(result)
    }

    /// Ping the client
    pub async fn ping(&self, session: SessionId) -> McpResult<()> {
        self.inner
            .dispatcher
            .request_and_wait(
                session,
                methods::PING,
                None,
                self.inner.config.request_timeout,
            )
            .await?;
        Ok(())
    }

    /// Report progress for a long-running request
    pub async fn notify_progress(
        &self,
        session: SessionId,
        progress_token: ProgressToken,
        progress: f64,
        total: Option<f64>,
    ) -> McpResult<()> {
        let params = ProgressParams {
            progress_token,
            progress,
            total,
        };
        self.inner
            .dispatcher
            .notify(
                session,
                methods::PROGRESS,
                Some(serde_json::to_value(&params)?),
            )
            .await
    }

    /// Emit a log message to a session, honoring its logging/setLevel filter
    pub async fn log(
        &self,
        session: SessionId,
        level: LoggingLevel,
        logger: Option<String>,
        data: Value,
    ) -> McpResult<()> {
        let state = self.session_or_err(session).await?;
        if !state.lock().await.should_log(level) {
            return Ok(());
        }
        let params = LoggingMessageParams {
            level,
            logger,
            data,
        };
        self.inner
            .dispatcher
            .notify(
                session,
                methods::LOGGING_MESSAGE,
                Some(serde_json::to_value(&params)?),
            )
            .await
    }

    // ========================================================================
    // Built-in handlers
    // ========================================================================

    fn handler<F>(inner: &Arc<ServerInner>, f: F) -> RequestHandler
    where
        F: Fn(
                Arc<ServerInner>,
                SessionId,
                JsonRpcRequest,
            ) -> std::pin::Pin<Box<dyn std::future::Future<Output = HandlerResult> + Send>>
            + Send
            + Sync
            + 'static,
    {
        let weak: Weak<ServerInner> = Arc::downgrade(inner);
        Arc::new(move |session, request| {
            let Some(inner) = weak.upgrade() else {
                return Box::pin(async {
                    Err(ErrorObject::new(
                        error_codes::INTERNAL_ERROR,
                        "server is gone",
                    ))
                });
            };
            f(inner, session, request)
        })
    }

    async fn locked_session(
        inner: &Arc<ServerInner>,
        session: SessionId,
    ) -> Result<Arc<Mutex<ServerSession>>, ErrorObject> {
        inner.sessions.read().await.get(&session).cloned().ok_or_else(|| {
            ErrorObject::new(
                error_codes::INTERNAL_ERROR,
                format!("unknown session {session}"),
            )
        })
    }

    /// Reject everything but initialize and ping before initialization
    async fn require_initialized(
        inner: &Arc<ServerInner>,
        session: SessionId,
    ) -> Result<Arc<Mutex<ServerSession>>, ErrorObject> {
        let state = Self::locked_session(inner, session).await?;
        if !state.lock().await.is_initialized() {
            return Err(ErrorObject::new(error_codes::LIFECYCLE, "Not initialized"));
        }
        Ok(state)
    }

    fn decode<T: serde::de::DeserializeOwned>(
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

    fn decode_or_default<T: serde::de::DeserializeOwned + Default>(
        request: &JsonRpcRequest,
    ) -> Result<T, ErrorObject> {
        match &request.params {
            Some(params) => serde_json::from_value(params.clone()).map_err(|e| {
                ErrorObject::new(
                    error_codes::INVALID_PARAMS,
                    format!("{}: {e}", request.method),
                )
            }),
            None => Ok(T::default()),
        }
    }

    fn ok<T: serde::Serialize>(result: &T) -> HandlerResult {
        serde_json::to_value(result)
            .map_err(|e| ErrorObject::new(error_codes::INTERNAL_ERROR, e.to_string()))
    }

    async fn register_builtin_handlers(&self) {
        let inner = &self.inner;
        let dispatcher = &inner.dispatcher;

        dispatcher
            .register_request_handler(
                methods::INITIALIZE,
                Self::handler(inner, |inner, session, request| {
                    Box::pin(async move {
                        let params: InitializeParams = Self::decode(&request)?;
                        let state = Self::locked_session(&inner, session).await?;
                        let mut state = state.lock().await;
                        if state.is_initialized() {
                            return Err(ErrorObject::new(error_codes::LIFECYCLE, "Initialized"));
                        }

                        let requested = params.protocol_version.parse::<ProtocolVersion>().ok();
                        let version = match requested {
                            Some(v) if inner.config.supported_versions.contains(&v) => v,
                            _ => {
                                return Err(ErrorObject::new(
                                    error_codes::UNSUPPORTED_PROTOCOL_VERSION,
                                    format!(
                                        "Protocol Version {} is not supported",
                                        params.protocol_version
                                    ),
                                ));
                            }
                        };

                        state.set_protocol_version(version);
                        state.set_client_info(params.client_info);
                        inner.dispatcher.set_session_version(session, version).await;

                        Self::ok(&InitializeResult {
                            protocol_version: version.to_string(),
                            capabilities: inner.capabilities.read().await.clone(),
                            server_info: inner.info.clone(),
                            instructions: inner.instructions.read().await.clone(),
                        })
                    })
                }),
            )
            .await;

        dispatcher
            .register_request_handler(
                methods::PING,
                // Ping is accepted even before initialization.
                Self::handler(inner, |_inner, _session, _request| {
                    Box::pin(async { Self::ok(&EmptyResult::default()) })
                }),
            )
            .await;

        dispatcher
            .register_request_handler(
                methods::RESOURCES_LIST,
                Self::handler(inner, |inner, session, request| {
                    Box::pin(async move {
                        let params: ListParams = Self::decode_or_default(&request)?;
                        let state = Self::require_initialized(&inner, session).await?;
                        let (resources, next_cursor) =
                            state.lock().await.resources(params.cursor.as_deref());
                        Self::ok(&ListResourcesResult {
                            resources,
                            next_cursor,
                        })
                    })
                }),
            )
            .await;

        dispatcher
            .register_request_handler(
                methods::RESOURCES_READ,
                Self::handler(inner, |inner, session, request| {
                    Box::pin(async move {
                        let params: ReadResourceParams = Self::decode(&request)?;
                        let state = Self::require_initialized(&inner, session).await?;
                        let contents = state.lock().await.contents(&params.uri);
                        Self::ok(&ReadResourceResult { contents })
                    })
                }),
            )
            .await;

        dispatcher
            .register_request_handler(
                methods::RESOURCES_TEMPLATES_LIST,
                Self::handler(inner, |inner, session, request| {
                    Box::pin(async move {
                        let params: ListParams = Self::decode_or_default(&request)?;
                        let state = Self::require_initialized(&inner, session).await?;
                        let (resource_templates, next_cursor) = state
                            .lock()
                            .await
                            .resource_templates(params.cursor.as_deref());
                        Self::ok(&ListResourceTemplatesResult {
                            resource_templates,
                            next_cursor,
                        })
                    })
                }),
            )
            .await;

        dispatcher
            .register_request_handler(
                methods::RESOURCES_SUBSCRIBE,
                Self::handler(inner, |inner, session, request| {
                    Box::pin(async move {
                        let params: SubscribeParams = Self::decode(&request)?;
                        let state = Self::require_initialized(&inner, session).await?;
                        state.lock().await.subscribe(&params.uri);
                        Self::ok(&EmptyResult::default())
                    })
                }),
            )
            .await;

        dispatcher
            .register_request_handler(
                methods::RESOURCES_UNSUBSCRIBE,
                Self::handler(inner, |inner, session, request| {
                    Box::pin(async move {
                        let params: UnsubscribeParams = Self::decode(&request)?;
                        let state = Self::require_initialized(&inner, session).await?;
                        state.lock().await.unsubscribe(&params.uri);
                        Self::ok(&EmptyResult::default())
                    })
                }),
            )
            .await;

        dispatcher
            .register_request_handler(
                methods::PROMPTS_LIST,
                Self::handler(inner, |inner, session, request| {
                    Box::pin(async move {
                        let params: ListParams = Self::decode_or_default(&request)?;
                        let state = Self::require_initialized(&inner, session).await?;
                        let (prompts, next_cursor) =
                            state.lock().await.prompts(params.cursor.as_deref());
                        Self::ok(&ListPromptsResult {
                            prompts,
                            next_cursor,
                        })
                    })
                }),
            )
            .await;

        dispatcher
            .register_request_handler(
                methods::PROMPTS_GET,
                Self::handler(inner, |inner, session, request| {
                    Box::pin(async move {
                        let params: GetPromptParams = Self::decode(&request)?;
                        let state = Self::require_initialized(&inner, session).await?;
                        let messages = state.lock().await.prompt_messages(&params.name);
                        Self::ok(&GetPromptResult {
                            description: None,
                            messages,
                        })
                    })
                }),
            )
            .await;

        dispatcher
            .register_request_handler(
                methods::TOOLS_LIST,
                Self::handler(inner, |inner, session, request| {
                    Box::pin(async move {
                        let params: ListParams = Self::decode_or_default(&request)?;
                        let state = Self::require_initialized(&inner, session).await?;
                        let (tools, next_cursor) =
                            state.lock().await.tools(params.cursor.as_deref());
                        Self::ok(&ListToolsResult { tools, next_cursor })
                    })
                }),
            )
            .await;

        dispatcher
            .register_request_handler(
                methods::TOOLS_CALL,
                Self::handler(inner, |inner, session, request| {
                    Box::pin(async move {
                        let params: CallToolParams = Self::decode(&request)?;
                        let state = Self::require_initialized(&inner, session).await?;
                        let arguments = params.arguments.unwrap_or_else(Map::new);
                        let (content, ok) =
                            state.lock().await.call_tool(&params.name, &arguments);
                        Self::ok(&CallToolResult {
                            content,
                            is_error: (!ok).then_some(true),
                        })
                    })
                }),
            )
            .await;

        dispatcher
            .register_request_handler(
                methods::LOGGING_SET_LEVEL,
                Self::handler(inner, |inner, session, request| {
                    Box::pin(async move {
                        let params: SetLevelParams = Self::decode(&request)?;
                        let state = Self::require_initialized(&inner, session).await?;
                        state.lock().await.set_logging_level(params.level);
                        Self::ok(&EmptyResult::default())
                    })
                }),
            )
            .await;

        dispatcher
            .register_request_handler(
                methods::COMPLETION_COMPLETE,
                Self::handler(inner, |inner, session, request| {
                    Box::pin(async move {
                        let params: CompleteParams = Self::decode(&request)?;
                        let state = Self::require_initialized(&inner, session).await?;
                        let state = state.lock().await;
                        let values = match &params.reference {
                            CompletionReference::Prompt { .. } => Vec::new(),
                            CompletionReference::Resource { .. } => {
                                // Suggest session resource URIs extending the
                                // typed prefix.
                                let (resources, _) = state.resources(None);
                                resources
                                    .into_iter()
                                    .map(|r| r.uri)
                                    .filter(|uri| uri.starts_with(&params.argument.value))
                                    .take(100)
                                    .collect()
                            }
                        };
                        let total = values.len() as u64;
                        Self::ok(&CompleteResult {
                            completion: Completion {
                                values,
                                total: Some(total),
                                has_more: Some(false),
                            },
                        })
                    })
                }),
            )
            .await;

        let inner_for_init = Arc::downgrade(inner);
        dispatcher
            .register_notification_handler(
                methods::INITIALIZED,
                Arc::new(move |session, _notification| {
                    let inner = inner_for_init.clone();
                    Box::pin(async move {
                        let Some(inner) = inner.upgrade() else {
                            return;
                        };
                        if let Some(state) = inner.sessions.read().await.get(&session).cloned() {
                            state.lock().await.set_initialized(true);
                            tracing::debug!("session {session} initialized");
                        }
                    })
                }),
            )
            .await;

        let inner_for_roots = Arc::downgrade(inner);
        dispatcher
            .register_notification_handler(
                methods::ROOTS_LIST_CHANGED,
                Arc::new(move |session, _notification| {
                    // The recorded roots are stale; drop them until the next
                    // roots/list round trip.
                    let inner = inner_for_roots.clone();
                    Box::pin(async move {
                        let Some(inner) = inner.upgrade() else {
                            return;
                        };
                        if let Some(state) = inner.sessions.read().await.get(&session).cloned() {
                            state.lock().await.set_roots(Vec::new());
                        }
                    })
                }),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capabilities_advertise_core_features() {
        let server = McpServer::new("echo-server", "1.0.0");
        let capabilities =
            tokio_test::block_on(async { server.inner.capabilities.read().await.clone() });
        assert!(capabilities.resources.unwrap().subscribe.unwrap());
        assert!(capabilities.tools.unwrap().list_changed.unwrap());
        assert!(capabilities.prompts.unwrap().list_changed.unwrap());
        assert!(capabilities.logging.is_some());
    }

    #[test]
    fn test_server_info() {
        let server = McpServer::new("echo-server", "1.0.0");
        assert_eq!(server.info().name, "echo-server");
        assert_eq!(server.info().version, "1.0.0");
    }
}
