// ! JSON-RPC dispatcher
// !
// ! The correlator both halves of the runtime sit on. It assigns request
// ! IDs from a per-dispatcher counter, tracks pending callbacks per
// ! session, routes inbound requests to registered handlers, fans out
// ! notifications in registration order, and serializes everything with
// ! the session's negotiated protocol version.

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, oneshot};
use tokio::task::AbortHandle;

use crate::core::error::{McpError, McpResult};
use crate::protocol::batch;
use crate::protocol::methods;
use crate::protocol::types::{
    ErrorObject, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
    error_codes,
};
use crate::protocol::version::{ProtocolVersion, encode_versioned};
use crate::transport::traits::{SessionId, Transport};

/// What a request handler produces: a result payload or an on-wire error
pub type HandlerResult = Result<Value, ErrorObject>;

/// A registered request handler.
///
/// Receives the session and the raw request envelope; typed wrappers decode
/// the params and encode the result.
pub type RequestHandler = Arc<
    dyn Fn(SessionId, JsonRpcRequest) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>>
        + Send
        + Sync,
>;

/// A registered notification handler.
///
/// Handlers run to completion in registration order before the next frame
/// on the session is dispatched.
pub type NotificationHandler = Arc<
    dyn Fn(SessionId, JsonRpcNotification) -> Pin<Box<dyn Future<Output = ()> + Send>>
        + Send
        + Sync,
>;

struct PendingEntry {
    sender: oneshot::Sender<McpResult<Value>>,
}

/// The symmetric JSON-RPC dispatcher
pub struct Dispatcher {
    /// Self-handle for the request tasks this dispatcher spawns
    weak: std::sync::Weak<Dispatcher>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    next_id: AtomicI64,
    pending: Mutex<HashMap<SessionId, HashMap<RequestId, PendingEntry>>>,
    request_handlers: RwLock<HashMap<String, RequestHandler>>,
    notification_handlers: RwLock<HashMap<String, Vec<NotificationHandler>>>,
    versions: RwLock<HashMap<SessionId, ProtocolVersion>>,
    in_flight: Mutex<HashMap<(SessionId, RequestId), AbortHandle>>,
}

impl Dispatcher {
    /// Create a dispatcher with no transport bound yet
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            transport: RwLock::new(None),
            next_id: AtomicI64::new(0),
            pending: Mutex::new(HashMap::new()),
            request_handlers: RwLock::new(HashMap::new()),
            notification_handlers: RwLock::new(HashMap::new()),
            versions: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// Bind the transport all outbound traffic goes through
    pub async fn bind_transport(&self, transport: Arc<dyn Transport>) {
        *self.transport.write().await = Some(transport);
    }

    async fn transport(&self) -> McpResult<Arc<dyn Transport>> {
        self.transport
            .read()
            .await
            .clone()
            .ok_or_else(|| McpError::transport("no transport bound"))
    }

    /// The protocol version negotiated for a session, defaulting to latest
    pub async fn session_version(&self, session: SessionId) -> ProtocolVersion {
        self.versions
            .read()
            .await
            .get(&session)
            .copied()
            .unwrap_or_default()
    }

    /// Record the protocol version negotiated for a session
    pub async fn set_session_version(&self, session: SessionId, version: ProtocolVersion) {
        self.versions.write().await.insert(session, version);
    }

    /// Register the handler for a request method, replacing any previous one
    pub async fn register_request_handler(&self, method: &str, handler: RequestHandler) {
        self.request_handlers
            .write()
            .await
            .insert(method.to_string(), handler);
    }

    /// Append a handler for a notification method
    pub async fn register_notification_handler(&self, method: &str, handler: NotificationHandler) {
        self.notification_handlers
            .write()
            .await
            .entry(method.to_string())
            .or_default()
            .push(handler);
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    /// Issue a request on a session and receive the reply channel.
    ///
    /// The callback fires exactly once: on reply, on timeout expiry, or on
    /// session teardown.
    pub async fn request(
        &self,
        session: SessionId,
        method: &str,
        params: Option<Value>,
    ) -> McpResult<(RequestId, oneshot::Receiver<McpResult<Value>>)> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending
                .entry(session)
                .or_default()
                .insert(id.clone(), PendingEntry { sender });
        }

        let envelope = JsonRpcRequest::new(id.clone(), method, params)?;
        if let Err(e) = self.send_versioned(session, &envelope).await {
            let mut pending = self.pending.lock().await;
            if let Some(entries) = pending.get_mut(&session) {
                entries.remove(&id);
            }
            return Err(e);
        }
        Ok((id, receiver))
    }

    /// Issue a request and wait for its reply, with an optional deadline.
    ///
    /// On expiry the pending entry is removed so a late reply is dropped.
    pub async fn request_and_wait(
        &self,
        session: SessionId,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> McpResult<Value> {
        let (id, receiver) = self.request(session, method, params).await?;
        let reply = match timeout {
            Some(deadline) => match tokio::time::timeout(deadline, receiver).await {
                Ok(reply) => reply,
                Err(_) => {
                    let mut pending = self.pending.lock().await;
                    if let Some(entries) = pending.get_mut(&session) {
                        entries.remove(&id);
                    }
                    return Err(McpError::timeout(format!("{method} request timed out")));
                }
            },
            None => receiver.await,
        };
        reply.map_err(|_| McpError::transport("reply channel closed"))?
    }

    /// Emit a notification on a session
    pub async fn notify(
        &self,
        session: SessionId,
        method: &str,
        params: Option<Value>,
    ) -> McpResult<()> {
        let envelope = JsonRpcNotification::new(method, params)?;
        let version = self.session_version(session).await;
        let value = encode_versioned(&envelope, version)?;
        self.transport().await?.notify(session, value).await
    }

    /// Cancel an outbound request: drop the pending callback and tell the
    /// peer. A reply that still arrives is discarded silently.
    pub async fn cancel(
        &self,
        session: SessionId,
        id: RequestId,
        reason: Option<String>,
    ) -> McpResult<()> {
        {
            let mut pending = self.pending.lock().await;
            if let Some(entries) = pending.get_mut(&session) {
                if let Some(entry) = entries.remove(&id) {
                    let _ = entry
                        .sender
                        .send(Err(McpError::Cancelled(format!("request {id} cancelled"))));
                }
            }
        }
        let params = serde_json::json!({
            "requestId": id,
            "reason": reason,
        });
        self.notify(session, methods::CANCELLED, Some(params)).await
    }

    async fn send_versioned<T: serde::Serialize>(
        &self,
        session: SessionId,
        message: &T,
    ) -> McpResult<()> {
        let version = self.session_version(session).await;
        let value = encode_versioned(message, version)?;
        self.transport().await?.send(session, value).await
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    /// Process one wire frame received on a session.
    ///
    /// Single requests run as abortable tasks so `notifications/cancelled`
    /// can stop them; the elements of a batch run sequentially and their
    /// responses are returned as a batch in input order.
    pub async fn handle_frame(&self, session: SessionId, frame: Value) {
        let input = batch::split_frame(frame);
        if input.is_batch {
            let mut responses = Vec::new();
            for item in input.items {
                if let Some(response) = self.process_item(session, item).await {
                    responses.push(response);
                }
            }
            if let Some(joined) = batch::join_responses(responses, true) {
                if let Err(e) = self.send_raw(session, joined).await {
                    tracing::warn!("failed to send batch response: {e}");
                }
            }
            return;
        }

        for item in input.items {
            self.dispatch_single(session, item).await;
        }
    }

    async fn send_raw(&self, session: SessionId, value: Value) -> McpResult<()> {
        self.transport().await?.send(session, value).await
    }

    /// Dispatch one standalone envelope; requests run on their own task
    async fn dispatch_single(&self, session: SessionId, item: Value) {
        let Some(object) = item.as_object() else {
            tracing::warn!("not handled: {item}");
            return;
        };

        let is_request = object.contains_key("id") && object.contains_key("method");
        if !is_request {
            self.process_item(session, item).await;
            return;
        }

        let request: JsonRpcRequest = match serde_json::from_value(item.clone()) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("invalid request envelope: {e}: {item}");
                return;
            }
        };
        let id = request.id.clone();
        let Some(this) = self.weak.upgrade() else {
            return;
        };
        let key = (session, id.clone());

        let task = tokio::spawn({
            let key = key.clone();
            async move {
                let response = this.answer_request(session, request).await;
                this.in_flight.lock().await.remove(&key);
                if let Err(e) = this.send_raw(session, response).await {
                    tracing::warn!("failed to send response: {e}");
                }
            }
        });
        self.in_flight.lock().await.insert(key, task.abort_handle());
    }

    /// Process one envelope, returning the response value for requests
    async fn process_item(&self, session: SessionId, item: Value) -> Option<Value> {
        let Some(object) = item.as_object() else {
            tracing::warn!("not handled: {item}");
            return None;
        };

        let has_id = object.contains_key("id");
        let has_method = object.contains_key("method");

        if has_id && !has_method {
            self.complete_pending(session, &item).await;
            return None;
        }

        if has_method && has_id {
            let request: JsonRpcRequest = match serde_json::from_value(item.clone()) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("invalid request envelope: {e}: {item}");
                    return None;
                }
            };
            return Some(self.answer_request(session, request).await);
        }

        if has_method {
            let notification: JsonRpcNotification = match serde_json::from_value(item.clone()) {
                Ok(notification) => notification,
                Err(e) => {
                    tracing::warn!("invalid notification envelope: {e}: {item}");
                    return None;
                }
            };
            self.fan_out_notification(session, notification).await;
            return None;
        }

        tracing::warn!("not handled: {item}");
        None
    }

    /// Complete a pending callback from a response or error envelope
    async fn complete_pending(&self, session: SessionId, item: &Value) {
        let id: RequestId = match item.get("id").cloned().map(serde_json::from_value) {
            Some(Ok(id)) => id,
            _ => {
                tracing::warn!("response with invalid id: {item}");
                return;
            }
        };

        let entry = {
            let mut pending = self.pending.lock().await;
            pending.get_mut(&session).and_then(|e| e.remove(&id))
        };
        let Some(entry) = entry else {
            tracing::warn!("response for unknown request ID {id}");
            return;
        };

        if let Some(result) = item.get("result") {
            let _ = entry.sender.send(Ok(result.clone()));
        } else if let Some(error) = item.get("error") {
            match serde_json::from_value::<ErrorObject>(error.clone()) {
                Ok(error) => {
                    let _ = entry.sender.send(Err(error.into()));
                }
                Err(e) => {
                    let _ = entry
                        .sender
                        .send(Err(McpError::Protocol(format!("malformed error object: {e}"))));
                }
            }
        } else {
            let _ = entry
                .sender
                .send(Err(McpError::Protocol("response with neither result nor error".into())));
        }
    }

    /// Run the handler for a request and build its response envelope
    async fn answer_request(&self, session: SessionId, request: JsonRpcRequest) -> Value {
        let id = request.id.clone();
        let handler = self
            .request_handlers
            .read()
            .await
            .get(&request.method)
            .cloned();

        let outcome = match handler {
            Some(handler) => handler(session, request).await,
            None => Err(ErrorObject::new(
                error_codes::METHOD_NOT_FOUND,
                "Server doesn't handle the request",
            )),
        };

        // Initialize may have just negotiated the session version; the
        // response already serializes under it.
        let version = self.session_version(session).await;

        let envelope = match outcome {
            Ok(result) => {
                serde_json::to_value(JsonRpcResponse::new(id, result)).unwrap_or_default()
            }
            Err(error) => serde_json::to_value(JsonRpcError::new(id, error)).unwrap_or_default(),
        };
        encode_versioned(&envelope, version).unwrap_or(envelope)
    }

    /// Invoke every handler registered for a notification, in order
    async fn fan_out_notification(&self, session: SessionId, notification: JsonRpcNotification) {
        if notification.method == methods::CANCELLED {
            self.abort_cancelled(session, &notification).await;
        }

        let handlers = self
            .notification_handlers
            .read()
            .await
            .get(&notification.method)
            .cloned()
            .unwrap_or_default();
        if handlers.is_empty() && notification.method != methods::CANCELLED {
            tracing::warn!("not handled: {}", notification.method);
            return;
        }
        for handler in handlers {
            handler(session, notification.clone()).await;
        }
    }

    /// Abort the in-flight handler task the peer cancelled
    async fn abort_cancelled(&self, session: SessionId, notification: &JsonRpcNotification) {
        let id: Option<RequestId> = notification
            .params
            .as_ref()
            .and_then(|p| p.get("requestId"))
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok());
        let Some(id) = id else {
            tracing::warn!("cancelled notification without requestId");
            return;
        };
        if let Some(handle) = self.in_flight.lock().await.remove(&(session, id.clone())) {
            tracing::debug!("aborting request {id} on peer cancellation");
            handle.abort();
        }
    }

    /// Fail every pending callback for a session.
    ///
    /// Called on session teardown so each outbound request still sees
    /// exactly one callback invocation.
    pub async fn fail_session(&self, session: SessionId, reason: &str) {
        let entries = self.pending.lock().await.remove(&session);
        if let Some(entries) = entries {
            for (id, entry) in entries {
                tracing::debug!("failing pending request {id}: {reason}");
                let _ = entry.sender.send(Err(McpError::transport(reason)));
            }
        }
        let mut in_flight = self.in_flight.lock().await;
        in_flight.retain(|(s, _), handle| {
            if *s == session {
                handle.abort();
                false
            } else {
                true
            }
        });
        self.versions.write().await.remove(&session);
    }
}
