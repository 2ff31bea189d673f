// ! SSE transport
// !
// ! An HTTP/1.1 listener multiplexing many sessions over one socket.
// ! `GET /sse` opens a long-lived event stream: the first frame is an
// ! `endpoint` event naming the POST URL for that session, every later
// ! frame is a `message` event carrying one compact JSON message.
// ! `POST /messages/?session_id=ID` feeds one inbound message.
// !
// ! The client half consumes such a stream and posts to the advertised
// ! endpoint.

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::core::error::{McpError, McpResult};
use crate::transport::traits::{
    SessionId, Transport, TransportEvent, TransportEvents, event_channel,
};

/// Default listen address for the SSE transport
pub const DEFAULT_SSE_ADDRESS: &str = "127.0.0.1:8000";

/// Format one SSE frame with the CRLF separators the protocol mandates
fn sse_frame(event: &str, data: &str) -> String {
    format!("event: {event}\r\ndata: {data}\r\n\r\n")
}

/// Incremental SSE parser: appends a chunk to the carry buffer and returns
/// every complete `(event, data)` pair found so far.
fn parse_sse_chunk(buffer: &mut String, chunk: &str) -> Vec<(String, String)> {
    buffer.push_str(chunk);
    let mut events = Vec::new();

    loop {
        let Some((boundary, skip)) = find_blank_line(buffer) else {
            break;
        };
        let block: String = buffer.drain(..boundary + skip).collect();
        let mut event = String::new();
        let mut data = String::new();
        for line in block.lines() {
            if let Some(rest) = line.strip_prefix("event:") {
                event = rest.trim().to_string();
            } else if let Some(rest) = line.strip_prefix("data:") {
                data = rest.trim().to_string();
            }
        }
        if !event.is_empty() || !data.is_empty() {
            events.push((event, data));
        }
    }

    events
}

fn find_blank_line(buffer: &str) -> Option<(usize, usize)> {
    let crlf = buffer.find("\r\n\r\n").map(|i| (i, 4));
    let lf = buffer.find("\n\n").map(|i| (i, 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 < b.0 { a } else { b }),
        (one, other) => one.or(other),
    }
}

// ============================================================================
// Server transport
// ============================================================================

struct SseServerState {
    sessions: RwLock<HashMap<SessionId, mpsc::UnboundedSender<Value>>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

/// Removes the session and reports the closure when the event stream drops
struct SessionGuard {
    session: SessionId,
    state: Arc<SseServerState>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Ok(mut sessions) = self.state.sessions.write() {
            sessions.remove(&self.session);
        }
        let _ = self
            .state
            .events
            .send(TransportEvent::SessionClosed(self.session));
    }
}

/// SSE transport for servers, multiplexing sessions over one listener
pub struct SseServerTransport {
    state: Arc<SseServerState>,
    events_rx: Option<TransportEvents>,
    listener: Option<tokio::net::TcpListener>,
    local_addr: Option<std::net::SocketAddr>,
    serve_handle: Option<tokio::task::JoinHandle<()>>,
}

impl SseServerTransport {
    /// Create an unstarted SSE server transport
    pub fn new() -> Self {
        let (events_tx, events_rx) = event_channel();
        Self {
            state: Arc::new(SseServerState {
                sessions: RwLock::new(HashMap::new()),
                events: events_tx,
            }),
            events_rx: Some(events_rx),
            listener: None,
            local_addr: None,
            serve_handle: None,
        }
    }

    /// Bind the listener eagerly, so the local address (and an OS-assigned
    /// port) is known before `start`.
    pub async fn bind(address: &str) -> McpResult<Self> {
        let mut transport = Self::new();
        let listener = tokio::net::TcpListener::bind(address)
            .await
            .map_err(|e| McpError::transport(format!("bind {address}: {e}")))?;
        transport.local_addr = Some(listener.local_addr()?);
        transport.listener = Some(listener);
        Ok(transport)
    }

    /// The bound address, once bound
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.local_addr
    }

    /// Number of currently open sessions
    pub fn session_count(&self) -> usize {
        self.state.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/sse", get(get_sse))
            .route("/messages", post(post_messages))
            .route("/messages/", post(post_messages))
            .with_state(self.state.clone())
    }
}

impl Default for SseServerTransport {
    fn default() -> Self {
        Self::new()
    }
}

async fn get_sse(State(state): State<Arc<SseServerState>>, headers: HeaderMap) -> Response {
    let accepts_event_stream = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"));
    if !accepts_event_stream {
        return (StatusCode::BAD_REQUEST, "text/event-stream required").into_response();
    }

    let session = SessionId::new_v4();
    let (tx, rx) = mpsc::unbounded_channel::<Value>();
    {
        let mut sessions = match state.sessions.write() {
            Ok(sessions) => sessions,
            Err(_) => {
                return (StatusCode::INTERNAL_SERVER_ERROR, "session table poisoned")
                    .into_response();
            }
        };
        sessions.insert(session, tx);
    }
    let _ = state.events.send(TransportEvent::NewSession(session));

    let guard = SessionGuard {
        session,
        state: state.clone(),
    };

    let endpoint = sse_frame("endpoint", &format!("/messages/?session_id={session}"));
    let first = futures::stream::once(async move { Ok::<Bytes, Infallible>(Bytes::from(endpoint)) });
    let rest = UnboundedReceiverStream::new(rx).map(move |message| {
        // Keep the guard alive for the lifetime of the stream.
        let _ = &guard;
        let data = serde_json::to_string(&message).unwrap_or_default();
        Ok::<Bytes, Infallible>(Bytes::from(sse_frame("message", &data)))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(first.chain(rest)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn post_messages(
    State(state): State<Arc<SseServerState>>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let Some(session) = query
        .get("session_id")
        .and_then(|id| id.parse::<SessionId>().ok())
    else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    let known = state
        .sessions
        .read()
        .map(|sessions| sessions.contains_key(&session))
        .unwrap_or(false);
    if !known {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    }

    let message: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("unparseable POST body for session {session}: {e}");
            return (StatusCode::BAD_REQUEST, "invalid JSON").into_response();
        }
    };

    let _ = state.events.send(TransportEvent::Received(session, message));
    (StatusCode::OK, "Accept").into_response()
}

#[async_trait]
impl Transport for SseServerTransport {
    async fn start(&mut self, endpoint: &str) -> McpResult<()> {
        if self.serve_handle.is_some() {
            return Err(McpError::transport("transport already started"));
        }

        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => {
                let address = if endpoint.is_empty() {
                    DEFAULT_SSE_ADDRESS
                } else {
                    endpoint
                };
                tokio::net::TcpListener::bind(address)
                    .await
                    .map_err(|e| McpError::transport(format!("bind {address}: {e}")))?
            }
        };
        self.local_addr = Some(listener.local_addr()?);
        tracing::debug!("SSE transport listening on {}", listener.local_addr()?);

        let app = self.router();
        let events = self.state.events.clone();
        let _ = events.send(TransportEvent::Started);

        self.serve_handle = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                let _ = events.send(TransportEvent::Error(format!("serve: {e}")));
            }
            let _ = events.send(TransportEvent::Finished);
        }));

        Ok(())
    }

    async fn send(&self, session: SessionId, message: Value) -> McpResult<()> {
        let sessions = self
            .state
            .sessions
            .read()
            .map_err(|_| McpError::internal("session table poisoned"))?;
        let tx = sessions
            .get(&session)
            .ok_or_else(|| McpError::transport(format!("unknown session {session}")))?;
        tx.send(message)
            .map_err(|_| McpError::transport(format!("session {session} stream closed")))
    }

    fn take_events(&mut self) -> Option<TransportEvents> {
        self.events_rx.take()
    }

    async fn close(&mut self) -> McpResult<()> {
        if let Some(handle) = self.serve_handle.take() {
            handle.abort();
        }
        if let Ok(mut sessions) = self.state.sessions.write() {
            sessions.clear();
        }
        Ok(())
    }
}

// ============================================================================
// Client transport
// ============================================================================

/// SSE transport for clients: one event-stream session against a server
pub struct SseClientTransport {
    base_url: String,
    client: reqwest::Client,
    session: SessionId,
    endpoint_tx: watch::Sender<Option<String>>,
    endpoint_rx: watch::Receiver<Option<String>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Option<TransportEvents>,
    reader_handle: Option<tokio::task::JoinHandle<()>>,
}

impl SseClientTransport {
    /// Create a transport for a server at `base_url` (e.g. "http://127.0.0.1:8000")
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        let (events_tx, events_rx) = event_channel();
        let (endpoint_tx, endpoint_rx) = watch::channel(None);
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            session: SessionId::new_v4(),
            endpoint_tx,
            endpoint_rx,
            events_tx,
            events_rx: Some(events_rx),
            reader_handle: None,
        }
    }

    /// The locally minted session placeholder.
    ///
    /// Once the endpoint event arrives, the session announced upward is
    /// the server-minted identifier from the endpoint URL.
    pub fn session(&self) -> SessionId {
        self.session
    }

    async fn wait_for_endpoint(&self) -> McpResult<String> {
        let mut rx = self.endpoint_rx.clone();
        loop {
            if let Some(url) = rx.borrow().clone() {
                return Ok(url);
            }
            rx.changed()
                .await
                .map_err(|_| McpError::connection("SSE stream ended before endpoint event"))?;
        }
    }
}

#[async_trait]
impl Transport for SseClientTransport {
    async fn start(&mut self, endpoint: &str) -> McpResult<()> {
        if self.reader_handle.is_some() {
            return Err(McpError::transport("transport already started"));
        }
        if !endpoint.is_empty() {
            self.base_url = if endpoint.starts_with("http") {
                endpoint.to_string()
            } else {
                format!("http://{endpoint}")
            };
        }

        let sse_url = format!("{}/sse", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&sse_url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| McpError::connection(format!("GET {sse_url}: {e}")))?;
        if !response.status().is_success() {
            return Err(McpError::Http(format!(
                "GET {sse_url}: {}",
                response.status()
            )));
        }

        let base_url = self.base_url.trim_end_matches('/').to_string();
        let events = self.events_tx.clone();
        let endpoint_tx = self.endpoint_tx.clone();
        let mut session = self.session;
        let _ = events.send(TransportEvent::Started);

        self.reader_handle = Some(tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();
            let mut announced = false;
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = events.send(TransportEvent::Error(format!("SSE stream: {e}")));
                        break;
                    }
                };
                let text = String::from_utf8_lossy(&chunk).into_owned();
                for (event, data) in parse_sse_chunk(&mut buffer, &text) {
                    match event.as_str() {
                        "endpoint" => {
                            // Adopt the server-minted session identifier.
                            if let Some(id) = data
                                .split("session_id=")
                                .nth(1)
                                .and_then(|id| id.parse::<SessionId>().ok())
                            {
                                session = id;
                            }
                            let url = match url::Url::parse(&base_url)
                                .and_then(|base| base.join(&data))
                            {
                                Ok(url) => url.to_string(),
                                Err(e) => {
                                    tracing::warn!("bad endpoint {data:?}: {e}");
                                    format!("{base_url}{data}")
                                }
                            };
                            let _ = endpoint_tx.send(Some(url));
                            if !announced {
                                announced = true;
                                let _ = events.send(TransportEvent::NewSession(session));
                            }
                        }
                        "message" => match serde_json::from_str::<Value>(&data) {
                            Ok(value) => {
                                let _ = events.send(TransportEvent::Received(session, value));
                            }
                            Err(e) => {
                                tracing::warn!("unparseable SSE message: {e}: {data}");
                            }
                        },
                        other => {
                            tracing::debug!("ignoring SSE event {other:?}");
                        }
                    }
                }
            }
            let _ = events.send(TransportEvent::SessionClosed(session));
            let _ = events.send(TransportEvent::Finished);
        }));

        Ok(())
    }

    async fn send(&self, _session: SessionId, message: Value) -> McpResult<()> {
        let endpoint = self.wait_for_endpoint().await?;
        let response = self
            .client
            .post(&endpoint)
            .json(&message)
            .send()
            .await
            .map_err(|e| McpError::Http(format!("POST {endpoint}: {e}")))?;
        if !response.status().is_success() {
            return Err(McpError::Http(format!(
                "POST {endpoint}: {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn take_events(&mut self) -> Option<TransportEvents> {
        self.events_rx.take()
    }

    async fn close(&mut self) -> McpResult<()> {
        if let Some(handle) = self.reader_handle.take() {
            handle.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_frame_crlf_format() {
        assert_eq!(
            sse_frame("endpoint", "/messages/?session_id=abc"),
            "event: endpoint\r\ndata: /messages/?session_id=abc\r\n\r\n"
        );
    }

    #[test]
    fn test_parse_sse_chunk_complete_frame() {
        let mut buffer = String::new();
        let events = parse_sse_chunk(&mut buffer, "event: message\r\ndata: {\"a\":1}\r\n\r\n");
        assert_eq!(
            events,
            vec![("message".to_string(), "{\"a\":1}".to_string())]
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_parse_sse_chunk_split_across_reads() {
        let mut buffer = String::new();
        assert!(parse_sse_chunk(&mut buffer, "event: endpoint\r\ndata: /mess").is_empty());
        let events = parse_sse_chunk(&mut buffer, "ages/?session_id=x\r\n\r\n");
        assert_eq!(
            events,
            vec![(
                "endpoint".to_string(),
                "/messages/?session_id=x".to_string()
            )]
        );
    }

    #[test]
    fn test_parse_sse_chunk_multiple_frames_and_lf_only() {
        let mut buffer = String::new();
        let events = parse_sse_chunk(
            &mut buffer,
            "event: message\ndata: 1\n\nevent: message\ndata: 2\n\n",
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].1, "1");
        assert_eq!(events[1].1, "2");
    }
}
