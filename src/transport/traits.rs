// ! Transport layer contract
// !
// ! A transport is a session-keyed duplex stream of JSON objects. It
// ! raises lifecycle and delivery events upward through a channel the
// ! dispatcher consumes; outbound traffic goes through `send`/`notify`
// ! tagged with the destination session.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::error::McpResult;

/// Opaque session identifier.
///
/// Stdio transports mint one implicit session at start; the SSE transport
/// mints one per accepted event stream.
pub type SessionId = Uuid;

/// Events a transport raises to the dispatcher above it
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The transport began listening or connected
    Started,
    /// A new session was established
    NewSession(SessionId),
    /// One JSON object arrived on a session
    Received(SessionId, Value),
    /// A transport-level error occurred; never becomes a JSON-RPC error
    Error(String),
    /// A session ended
    SessionClosed(SessionId),
    /// The transport reached end of input and will emit nothing further
    Finished,
}

/// Receiving half of a transport's event stream
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// A session-keyed duplex JSON transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin listening or connecting.
    ///
    /// The endpoint string is transport-specific: stdio ignores it, the
    /// SSE listener takes `host:port`.
    async fn start(&mut self, endpoint: &str) -> McpResult<()>;

    /// Queue one message for delivery to a session
    async fn send(&self, session: SessionId, message: Value) -> McpResult<()>;

    /// Queue one notification for delivery to a session.
    ///
    /// Separate hook so a transport may route notifications differently;
    /// the default is plain `send`.
    async fn notify(&self, session: SessionId, message: Value) -> McpResult<()> {
        self.send(session, message).await
    }

    /// Take the event stream. Yields `None` after the first call.
    fn take_events(&mut self) -> Option<TransportEvents>;

    /// Shut the transport down
    async fn close(&mut self) -> McpResult<()>;
}

/// Create the event channel a transport implementation feeds
pub fn event_channel() -> (mpsc::UnboundedSender<TransportEvent>, TransportEvents) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_channel_delivery_order() {
        let (tx, mut rx) = event_channel();
        let session = SessionId::new_v4();
        tx.send(TransportEvent::Started).unwrap();
        tx.send(TransportEvent::NewSession(session)).unwrap();

        assert!(matches!(rx.try_recv().unwrap(), TransportEvent::Started));
        match rx.try_recv().unwrap() {
            TransportEvent::NewSession(id) => assert_eq!(id, session),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
