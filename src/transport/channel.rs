// ! In-memory transport
// !
// ! A linked pair of transports passing JSON objects over channels. Both
// ! ends share one session. Used by the integration tests and by hosts
// ! embedding client and server in one process.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::core::error::{McpError, McpResult};
use crate::transport::traits::{
    SessionId, Transport, TransportEvent, TransportEvents, event_channel,
};

/// One end of an in-memory transport pair
pub struct ChannelTransport {
    session: SessionId,
    peer_tx: Option<mpsc::UnboundedSender<Value>>,
    inbound: Option<mpsc::UnboundedReceiver<Value>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Option<TransportEvents>,
}

impl ChannelTransport {
    /// Create a linked pair sharing one session
    pub fn pair() -> (ChannelTransport, ChannelTransport) {
        let session = SessionId::new_v4();
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            ChannelTransport::new(session, b_tx, a_rx),
            ChannelTransport::new(session, a_tx, b_rx),
        )
    }

    fn new(
        session: SessionId,
        peer_tx: mpsc::UnboundedSender<Value>,
        inbound: mpsc::UnboundedReceiver<Value>,
    ) -> Self {
        let (events_tx, events_rx) = event_channel();
        Self {
            session,
            peer_tx: Some(peer_tx),
            inbound: Some(inbound),
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// The session shared by both ends of the pair
    pub fn session(&self) -> SessionId {
        self.session
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn start(&mut self, _endpoint: &str) -> McpResult<()> {
        let mut inbound = self
            .inbound
            .take()
            .ok_or_else(|| McpError::transport("transport already started"))?;
        let events = self.events_tx.clone();
        let session = self.session;

        let _ = events.send(TransportEvent::Started);
        let _ = events.send(TransportEvent::NewSession(session));

        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                if events
                    .send(TransportEvent::Received(session, message))
                    .is_err()
                {
                    break;
                }
            }
            let _ = events.send(TransportEvent::SessionClosed(session));
            let _ = events.send(TransportEvent::Finished);
        });

        Ok(())
    }

    async fn send(&self, session: SessionId, message: Value) -> McpResult<()> {
        if session != self.session {
            return Err(McpError::transport(format!("unknown session {session}")));
        }
        self.peer_tx
            .as_ref()
            .ok_or_else(|| McpError::transport("transport closed"))?
            .send(message)
            .map_err(|_| McpError::transport("peer closed"))
    }

    fn take_events(&mut self) -> Option<TransportEvents> {
        self.events_rx.take()
    }

    async fn close(&mut self) -> McpResult<()> {
        self.peer_tx = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_pair_delivers_both_ways() {
        let (mut a, mut b) = ChannelTransport::pair();
        let mut a_events = a.take_events().unwrap();
        let mut b_events = b.take_events().unwrap();
        a.start("").await.unwrap();
        b.start("").await.unwrap();

        let session = a.session();
        a.send(session, json!({ "x": 1 })).await.unwrap();
        b.send(session, json!({ "y": 2 })).await.unwrap();

        // Skip Started and NewSession on both sides.
        for events in [&mut a_events, &mut b_events] {
            assert!(matches!(
                events.recv().await.unwrap(),
                TransportEvent::Started
            ));
            assert!(matches!(
                events.recv().await.unwrap(),
                TransportEvent::NewSession(_)
            ));
        }

        match b_events.recv().await.unwrap() {
            TransportEvent::Received(s, v) => {
                assert_eq!(s, session);
                assert_eq!(v, json!({ "x": 1 }));
            }
            other => panic!("unexpected event {other:?}"),
        }
        match a_events.recv().await.unwrap() {
            TransportEvent::Received(s, v) => {
                assert_eq!(s, session);
                assert_eq!(v, json!({ "y": 2 }));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_finishes_peer() {
        let (mut a, mut b) = ChannelTransport::pair();
        let _a_events = a.take_events().unwrap();
        let mut b_events = b.take_events().unwrap();
        a.start("").await.unwrap();
        b.start("").await.unwrap();

        a.close().await.unwrap();

        loop {
            match b_events.recv().await.unwrap() {
                TransportEvent::Finished => break,
                TransportEvent::Started
                | TransportEvent::NewSession(_)
                | TransportEvent::SessionClosed(_) => continue,
                other => panic!("unexpected event {other:?}"),
            }
        }
    }
}
