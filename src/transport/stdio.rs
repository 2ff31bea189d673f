// ! Stdio transport
// !
// ! One JSON object per line, terminated by a line feed. The server half
// ! speaks over the process's own standard streams; the client half spawns
// ! the server as a subprocess and speaks over its pipes. Either way there
// ! is exactly one implicit session, minted at start.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::core::error::{McpError, McpResult};
use crate::transport::traits::{
    SessionId, Transport, TransportEvent, TransportEvents, event_channel,
};

/// Parse one inbound line into a JSON object.
///
/// Blank lines are skipped silently; malformed JSON and non-object frames
/// are logged and dropped, never answered.
fn parse_frame(line: &str) -> Option<Value> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(line) {
        Ok(value) if value.is_object() || value.is_array() => Some(value),
        Ok(other) => {
            tracing::warn!("frame is not an object: {other}");
            None
        }
        Err(e) => {
            tracing::warn!("JSON parse error: {e}: {line}");
            None
        }
    }
}

fn spawn_reader<R>(
    reader: R,
    session: SessionId,
    events: mpsc::UnboundedSender<TransportEvent>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    if let Some(value) = parse_frame(&line) {
                        if events
                            .send(TransportEvent::Received(session, value))
                            .is_err()
                        {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = events.send(TransportEvent::Error(format!("stdin read: {e}")));
                    break;
                }
            }
        }
        let _ = events.send(TransportEvent::SessionClosed(session));
        let _ = events.send(TransportEvent::Finished);
    });
}

fn spawn_writer<W>(writer: W, mut outbound: mpsc::UnboundedReceiver<Value>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut writer = BufWriter::new(writer);
        while let Some(message) = outbound.recv().await {
            let line = match serde_json::to_string(&message) {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!("failed to serialize outbound frame: {e}");
                    continue;
                }
            };
            tracing::trace!("sending: {line}");
            if writer.write_all(line.as_bytes()).await.is_err()
                || writer.write_all(b"\n").await.is_err()
                || writer.flush().await.is_err()
            {
                break;
            }
        }
    });
}

/// Stdio transport for servers: reads requests from the process's stdin
/// and writes replies to its stdout. Stderr stays free for log output.
pub struct StdioServerTransport {
    session: SessionId,
    outbound: Option<mpsc::UnboundedSender<Value>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Option<TransportEvents>,
}

impl StdioServerTransport {
    /// Create an unstarted stdio server transport
    pub fn new() -> Self {
        let (events_tx, events_rx) = event_channel();
        Self {
            session: SessionId::new_v4(),
            outbound: None,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// The implicit session assigned at start
    pub fn session(&self) -> SessionId {
        self.session
    }
}

impl Default for StdioServerTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioServerTransport {
    async fn start(&mut self, _endpoint: &str) -> McpResult<()> {
        if self.outbound.is_some() {
            return Err(McpError::transport("transport already started"));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        self.outbound = Some(out_tx);
        spawn_writer(tokio::io::stdout(), out_rx);

        let _ = self.events_tx.send(TransportEvent::Started);
        let _ = self
            .events_tx
            .send(TransportEvent::NewSession(self.session));
        spawn_reader(tokio::io::stdin(), self.session, self.events_tx.clone());

        Ok(())
    }

    async fn send(&self, session: SessionId, message: Value) -> McpResult<()> {
        if session != self.session {
            return Err(McpError::transport(format!("unknown session {session}")));
        }
        self.outbound
            .as_ref()
            .ok_or_else(|| McpError::transport("transport not started"))?
            .send(message)
            .map_err(|_| McpError::transport("stdout writer stopped"))
    }

    fn take_events(&mut self) -> Option<TransportEvents> {
        self.events_rx.take()
    }

    async fn close(&mut self) -> McpResult<()> {
        self.outbound = None;
        Ok(())
    }
}

/// Stdio transport for clients: spawns the server as a subprocess and
/// frames JSON lines over its stdin/stdout. The child's stderr is drained
/// into the log.
pub struct StdioClientTransport {
    command: String,
    args: Vec<String>,
    session: SessionId,
    child: Option<Child>,
    outbound: Option<mpsc::UnboundedSender<Value>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Option<TransportEvents>,
}

impl StdioClientTransport {
    /// Create a transport that will spawn `command args...`
    pub fn new<S: Into<String>>(command: S, args: Vec<S>) -> Self {
        let (events_tx, events_rx) = event_channel();
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            session: SessionId::new_v4(),
            child: None,
            outbound: None,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// The implicit session assigned at start
    pub fn session(&self) -> SessionId {
        self.session
    }
}

#[async_trait]
impl Transport for StdioClientTransport {
    async fn start(&mut self, _endpoint: &str) -> McpResult<()> {
        if self.child.is_some() {
            return Err(McpError::transport("transport already started"));
        }

        tracing::debug!("spawning MCP server: {} {:?}", self.command, self.args);
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| McpError::transport(format!("failed to spawn server: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::transport("no stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::transport("no stdout handle"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| McpError::transport("no stderr handle"))?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        self.outbound = Some(out_tx);
        spawn_writer(stdin, out_rx);

        let _ = self.events_tx.send(TransportEvent::Started);
        let _ = self
            .events_tx
            .send(TransportEvent::NewSession(self.session));
        spawn_reader(stdout, self.session, self.events_tx.clone());

        // The server's stderr is free-form log output.
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(target: "duplex_mcp::server_stderr", "{line}");
            }
        });

        self.child = Some(child);
        Ok(())
    }

    async fn send(&self, session: SessionId, message: Value) -> McpResult<()> {
        if session != self.session {
            return Err(McpError::transport(format!("unknown session {session}")));
        }
        self.outbound
            .as_ref()
            .ok_or_else(|| McpError::transport("transport not started"))?
            .send(message)
            .map_err(|_| McpError::transport("server stdin closed"))
    }

    fn take_events(&mut self) -> Option<TransportEvents> {
        self.events_rx.take()
    }

    async fn close(&mut self) -> McpResult<()> {
        // Dropping the outbound sender closes the child's stdin, which is
        // the shutdown signal for a stdio server.
        self.outbound = None;
        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(std::time::Duration::from_secs(5), child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::debug!("server process exited: {status}");
                }
                Ok(Err(e)) => {
                    tracing::warn!("error waiting for server process: {e}");
                }
                Err(_) => {
                    tracing::warn!("server process did not exit, killing it");
                    let _ = child.kill().await;
                }
            }
        }
        Ok(())
    }
}
