//! Transport layer implementations
//!
//! A transport moves JSON objects between peers, keyed by session. The
//! stdio transport carries one implicit session over standard streams;
//! the SSE transport multiplexes many sessions over one HTTP listener;
//! the channel transport links both halves inside one process.

pub mod traits;

pub mod channel;

#[cfg(feature = "stdio")]
pub mod stdio;

#[cfg(feature = "http")]
pub mod sse;

pub use traits::{SessionId, Transport, TransportEvent, TransportEvents};

pub use channel::ChannelTransport;

#[cfg(feature = "stdio")]
pub use stdio::{StdioClientTransport, StdioServerTransport};

#[cfg(feature = "http")]
pub use sse::{DEFAULT_SSE_ADDRESS, SseClientTransport, SseServerTransport};
