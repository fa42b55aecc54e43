//! Channel abstraction layer for relaygate.
//!
//! Provides the [`Transport`] and [`Channel`] traits. A [`Channel`] is an
//! established but not yet trusted connection; the admission layer takes
//! exclusive ownership of it for the duration of the handshake.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`
//!
//! The in-memory [`memory`] channel is always available. It is what the
//! admission tests run on.

mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::MemoryChannel;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketChannel, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// Opaque identifier for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Creates a new `ChannelId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan-{}", self.0)
    }
}

/// Accepts new incoming channels.
pub trait Transport: Send + Sync + 'static {
    /// The channel type produced by this transport.
    type Channel: Channel;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Waits for and accepts the next incoming channel.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Channel, Self::Error>> + Send;

    /// Gracefully shuts down the transport, stopping new channels.
    fn shutdown(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the local address the transport is bound to.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// A single connection that can send and receive framed messages.
///
/// Futures returned by these methods are `Send` so a channel can be moved
/// into a spawned task and driven there.
pub trait Channel: Send + Sync + 'static {
    /// The error type for channel operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one message to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the channel is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the channel.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this channel.
    fn id(&self) -> ChannelId;

    /// Whether the channel is still usable.
    ///
    /// Becomes `false` once either side closed it or the underlying
    /// stream failed. Never flips back to `true`.
    fn is_connected(&self) -> bool;
}
