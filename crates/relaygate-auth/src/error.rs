//! Error types for the admission layer.

use relaygate_protocol::{ProtocolError, RejectReason};
use relaygate_transport::ChannelId;

/// Errors that can occur while admitting a channel.
///
/// Two families live here. Start errors ([`ChannelClosed`](Self::ChannelClosed),
/// [`AlreadyStarted`](Self::AlreadyStarted), [`NoRuntime`](Self::NoRuntime))
/// are returned synchronously by [`Authenticator::start`](crate::Authenticator::start)
/// and mean the channel is simply declined. The rest describe why a running
/// handshake failed; they never leave the handshake task on the server side
/// (the authenticator just ends up `Failed`), but the client helper returns
/// them to its caller.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The channel was already disconnected when the handshake was started.
    #[error("channel {0} is not connected")]
    ChannelClosed(ChannelId),

    /// `start` was called twice on the same authenticator.
    #[error("authenticator already started")]
    AlreadyStarted,

    /// There is no tokio runtime to run the handshake on.
    #[error("no async runtime available to run the handshake")]
    NoRuntime,

    /// The underlying channel failed while sending or receiving.
    #[error("channel error: {0}")]
    Channel(String),

    /// A handshake message could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The peer closed the channel before the handshake finished.
    #[error("peer closed the channel during the handshake")]
    PeerClosed,

    /// The handshake did not finish within the configured timeout.
    #[error("handshake timed out")]
    Timeout,

    /// The peer asked for a protocol version we don't speak.
    #[error("protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    /// Unknown user or wrong credential proof.
    #[error("access denied")]
    AccessDenied,

    /// The server answered with a rejection (client side).
    #[error("handshake rejected: {0}")]
    Rejected(RejectReason),

    /// The server could not prove possession of the expected private key
    /// (client side).
    #[error("server key proof did not verify")]
    ServerNotTrusted,

    /// Key material could not be used to key a MAC.
    #[error("invalid key material")]
    InvalidKey,
}
