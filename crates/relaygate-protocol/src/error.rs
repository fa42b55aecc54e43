//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding handshake messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed bytes, missing fields, or a
    /// message type that doesn't exist.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but is not valid at this point of the
    /// handshake (wrong step, wrong nonce length).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
