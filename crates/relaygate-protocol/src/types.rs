//! Handshake messages exchanged while a channel is being admitted.
//!
//! The exchange is a four-step challenge/response:
//!
//! ```text
//! client                                     server
//!   │ ── Hello { version, username, nonce } ────→ │
//!   │ ←── Challenge { nonce, key_proof } ──────── │
//!   │ ── Proof { proof } ───────────────────────→ │
//!   │ ←── Accept { session_id } / Reject ──────── │
//! ```
//!
//! The server may answer any client message with [`ServerMessage::Reject`]
//! and close the channel.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current handshake protocol version. Hellos carrying another version are
/// rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Length in bytes of handshake nonces.
pub const NONCE_LEN: usize = 32;

/// A unique identifier for an admitted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// Messages sent by the connecting peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First message on a fresh channel.
    Hello {
        /// Must equal [`PROTOCOL_VERSION`].
        version: u32,
        /// Name of the user to authenticate as.
        username: String,
        /// Fresh client randomness, [`NONCE_LEN`] bytes.
        nonce: Vec<u8>,
    },

    /// Proof that the client knows the user's credential.
    Proof {
        /// HMAC over both nonces keyed by the user secret.
        proof: Vec<u8>,
    },
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Server randomness plus a proof that it holds the private key.
    Challenge {
        /// Fresh server randomness, [`NONCE_LEN`] bytes.
        nonce: Vec<u8>,
        /// HMAC over the transcript keyed by the server private key.
        key_proof: Vec<u8>,
    },

    /// Handshake succeeded; the channel is now a session.
    Accept {
        session_id: SessionId,
    },

    /// Handshake failed. The server closes the channel after sending this.
    Reject {
        reason: RejectReason,
    },
}

/// Why a handshake was rejected.
///
/// Deliberately coarse: the peer learns that it failed, not which
/// credential check tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Unsupported protocol version.
    VersionMismatch,
    /// Unknown user or wrong proof.
    AccessDenied,
    /// The message was not valid at this point of the exchange.
    ProtocolError,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::VersionMismatch => "version mismatch",
            Self::AccessDenied => "access denied",
            Self::ProtocolError => "protocol error",
        };
        f.write_str(s)
    }
}
