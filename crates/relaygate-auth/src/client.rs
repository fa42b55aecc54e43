//! Peer side of the handshake.
//!
//! Used by anything that connects *to* a relaygate server: tests, tools, and
//! the relay clients themselves. The client pins the server's key and refuses
//! to send its own proof until the server proved it holds that key.

use relaygate_protocol::{
    ClientMessage, JsonCodec, PROTOCOL_VERSION, ServerMessage, SessionId,
};
use relaygate_transport::Channel;

use crate::handshake::{random_nonce, recv_message, send_message};
use crate::users::derive_secret;
use crate::{AuthError, PrivateKey, proof};

/// Authenticates as `username` over `channel`.
///
/// Returns the session ID assigned by the server. On any error the caller
/// should drop the channel.
///
/// # Errors
/// - [`AuthError::Rejected`] — the server refused the handshake
/// - [`AuthError::ServerNotTrusted`] — the server's key proof didn't match
///   `server_key`
/// - transport and protocol errors as they occur
pub async fn handshake<C: Channel>(
    channel: &C,
    username: &str,
    password: &str,
    server_key: &PrivateKey,
) -> Result<SessionId, AuthError> {
    let codec = JsonCodec;
    let client_nonce = random_nonce();

    send_message(
        channel,
        &codec,
        &ClientMessage::Hello {
            version: PROTOCOL_VERSION,
            username: username.to_string(),
            nonce: client_nonce.clone(),
        },
    )
    .await?;

    let (server_nonce, key_proof) = match recv_message(channel, &codec).await? {
        ServerMessage::Challenge { nonce, key_proof } => (nonce, key_proof),
        ServerMessage::Reject { reason } => return Err(AuthError::Rejected(reason)),
        ServerMessage::Accept { .. } => {
            return Err(relaygate_protocol::ProtocolError::InvalidMessage(
                "accept before challenge".into(),
            )
            .into());
        }
    };

    if !proof::verify_server_key_proof(
        server_key,
        &client_nonce,
        &server_nonce,
        username,
        &key_proof,
    )? {
        return Err(AuthError::ServerNotTrusted);
    }

    let secret = derive_secret(username, password);
    let client_proof = proof::client_proof(&*secret, &server_nonce, &client_nonce)?;
    send_message(
        channel,
        &codec,
        &ClientMessage::Proof {
            proof: client_proof,
        },
    )
    .await?;

    match recv_message(channel, &codec).await? {
        ServerMessage::Accept { session_id } => Ok(session_id),
        ServerMessage::Reject { reason } => Err(AuthError::Rejected(reason)),
        ServerMessage::Challenge { .. } => Err(
            relaygate_protocol::ProtocolError::InvalidMessage(
                "second challenge".into(),
            )
            .into(),
        ),
    }
}
