//! Server side of the handshake, run by an authenticator's task.

use rand::RngCore;
use relaygate_protocol::{
    ClientMessage, Codec, JsonCodec, NONCE_LEN, PROTOCOL_VERSION, ProtocolError,
    RejectReason, ServerMessage, SessionId,
};
use relaygate_transport::Channel;
use serde::{Serialize, de::DeserializeOwned};

use crate::session::next_session_id;
use crate::{AuthError, PrivateKey, UserList, proof};

/// What a successful handshake established.
#[derive(Debug)]
pub(crate) struct Accepted {
    pub(crate) session_id: SessionId,
    pub(crate) username: String,
}

/// Runs the server side of the exchange over `channel`.
///
/// Sends `Reject` before returning a credential or protocol error. Transport
/// errors and timeouts are left to the caller; the channel can't be trusted
/// to carry a rejection at that point.
pub(crate) async fn serve<C: Channel>(
    channel: &C,
    key: &PrivateKey,
    users: &UserList,
) -> Result<Accepted, AuthError> {
    let codec = JsonCodec;

    let (username, client_nonce) = match recv_message(channel, &codec).await? {
        ClientMessage::Hello {
            version,
            username,
            nonce,
        } => {
            if version != PROTOCOL_VERSION {
                reject(channel, &codec, RejectReason::VersionMismatch).await;
                return Err(AuthError::VersionMismatch {
                    expected: PROTOCOL_VERSION,
                    got: version,
                });
            }
            if nonce.len() != NONCE_LEN {
                reject(channel, &codec, RejectReason::ProtocolError).await;
                return Err(ProtocolError::InvalidMessage(format!(
                    "client nonce must be {NONCE_LEN} bytes, got {}",
                    nonce.len()
                ))
                .into());
            }
            (username, nonce)
        }
        ClientMessage::Proof { .. } => {
            reject(channel, &codec, RejectReason::ProtocolError).await;
            return Err(ProtocolError::InvalidMessage(
                "first message must be hello".into(),
            )
            .into());
        }
    };

    let Some(user) = users.find(&username) else {
        tracing::debug!(%username, "unknown user");
        reject(channel, &codec, RejectReason::AccessDenied).await;
        return Err(AuthError::AccessDenied);
    };

    let server_nonce = random_nonce();
    let key_proof =
        proof::server_key_proof(key, &client_nonce, &server_nonce, &username)?;
    send_message(
        channel,
        &codec,
        &ServerMessage::Challenge {
            nonce: server_nonce.clone(),
            key_proof,
        },
    )
    .await?;

    let client_proof = match recv_message(channel, &codec).await? {
        ClientMessage::Proof { proof } => proof,
        ClientMessage::Hello { .. } => {
            reject(channel, &codec, RejectReason::ProtocolError).await;
            return Err(ProtocolError::InvalidMessage(
                "expected proof, got a second hello".into(),
            )
            .into());
        }
    };

    if !proof::verify_client_proof(
        user.secret(),
        &server_nonce,
        &client_nonce,
        &client_proof,
    )? {
        tracing::debug!(%username, "client proof did not verify");
        reject(channel, &codec, RejectReason::AccessDenied).await;
        return Err(AuthError::AccessDenied);
    }

    let session_id = next_session_id();
    send_message(channel, &codec, &ServerMessage::Accept { session_id }).await?;

    Ok(Accepted {
        session_id,
        username,
    })
}

pub(crate) fn random_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

pub(crate) async fn send_message<C: Channel, T: Serialize>(
    channel: &C,
    codec: &impl Codec,
    message: &T,
) -> Result<(), AuthError> {
    let bytes = codec.encode(message)?;
    channel
        .send(&bytes)
        .await
        .map_err(|e| AuthError::Channel(e.to_string()))
}

pub(crate) async fn recv_message<C: Channel, T: DeserializeOwned>(
    channel: &C,
    codec: &impl Codec,
) -> Result<T, AuthError> {
    let data = channel
        .recv()
        .await
        .map_err(|e| AuthError::Channel(e.to_string()))?
        .ok_or(AuthError::PeerClosed)?;
    Ok(codec.decode(&data)?)
}

/// Best-effort rejection; the handshake is failing either way.
async fn reject<C: Channel>(channel: &C, codec: &impl Codec, reason: RejectReason) {
    if let Err(e) =
        send_message(channel, codec, &ServerMessage::Reject { reason }).await
    {
        tracing::debug!(channel_id = %channel.id(), error = %e, "failed to send rejection");
    }
}
