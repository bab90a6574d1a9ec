//! Per-connection task: framed I/O, handshake, request fan-out.
//!
//! Each connection spawns a tokio task that:
//! 1. Wraps the socket in a length-prefixed MessagePack codec.
//! 2. Reads the first message (must be `Hello`) and answers it.
//! 3. Enters a select loop: every decoded request is handled on its own
//!    task, and finished responses are written back as they complete.
//!
//! Requests on one connection therefore run concurrently; the host
//! correlates responses by `id`. A request still running when the peer
//! disconnects finishes in the background and its response is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use crate::ipc::codec::{CodecError, DecodeResult, FrameCodec, decode_frame};
use crate::ipc::protocol::{Message, Status};
use crate::sdk::InstantSdk;

use super::handler::{self, HostContext};

/// Unique identifier for a peer connection, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next process-wide ID.
    pub fn allocate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Connection-level errors.
#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("unexpected EOF during handshake")]
    HandshakeEof,
    #[error("first message must be Hello")]
    NotHello,
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] rmp_serde::decode::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Spawn a connection handler task.
///
/// The task runs until the peer disconnects or a protocol error occurs.
pub fn spawn_connection<S: InstantSdk>(
    stream: UnixStream,
    conn_id: ConnectionId,
    host: Arc<HostContext<S>>,
) {
    tokio::spawn(async move {
        match handle_connection(stream, conn_id, host).await {
            Ok(()) => tracing::debug!(?conn_id, "connection closed"),
            Err(e) => tracing::debug!(?conn_id, error = %e, "connection closed"),
        }
    });
}

async fn handle_connection<S: InstantSdk>(
    stream: UnixStream,
    conn_id: ConnectionId,
    host: Arc<HostContext<S>>,
) -> Result<(), ConnectionError> {
    let mut framed = Framed::new(stream, FrameCodec::new());

    // -- Handshake: first message must be Hello --
    let first_frame = framed
        .next()
        .await
        .ok_or(ConnectionError::HandshakeEof)??;

    let (id, version) = match decode_frame(&first_frame) {
        DecodeResult::Ok(Message::Hello { id, version }) => (id, version),
        // The peer violated the protocol; close without a response.
        DecodeResult::Ok(_) | DecodeResult::UnknownType(_) => {
            return Err(ConnectionError::NotHello);
        }
        DecodeResult::Malformed(e) => return Err(ConnectionError::MalformedFrame(e)),
    };

    let ack = handler::handle_hello(id, version, host.adapter.name());
    let rejected = matches!(
        ack,
        Message::HelloAck {
            status: Status::Error,
            ..
        }
    );
    framed.send(ack).await?;
    if rejected {
        return Ok(());
    }
    tracing::debug!(?conn_id, "handshake complete");

    // -- Main loop: fan requests out, write responses back --
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Message>();
    loop {
        tokio::select! {
            frame = framed.next() => {
                let raw = match frame {
                    Some(Ok(raw)) => raw,
                    Some(Err(e)) => return Err(ConnectionError::Codec(e)),
                    None => return Ok(()),
                };
                match decode_frame(&raw) {
                    DecodeResult::Ok(request) => {
                        dispatch(&host, conn_id, request, &reply_tx);
                    }
                    DecodeResult::UnknownType(envelope) => {
                        // Unknown message type: answer and keep the connection.
                        framed
                            .send(Message::error(envelope.id, "unknown_type", None))
                            .await?;
                    }
                    DecodeResult::Malformed(e) => {
                        return Err(ConnectionError::MalformedFrame(e));
                    }
                }
            }
            Some(reply) = reply_rx.recv() => {
                framed.send(reply).await?;
            }
        }
    }
}

/// Run one request on its own task and queue its response.
fn dispatch<S: InstantSdk>(
    host: &Arc<HostContext<S>>,
    conn_id: ConnectionId,
    request: Message,
    reply_tx: &mpsc::UnboundedSender<Message>,
) {
    let host = Arc::clone(host);
    let reply_tx = reply_tx.clone();
    tokio::spawn(async move {
        let response = handler::handle_request(&host, request).await;
        if reply_tx.send(response).is_err() {
            tracing::debug!(?conn_id, "response dropped, peer disconnected");
        }
    });
}
