// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler for live chat connections.
//!
//! The client names itself in the upgrade URL (`/ws?userId=alice`). After the
//! upgrade the connection is registered with the engine, receives any
//! messages buffered while it was away, and may then send chat frames:
//!
//! ```json
//! {"type": "chat", "to": "bob", "content": "hello"}
//! ```
//!
//! Frames that fail to parse are logged and dropped; the connection stays
//! open. Once the engine closes a connection (superseded by a reconnect, or
//! too far behind on reads) nothing more is read from it.

use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use courier_core::{ChatRequest, Identity};
use courier_engine::{
    BACKLOG_EXCEEDED_REASON, CLOSE_POLICY_VIOLATION, Outbound, OutboundReceiver, SubmitOutcome,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::server::GatewayState;

/// Close reason for an upgrade without `?userId=`.
pub const MISSING_IDENTITY_REASON: &str = "User ID required";

/// Close code sent to open sockets when the server shuts down.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Close code sent when the engine stops answering.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// How long the writer gets to flush a final close frame.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

impl ConnectParams {
    fn identity(self) -> Option<Identity> {
        self.user_id.filter(|id| !id.is_empty()).map(Identity::from)
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<GatewayState>,
) -> Response {
    match params.identity() {
        Some(identity) => ws.on_upgrade(move |socket| handle_socket(socket, identity, state)),
        None => ws.on_upgrade(reject_anonymous),
    }
}

async fn reject_anonymous(mut socket: WebSocket) {
    debug!("closing WebSocket without userId");
    let frame = CloseFrame {
        code: CLOSE_POLICY_VIOLATION,
        reason: MISSING_IDENTITY_REASON.into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

/// Handle one identified WebSocket connection.
///
/// A writer task drains the connection's outbound queue into the socket
/// while this task reads client frames and forwards them to the engine.
async fn handle_socket(socket: WebSocket, identity: Identity, state: GatewayState) {
    let (sink, mut stream) = socket.split();
    let engine = state.engine;
    let (handle, outbound) = engine.open_connection();
    let connection = handle.id();
    let mut writer = tokio::spawn(write_outbound(sink, outbound));

    match engine.connect(identity.clone(), handle.clone()).await {
        Ok(report) => info!(
            %identity,
            %connection,
            flushed = report.flushed,
            superseded = ?report.superseded,
            "connection registered"
        ),
        Err(e) => {
            error!(%identity, error = %e, "failed to register connection");
            let _ = handle.close(CLOSE_INTERNAL_ERROR, "message engine unavailable");
            drop(handle);
            finish_writer(&mut writer).await;
            return;
        }
    }

    loop {
        let next = tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = handle.close(CLOSE_GOING_AWAY, "server shutting down");
                break;
            }
            _ = handle.overloaded() => {
                warn!(%identity, %connection, "client stopped reading, dropping connection");
                break;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                if !handle.is_open() {
                    debug!(%identity, %connection, "connection closed by engine, ignoring frame");
                    break;
                }
                let Some(request) = parse_frame(&identity, text.as_str()) else {
                    continue;
                };
                match engine
                    .submit(identity.clone(), connection, request.to, request.content)
                    .await
                {
                    Ok(SubmitOutcome::Rejected(reason)) => {
                        debug!(%identity, %reason, "submission rejected");
                    }
                    Ok(SubmitOutcome::Superseded) => {
                        debug!(%identity, %connection, "connection superseded, stopping reads");
                        break;
                    }
                    Ok(outcome) => debug!(%identity, ?outcome, "submission recorded"),
                    Err(e) => {
                        error!(%identity, error = %e, "failed to submit message");
                        let _ = handle.close(CLOSE_INTERNAL_ERROR, "message engine unavailable");
                        break;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {} // Binary and ping/pong are not part of the protocol.
            Some(Err(e)) => {
                debug!(%identity, error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    match engine.disconnect(identity.clone(), connection).await {
        Ok(true) => info!(%identity, %connection, "connection closed"),
        Ok(false) => debug!(%identity, %connection, "superseded connection closed"),
        Err(e) => warn!(%identity, error = %e, "failed to unregister connection"),
    }
    drop(handle);
    finish_writer(&mut writer).await;
}

/// Parse a client text frame, logging and discarding anything malformed.
fn parse_frame(identity: &Identity, text: &str) -> Option<ChatRequest> {
    match ChatRequest::parse(text) {
        Ok(request) => Some(request),
        Err(e) => {
            warn!(%identity, error = %e, "dropping malformed frame");
            None
        }
    }
}

async fn write_outbound(mut sink: SplitSink<WebSocket, Message>, mut outbound: OutboundReceiver) {
    let overload = outbound.overload_signal();
    loop {
        let item = tokio::select! {
            biased;
            _ = overload.wait() => {
                let frame = CloseFrame {
                    code: CLOSE_POLICY_VIOLATION,
                    reason: BACKLOG_EXCEEDED_REASON.into(),
                };
                let _ = sink.send(Message::Close(Some(frame))).await;
                break;
            }
            item = outbound.recv() => item,
        };
        let Some(item) = item else {
            break;
        };
        let message = match item {
            Outbound::Frame(frame) => match frame.to_json() {
                Ok(json) => Message::Text(json.into()),
                Err(e) => {
                    error!(error = %e, "failed to encode frame");
                    continue;
                }
            },
            Outbound::Close { code, reason } => {
                let frame = CloseFrame {
                    code,
                    reason: reason.into(),
                };
                let _ = sink.send(Message::Close(Some(frame))).await;
                break;
            }
        };
        if sink.send(message).await.is_err() {
            break;
        }
    }
}

async fn finish_writer(writer: &mut tokio::task::JoinHandle<()>) {
    if tokio::time::timeout(WRITER_DRAIN, &mut *writer).await.is_err() {
        writer.abort();
    }
}
