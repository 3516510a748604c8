use super::{
    ConnStats, Frame, LoopControl, NetError, handle_client_line, next_conn_id, should_log,
};
use crate::interface_adapters::state::WsState;

use axum::{
    Error, Router,
    extract::{
        ConnectInfo, State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};

pub(super) fn router(state: WsState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

pub(super) async fn serve(listener: TcpListener, state: WsState) {
    let mut shutdown = state.shutdown_rx.clone();
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    // Serve app and report errors rather than panicking
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stopped| *stopped).await;
        })
        .await;
    if let Err(e) = served {
        error!(error = %e, "websocket server error");
    }
    debug!("websocket server stopped");
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<WsState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    let conn_id = next_conn_id();
    let span = info_span!("conn", conn_id, %peer, framing = "ws");
    ws.max_message_size(state.max_line_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state, peer, conn_id).instrument(span))
}

async fn handle_socket(mut socket: WebSocket, state: WsState, peer: SocketAddr, conn_id: u64) {
    // Subscribe before any await so the first broadcast is not missed.
    let (mut frames_rx, latest_rx) = state.hub.subscribe();
    let _guard = state.hub.register(conn_id, peer.to_string(), "ws");
    let mut shutdown = state.shutdown_rx.clone();
    let mut stats = ConnStats::new();
    let mut fatal: Option<NetError> = None;
    info!("client connected");

    loop {
        // disconnect becomes true on error or peer departure
        let disconnect: bool = tokio::select! {
            _ = shutdown.changed() => true,

            // Incoming message from the controller
            incoming = socket.recv() => match handle_incoming_ws(incoming, &state, &mut stats) {
                Ok(LoopControl::Continue) => false,
                Ok(LoopControl::Disconnect) => true,
                Err(e) => {
                    fatal = Some(e);
                    true
                }
            },

            // Outgoing note data
            frame = frames_rx.recv() => match frame {
                Ok(frame) => matches!(
                    forward_frame(&mut socket, &frame, &state, &mut stats).await,
                    LoopControl::Disconnect
                ),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    lag_recovery(&mut socket, missed, &latest_rx, &state, &mut stats).await
                }
                Err(broadcast::error::RecvError::Closed) => {
                    fatal = Some(NetError::FramesClosed);
                    true
                }
            },
        };

        if disconnect {
            if let Err(err) = socket.send(Message::Close(None)).await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    stats.log_summary();
    if let Some(e) = fatal {
        warn!(error = ?e, "client loop exited with error");
    }
    info!("client disconnected");
}

fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    state: &WsState,
    stats: &mut ConnStats,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                stats.bytes_in += text.len() as u64;
                // Controllers may keep the stream framing and send several lines at once.
                for line in text.split('\n') {
                    let line = line.trim_end_matches('\r');
                    if line.trim().is_empty() {
                        continue;
                    }
                    if let LoopControl::Disconnect = handle_client_line(line, &state.intake, stats)? {
                        return Ok(LoopControl::Disconnect);
                    }
                }
                Ok(LoopControl::Continue)
            }
            Message::Binary(bytes) => {
                stats.bytes_in += bytes.len() as u64;
                stats.note_invalid("binary messages not supported");
                Ok(LoopControl::Continue)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!("websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn lag_recovery(
    socket: &mut WebSocket,
    missed: u64,
    latest_rx: &watch::Receiver<Option<Frame>>,
    state: &WsState,
    stats: &mut ConnStats,
) -> bool {
    if should_log(&mut stats.last_lag_log) {
        warn!(missed, "frames lagged; sending latest");
    }
    // Clone before the await so the watch lock is not held.
    let latest = latest_rx.borrow().clone();
    let Some(frame) = latest else {
        return false;
    };
    stats.lag_recovery_count += 1;
    matches!(
        forward_frame(socket, &frame, state, stats).await,
        LoopControl::Disconnect
    )
}

async fn forward_frame(
    socket: &mut WebSocket,
    frame: &Frame,
    state: &WsState,
    stats: &mut ConnStats,
) -> LoopControl {
    if !state.hub.is_live() {
        return LoopControl::Disconnect;
    }
    // A WebSocket message is already delimited; the newline is stream framing only.
    let text = frame.trim_end_matches('\n');
    let started = Instant::now();
    let sent = tokio::time::timeout(
        state.write_timeout,
        socket.send(Message::Text(Utf8Bytes::from(text.to_owned()))),
    )
    .await;
    let result = match sent {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(NetError::Ws(e)),
        Err(_) => Err(NetError::WriteTimeout),
    };
    match result {
        Ok(()) => {
            stats.msgs_out += 1;
            stats.bytes_out += text.len() as u64;
            LoopControl::Continue
        }
        Err(err) => {
            warn!(error = ?err, elapsed_ms = started.elapsed().as_millis() as u64, "failed to send note data");
            LoopControl::Disconnect
        }
    }
}
