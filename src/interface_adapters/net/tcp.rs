use super::hub::ClientHub;
use super::{
    ConnStats, Frame, LoopControl, NetError, READ_CHUNK, handle_client_line, next_conn_id,
    should_log,
};
use crate::interface_adapters::framing::{Line, LineBuffer};
use crate::use_cases::CommandIntake;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tracing::{Instrument, debug, info, info_span, warn};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub(super) struct ConnContext {
    pub hub: Arc<ClientHub>,
    pub intake: CommandIntake,
    pub max_line_bytes: usize,
    pub write_timeout: Duration,
}

pub(super) async fn accept_loop(
    listener: TcpListener,
    ctx: ConnContext,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    // Each connection runs on its own task so a stalled peer
                    // cannot hold up the accept loop or other clients.
                    tokio::spawn(handle_connection(stream, peer, ctx.clone(), shutdown.clone()));
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }
    debug!("tcp accept loop stopped");
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: ConnContext,
    shutdown: watch::Receiver<bool>,
) {
    let conn_id = next_conn_id();
    let span = info_span!("conn", conn_id, %peer, framing = "tcp");
    run_connection(stream, peer, conn_id, ctx, shutdown)
        .instrument(span)
        .await;
}

async fn run_connection(
    stream: TcpStream,
    peer: SocketAddr,
    conn_id: u64,
    ctx: ConnContext,
    mut shutdown: watch::Receiver<bool>,
) {
    // Subscribe before anything else so the first broadcast is not missed.
    let (mut frames_rx, latest_rx) = ctx.hub.subscribe();
    let _guard = ctx.hub.register(conn_id, peer.to_string(), "tcp");

    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "failed to set TCP_NODELAY");
    }
    let (mut reader, mut writer) = stream.into_split();
    let mut lines = LineBuffer::new(ctx.max_line_bytes);
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut stats = ConnStats::new();
    let mut fatal: Option<NetError> = None;
    info!("client connected");

    loop {
        // disconnect becomes true on error or peer departure
        let disconnect: bool = tokio::select! {
            _ = shutdown.changed() => true,

            // Incoming bytes from the controller
            read = reader.read(&mut chunk) => match read {
                Ok(0) => {
                    info!("client closed connection");
                    true
                }
                Ok(n) => {
                    stats.bytes_in += n as u64;
                    match handle_chunk(&chunk[..n], &mut lines, &ctx, &mut stats) {
                        Ok(LoopControl::Continue) => false,
                        Ok(LoopControl::Disconnect) => true,
                        Err(e) => {
                            fatal = Some(e);
                            true
                        }
                    }
                }
                Err(e) if is_transient(&e) => false,
                Err(e) => {
                    // Resets are ordinary departures.
                    debug!(error = %e, "read failed");
                    true
                }
            },

            // Outgoing note data
            frame = frames_rx.recv() => match frame {
                Ok(frame) => matches!(
                    forward_frame(&mut writer, &frame, &ctx, &mut stats).await,
                    LoopControl::Disconnect
                ),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    if should_log(&mut stats.last_lag_log) {
                        warn!(missed, "frames lagged; sending latest");
                    }
                    let latest = latest_rx.borrow().clone();
                    match latest {
                        Some(frame) => {
                            stats.lag_recovery_count += 1;
                            matches!(
                                forward_frame(&mut writer, &frame, &ctx, &mut stats).await,
                                LoopControl::Disconnect
                            )
                        }
                        None => false,
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    fatal = Some(NetError::FramesClosed);
                    true
                }
            },
        };

        if disconnect {
            let _ = writer.shutdown().await;
            break;
        }
    }

    stats.log_summary();
    if let Some(e) = fatal {
        warn!(error = ?e, "connection loop exited with error");
    }
    info!("client disconnected");
}

fn handle_chunk(
    chunk: &[u8],
    lines: &mut LineBuffer,
    ctx: &ConnContext,
    stats: &mut ConnStats,
) -> Result<LoopControl, NetError> {
    for line in lines.push(chunk) {
        match line {
            Line::Text(text) => {
                if let LoopControl::Disconnect = handle_client_line(&text, &ctx.intake, stats)? {
                    return Ok(LoopControl::Disconnect);
                }
            }
            Line::InvalidUtf8 => stats.note_invalid("invalid utf-8"),
            Line::Oversized => stats.note_invalid("line too long"),
        }
    }
    Ok(LoopControl::Continue)
}

async fn forward_frame(
    writer: &mut OwnedWriteHalf,
    frame: &Frame,
    ctx: &ConnContext,
    stats: &mut ConnStats,
) -> LoopControl {
    // Nothing may be written once the transport has been stopped.
    if !ctx.hub.is_live() {
        return LoopControl::Disconnect;
    }
    let started = Instant::now();
    let result = match tokio::time::timeout(ctx.write_timeout, writer.write_all(frame.as_bytes()))
        .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(NetError::Io(e)),
        Err(_) => Err(NetError::WriteTimeout),
    };
    match result {
        Ok(()) => {
            stats.msgs_out += 1;
            stats.bytes_out += frame.len() as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Dropped from the client set; not retried.
            warn!(error = ?err, elapsed_ms = started.elapsed().as_millis() as u64, "failed to send note data");
            LoopControl::Disconnect
        }
    }
}

pub(super) fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
    )
}
