// Connecting (client) role: dial an external controller, stream game state to
// it and read back its action lines.

use super::tcp::is_transient;
use super::{
    ConnStats, Frame, NetError, READ_CHUNK, next_conn_id, should_log, submit, throttle_start,
};
use crate::domain::{BridgeError, TelemetryFrame, Transport};
use crate::interface_adapters::framing::{Line, LineBuffer};
use crate::interface_adapters::protocol::{encode_controller_state, parse_action_line};
use crate::use_cases::CommandIntake;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub controller_addr: SocketAddr,
    pub reconnect_backoff: Duration,
    pub send_interval: Duration,
    pub max_line_bytes: usize,
    pub write_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            controller_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            reconnect_backoff: Duration::from_secs(1),
            send_interval: Duration::from_millis(1000 / 30),
            max_line_bytes: 64 * 1024,
            write_timeout: Duration::from_millis(250),
        }
    }
}

// State shared between the handle and the connect task.
struct Shared {
    live: AtomicBool,
    connected: AtomicBool,
    connections: AtomicU64,
    // Latest serialized game state; the send loop always emits the newest one.
    latest_tx: watch::Sender<Option<Frame>>,
}

struct Running {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

enum Outcome {
    // Transport stopped; leave the connect loop.
    Stop,
    // Peer went away; back off and dial again.
    Reconnect,
}

pub struct TransportClient {
    settings: ClientSettings,
    runtime: Handle,
    intake: CommandIntake,
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl TransportClient {
    pub fn new(settings: ClientSettings, runtime: Handle, intake: CommandIntake) -> Self {
        let (latest_tx, _latest_rx) = watch::channel(None);
        Self {
            settings,
            runtime,
            intake,
            shared: Arc::new(Shared {
                live: AtomicBool::new(false),
                connected: AtomicBool::new(false),
                connections: AtomicU64::new(0),
                latest_tx,
            }),
            running: Mutex::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Number of successful connections made since construction.
    pub fn connections(&self) -> u64 {
        self.shared.connections.load(Ordering::Relaxed)
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for TransportClient {
    fn start(&self) -> Result<(), BridgeError> {
        let mut running = self.lock_running();
        if running.is_some() {
            return Ok(());
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shared.live.store(true, Ordering::Release);
        let task = self.runtime.spawn(connect_loop(
            self.settings.clone(),
            Arc::clone(&self.shared),
            self.intake.clone(),
            shutdown_rx,
        ));
        info!(controller = %self.settings.controller_addr, "transport client started");
        *running = Some(Running { shutdown_tx, task });
        Ok(())
    }

    fn stop(&self) {
        let Some(running) = self.lock_running().take() else {
            return;
        };
        self.shared.live.store(false, Ordering::Release);
        running.shutdown_tx.send_replace(true);
        running.task.abort();
        self.shared.connected.store(false, Ordering::Release);
        self.shared.latest_tx.send_replace(None);
        info!("transport client stopped");
    }

    fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    fn publish(&self, frame: &TelemetryFrame) {
        if !self.shared.live.load(Ordering::Acquire) {
            return;
        }
        let mut text = match encode_controller_state(frame) {
            Ok(text) => text,
            Err(e) => {
                error!(error = ?e, "failed to serialize game state");
                return;
            }
        };
        text.push('\n');
        self.shared.latest_tx.send_replace(Some(Frame::from(text)));
    }

    fn session_ended(&self) {
        self.shared.latest_tx.send_replace(None);
    }

    // The send loop repeats the latest document, so a paused song must clear it.
    fn quiesce(&self) {
        self.shared.latest_tx.send_replace(None);
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn connect_loop(
    settings: ClientSettings,
    shared: Arc<Shared>,
    intake: CommandIntake,
    mut shutdown: watch::Receiver<bool>,
) {
    let addr = settings.controller_addr;
    let mut last_refused_log = throttle_start();

    loop {
        let connected = tokio::select! {
            _ = shutdown.changed() => break,
            connected = TcpStream::connect(addr) => connected,
        };

        match connected {
            Ok(stream) => {
                shared.connections.fetch_add(1, Ordering::Relaxed);
                shared.connected.store(true, Ordering::Release);
                let conn_id = next_conn_id();
                let span = info_span!("conn", conn_id, peer = %addr, framing = "client");
                let outcome = run_connection(stream, &settings, &shared, &intake, &mut shutdown)
                    .instrument(span)
                    .await;
                shared.connected.store(false, Ordering::Release);

                match outcome {
                    Ok(Outcome::Stop) => break,
                    Ok(Outcome::Reconnect) => info!(%addr, "controller disconnected; reconnecting"),
                    Err(NetError::CommandsClosed) => {
                        warn!("command channel closed; client role exiting");
                        break;
                    }
                    Err(e) => warn!(error = ?e, %addr, "controller connection failed; reconnecting"),
                }
            }
            Err(e) => {
                if should_log(&mut last_refused_log) {
                    debug!(error = %e, %addr, "controller not reachable");
                }
            }
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(settings.reconnect_backoff) => {}
        }
    }
    debug!("client connect loop stopped");
}

async fn run_connection(
    stream: TcpStream,
    settings: &ClientSettings,
    shared: &Shared,
    intake: &CommandIntake,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Outcome, NetError> {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "failed to set TCP_NODELAY");
    }
    let (mut reader, mut writer) = stream.into_split();
    let latest_rx = shared.latest_tx.subscribe();
    let mut send_tick = tokio::time::interval(settings.send_interval);
    send_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // An empty action line releases every direction.
    let mut lines = LineBuffer::new(settings.max_line_bytes).with_blank_lines();
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut stats = ConnStats::new();
    info!("connected to controller");

    let outcome = loop {
        // None keeps the loop going; Some ends this connection.
        let step: Option<Result<Outcome, NetError>> = tokio::select! {
            _ = shutdown.changed() => Some(Ok(Outcome::Stop)),

            // Outgoing game state
            _ = send_tick.tick() => {
                // Clone before the await so the watch lock is not held.
                let latest = latest_rx.borrow().clone();
                match latest {
                    Some(_) if !shared.live.load(Ordering::Acquire) => Some(Ok(Outcome::Stop)),
                    Some(frame) => send_frame(&mut writer, &frame, settings, &mut stats).await.err().map(Err),
                    None => None,
                }
            }

            // Incoming action lines
            read = reader.read(&mut chunk) => match read {
                Ok(0) => Some(Ok(Outcome::Reconnect)),
                Ok(n) => {
                    stats.bytes_in += n as u64;
                    handle_action_chunk(&chunk[..n], &mut lines, intake, &mut stats).err().map(Err)
                }
                Err(e) if is_transient(&e) => None,
                Err(e) => Some(Err(NetError::Io(e))),
            },
        };

        if let Some(outcome) = step {
            break outcome;
        }
    };

    close(reader, writer).await;
    stats.log_summary();
    outcome
}

async fn send_frame(
    writer: &mut OwnedWriteHalf,
    frame: &Frame,
    settings: &ClientSettings,
    stats: &mut ConnStats,
) -> Result<(), NetError> {
    match tokio::time::timeout(settings.write_timeout, writer.write_all(frame.as_bytes())).await {
        Ok(Ok(())) => {
            stats.msgs_out += 1;
            stats.bytes_out += frame.len() as u64;
            Ok(())
        }
        Ok(Err(e)) => Err(NetError::Io(e)),
        Err(_) => Err(NetError::WriteTimeout),
    }
}

fn handle_action_chunk(
    chunk: &[u8],
    lines: &mut LineBuffer,
    intake: &CommandIntake,
    stats: &mut ConnStats,
) -> Result<(), NetError> {
    for line in lines.push(chunk) {
        match line {
            Line::Text(text) => {
                stats.msgs_in += 1;
                let (command, unknown) = parse_action_line(&text);
                if unknown > 0 {
                    stats.note_invalid("unknown direction token");
                }
                if let Some(command) = command {
                    submit(intake, command, stats)?;
                }
            }
            Line::InvalidUtf8 => stats.note_invalid("invalid utf-8"),
            Line::Oversized => stats.note_invalid("line too long"),
        }
    }
    Ok(())
}

async fn close(reader: OwnedReadHalf, mut writer: OwnedWriteHalf) {
    let _ = writer.shutdown().await;
    drop(reader);
}
