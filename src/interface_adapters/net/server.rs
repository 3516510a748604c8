// Listening (server) role: raw TCP framing plus an optional WebSocket endpoint,
// both feeding the same client set.

use super::hub::{ClientHub, ClientInfo};
use super::tcp::{self, ConnContext};
use super::{Frame, ws};
use crate::domain::{BridgeError, TelemetryFrame, Transport};
use crate::interface_adapters::protocol::encode_note_data;
use crate::interface_adapters::state::WsState;
use crate::use_cases::CommandIntake;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, trace};

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    /// Second port for the `/ws` endpoint; `None` disables it.
    pub ws_addr: Option<SocketAddr>,
    pub frame_broadcast_capacity: usize,
    pub max_line_bytes: usize,
    pub write_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8765)),
            ws_addr: None,
            frame_broadcast_capacity: 128,
            max_line_bytes: 64 * 1024,
            write_timeout: Duration::from_millis(250),
        }
    }
}

struct Running {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    tcp_addr: SocketAddr,
    ws_addr: Option<SocketAddr>,
}

/// Broadcasts note data to every connected controller and forwards their
/// commands to the coordinator.
pub struct TransportServer {
    settings: ServerSettings,
    runtime: Handle,
    intake: CommandIntake,
    hub: Arc<ClientHub>,
    running: Mutex<Option<Running>>,
}

impl TransportServer {
    pub fn new(settings: ServerSettings, runtime: Handle, intake: CommandIntake) -> Self {
        let hub = Arc::new(ClientHub::new(settings.frame_broadcast_capacity));
        Self {
            settings,
            runtime,
            intake,
            hub,
            running: Mutex::new(None),
        }
    }

    /// Address the TCP listener actually bound, useful when configured with port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_running().as_ref().map(|running| running.tcp_addr)
    }

    pub fn ws_local_addr(&self) -> Option<SocketAddr> {
        self.lock_running().as_ref().and_then(|running| running.ws_addr)
    }

    pub fn client_count(&self) -> usize {
        self.hub.client_count()
    }

    pub fn clients(&self) -> Vec<ClientInfo> {
        self.hub.clients()
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_loops(&self) -> Result<Running, BridgeError> {
        // Bind synchronously so address errors reach the caller of `start`.
        let tcp_std = bind_listener(self.settings.bind_addr)?;
        let ws_std = self.settings.ws_addr.map(bind_listener).transpose()?;

        // Converting to tokio listeners registers them with the runtime's reactor.
        let _enter = self.runtime.enter();
        let tcp_listener = tokio::net::TcpListener::from_std(tcp_std)?;
        let tcp_addr = tcp_listener.local_addr()?;
        let ws_listener = ws_std
            .map(tokio::net::TcpListener::from_std)
            .transpose()?;
        let ws_addr = ws_listener
            .as_ref()
            .map(tokio::net::TcpListener::local_addr)
            .transpose()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.hub.set_live(true);

        let mut tasks = Vec::with_capacity(2);
        let ctx = ConnContext {
            hub: Arc::clone(&self.hub),
            intake: self.intake.clone(),
            max_line_bytes: self.settings.max_line_bytes,
            write_timeout: self.settings.write_timeout,
        };
        tasks.push(
            self.runtime
                .spawn(tcp::accept_loop(tcp_listener, ctx, shutdown_rx.clone())),
        );
        info!(address = %tcp_addr, "listening");

        if let Some(listener) = ws_listener {
            let state = WsState {
                hub: Arc::clone(&self.hub),
                intake: self.intake.clone(),
                shutdown_rx,
                write_timeout: self.settings.write_timeout,
                max_line_bytes: self.settings.max_line_bytes,
            };
            tasks.push(self.runtime.spawn(ws::serve(listener, state)));
            if let Some(address) = ws_addr {
                info!(%address, "websocket endpoint listening");
            }
        }

        Ok(Running {
            shutdown_tx,
            tasks,
            tcp_addr,
            ws_addr,
        })
    }
}

fn bind_listener(addr: SocketAddr) -> Result<std::net::TcpListener, BridgeError> {
    let listener = std::net::TcpListener::bind(addr).map_err(|source| {
        error!(%addr, error = %source, "failed to bind");
        BridgeError::Bind { addr, source }
    })?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

impl Transport for TransportServer {
    fn start(&self) -> Result<(), BridgeError> {
        let mut running = self.lock_running();
        if running.is_some() {
            return Ok(());
        }
        *running = Some(self.spawn_loops()?);
        Ok(())
    }

    fn stop(&self) {
        let Some(running) = self.lock_running().take() else {
            return;
        };
        // Order matters: connection loops check the flag before every write.
        self.hub.set_live(false);
        running.shutdown_tx.send_replace(true);
        for task in running.tasks {
            task.abort();
        }
        self.hub.clear_latest();
        info!(address = %running.tcp_addr, "transport server stopped");
    }

    fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    fn publish(&self, frame: &TelemetryFrame) {
        if !self.hub.is_live() {
            return;
        }
        let mut text = match encode_note_data(&frame.snapshot) {
            Ok(text) => text,
            Err(e) => {
                error!(error = ?e, "failed to serialize note data");
                return;
            }
        };
        text.push('\n');
        let receivers = self.hub.broadcast(Frame::from(text));
        trace!(receivers, "note data published");
    }

    fn session_ended(&self) {
        self.hub.clear_latest();
    }

    fn quiesce(&self) {
        self.hub.clear_latest();
    }
}

impl Drop for TransportServer {
    fn drop(&mut self) {
        self.stop();
    }
}
