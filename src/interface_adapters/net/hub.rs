// Client set and frame fan-out shared by the TCP and WebSocket framings.

use super::Frame;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, watch};

#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub peer: String,
    pub framing: &'static str,
}

/// Active connections plus the broadcast stream they all subscribe to.
///
/// Each connection task owns its socket; a failed write ends only that task,
/// which deregisters itself through its [`ClientGuard`].
#[derive(Debug)]
pub struct ClientHub {
    live: AtomicBool,
    frames_tx: broadcast::Sender<Frame>,
    // Latest frame, sent to a connection that lagged behind the broadcast.
    latest_tx: watch::Sender<Option<Frame>>,
    clients: Mutex<HashMap<u64, ClientInfo>>,
}

impl ClientHub {
    pub fn new(broadcast_capacity: usize) -> Self {
        let (frames_tx, _frames_rx) = broadcast::channel(broadcast_capacity);
        let (latest_tx, _latest_rx) = watch::channel(None);
        Self {
            live: AtomicBool::new(false),
            frames_tx,
            latest_tx,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// False once the transport is stopped; checked before every write.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::Release);
    }

    pub fn client_count(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn clients(&self) -> Vec<ClientInfo> {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Subscribe before the connection does anything else so no frame is missed.
    pub(crate) fn subscribe(&self) -> (broadcast::Receiver<Frame>, watch::Receiver<Option<Frame>>) {
        (self.frames_tx.subscribe(), self.latest_tx.subscribe())
    }

    pub(crate) fn register(
        self: &Arc<Self>,
        conn_id: u64,
        peer: String,
        framing: &'static str,
    ) -> ClientGuard {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conn_id, ClientInfo { peer, framing });
        ClientGuard {
            hub: Arc::clone(self),
            conn_id,
        }
    }

    /// Fans one frame out to every subscribed connection. Returns the number of
    /// receivers, zero when stopped or nobody is connected.
    pub fn broadcast(&self, frame: Frame) -> usize {
        if !self.is_live() {
            return 0;
        }
        self.latest_tx.send_replace(Some(frame.clone()));
        // No receivers is not an error.
        self.frames_tx.send(frame).unwrap_or(0)
    }

    pub(crate) fn clear_latest(&self) {
        self.latest_tx.send_replace(None);
    }
}

/// Removes its connection from the hub when dropped.
pub(crate) struct ClientGuard {
    hub: Arc<ClientHub>,
    conn_id: u64,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.hub
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.conn_id);
    }
}
