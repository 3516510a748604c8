use crate::interface_adapters::net::ClientHub;
use crate::use_cases::CommandIntake;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone)]
pub struct WsState {
    // Client set and the shared outbound frame stream.
    pub hub: Arc<ClientHub>,
    // Commands flowing from the network to the session coordinator.
    pub intake: CommandIntake,
    // Flips to true when the transport stops.
    pub shutdown_rx: watch::Receiver<bool>,
    pub write_timeout: Duration,
    pub max_line_bytes: usize,
}
