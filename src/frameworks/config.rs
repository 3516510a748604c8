use std::{env, net::SocketAddr, time::Duration};

// Runtime/bridge constants. Env accessors cover deployment, not tuning.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeRole {
    /// Listen for controllers and broadcast note data.
    Server,
    /// Dial out to one external controller.
    Client,
}

impl BridgeRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "server" => Some(BridgeRole::Server),
            "client" => Some(BridgeRole::Client),
            _ => None,
        }
    }
}

pub fn enabled() -> bool {
    env::var("BRIDGE_ENABLED")
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(true)
}

pub fn role() -> BridgeRole {
    match env::var("BRIDGE_ROLE") {
        Ok(value) => BridgeRole::parse(&value).unwrap_or_else(|| {
            tracing::warn!(value = %value, "unknown BRIDGE_ROLE; using server");
            BridgeRole::Server
        }),
        Err(_) => BridgeRole::Server,
    }
}

pub fn server_port() -> u16 {
    env::var("BRIDGE_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8765)
}

pub fn ws_port() -> Option<u16> {
    env::var("BRIDGE_WS_PORT").ok().and_then(|v| v.parse().ok())
}

pub fn controller_addr() -> SocketAddr {
    env::var("BRIDGE_CONTROLLER_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 5000)))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub const MIN_INPUT_DELAY: Duration = Duration::from_millis(50);
pub const NOTE_WINDOW: Duration = Duration::from_millis(10);

pub const EXTRACT_INTERVAL: Duration = Duration::from_millis(1000 / 60);
pub const SEND_INTERVAL: Duration = Duration::from_millis(1000 / 30);
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(250);

pub const COMMAND_CHANNEL_CAPACITY: usize = 1024;
pub const FRAME_BROADCAST_CAPACITY: usize = 128;
pub const MAX_LINE_BYTES: usize = 64 * 1024;

// Simulated host only: game update rate and judgement window.
pub const HOST_TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);
pub const HIT_WINDOW: Duration = Duration::from_millis(160);
