// Network adapters: the listening server role (raw TCP and WebSocket framings)
// and the outbound client role.

pub mod client;
pub mod hub;
pub mod server;
mod tcp;
mod ws;

pub use client::{ClientSettings, TransportClient};
pub use hub::ClientHub;
pub use server::{ServerSettings, TransportServer};

use crate::interface_adapters::protocol::{Inbound, parse_client_line};
use crate::use_cases::{CommandIntake, Submit};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One serialized outbound message, newline included, shared by every connection.
pub type Frame = Arc<str>;

pub(crate) const READ_CHUNK: usize = 4096;
pub(crate) const LOG_THROTTLE: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub(crate) enum NetError {
    // Categorizes connection failures so loops can decide policy.
    #[allow(dead_code)]
    Io(std::io::Error),
    #[allow(dead_code)]
    Ws(axum::Error),
    WriteTimeout,
    CommandsClosed,
    FramesClosed,
}

pub(crate) enum LoopControl {
    Continue,
    Disconnect,
}

pub(crate) fn next_conn_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

// A timestamp old enough that the first `should_log` fires.
pub(crate) fn throttle_start() -> Instant {
    let now = Instant::now();
    now.checked_sub(LOG_THROTTLE).unwrap_or(now)
}

pub(crate) fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

/// Per-connection counters, logged when the connection ends.
pub(crate) struct ConnStats {
    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub invalid: u32,
    pub lag_recovery_count: u64,

    pub last_invalid_log: Instant,
    pub last_full_log: Instant,
    pub last_lag_log: Instant,
}

impl ConnStats {
    pub fn new() -> Self {
        let now = throttle_start();
        Self {
            msgs_in: 0,
            msgs_out: 0,
            bytes_in: 0,
            bytes_out: 0,
            invalid: 0,
            lag_recovery_count: 0,
            last_invalid_log: now,
            last_full_log: now,
            last_lag_log: now,
        }
    }

    pub fn log_summary(&self) {
        debug!(
            msgs_in = self.msgs_in,
            msgs_out = self.msgs_out,
            bytes_in = self.bytes_in,
            bytes_out = self.bytes_out,
            invalid = self.invalid,
            lag_recovery_count = self.lag_recovery_count,
            "connection stats"
        );
    }

    pub fn note_invalid(&mut self, reason: &str) {
        self.invalid += 1;
        if should_log(&mut self.last_invalid_log) {
            warn!(reason, count = self.invalid, "discarding inbound message");
        }
    }
}

// Shared inbound path for both server framings: parse one line and hand the
// command to the coordinator. Bad messages never close the connection.
pub(crate) fn handle_client_line(
    line: &str,
    intake: &CommandIntake,
    stats: &mut ConnStats,
) -> Result<LoopControl, NetError> {
    stats.msgs_in += 1;
    match parse_client_line(line) {
        Inbound::Command(command) => submit(intake, command, stats),
        Inbound::Unrecognized(reason) => {
            stats.note_invalid(reason);
            Ok(LoopControl::Continue)
        }
        Inbound::Malformed(e) => {
            stats.invalid += 1;
            if should_log(&mut stats.last_invalid_log) {
                warn!(error = %e, bytes = line.len(), "failed to parse client message");
            }
            Ok(LoopControl::Continue)
        }
    }
}

pub(crate) fn submit(
    intake: &CommandIntake,
    command: crate::domain::InputCommand,
    stats: &mut ConnStats,
) -> Result<LoopControl, NetError> {
    match intake.submit(command) {
        Submit::Queued => Ok(LoopControl::Continue),
        Submit::Dropped => {
            if should_log(&mut stats.last_full_log) {
                warn!("command channel full; dropping input");
            }
            Ok(LoopControl::Continue)
        }
        Submit::Closed => Err(NetError::CommandsClosed),
    }
}
