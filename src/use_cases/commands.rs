// Command intake: transport loops stamp commands and hand them to the coordinator.

use crate::domain::{InputClock, InputCommand, TimedCommand};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outcome of handing one command to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    Queued,
    /// Channel full; the command is dropped (best effort).
    Dropped,
    /// The coordinator is gone; the caller should stop reading.
    Closed,
}

/// Cloneable sender side used by every connection's read loop.
#[derive(Clone)]
pub struct CommandIntake {
    tx: mpsc::Sender<TimedCommand>,
    clock: Arc<dyn InputClock>,
}

impl CommandIntake {
    /// Stamps `command` with the input clock and queues it without blocking.
    pub fn submit(&self, command: InputCommand) -> Submit {
        let timed = TimedCommand {
            command,
            received_at_ms: self.clock.now_ms(),
        };
        match self.tx.try_send(timed) {
            Ok(()) => Submit::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Submit::Dropped,
            Err(mpsc::error::TrySendError::Closed(_)) => Submit::Closed,
        }
    }
}

/// Creates the bounded command channel between transports and the coordinator.
pub fn command_channel(
    capacity: usize,
    clock: Arc<dyn InputClock>,
) -> (CommandIntake, mpsc::Receiver<TimedCommand>) {
    let (tx, rx) = mpsc::channel(capacity);
    (CommandIntake { tx, clock }, rx)
}
