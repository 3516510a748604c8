// Domain layer: note, input and port types shared by every bridge role.

pub mod errors;
pub mod input;
pub mod notes;
pub mod ports;

pub use errors::BridgeError;
pub use input::{DirectionInputState, DirectionSet, InputCommand, QueuedInputEvent, TimedCommand};
pub use notes::{Direction, GameStateSnapshot, LiveNote, NoteSnapshot};
pub use ports::{GameHost, GameScreen, GameplayHandle, InputClock, TelemetryFrame, Transport};
