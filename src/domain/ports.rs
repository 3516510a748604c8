// Ports to the game engine and to the active transport role.

use crate::domain::errors::BridgeError;
use crate::domain::input::QueuedInputEvent;
use crate::domain::notes::{GameStateSnapshot, LiveNote};

/// High-level screen the game is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameScreen {
    Title,
    MainMenu,
    StoryMenu,
    Freeplay,
    Playing,
    Paused,
    GameOver,
    Unknown,
}

impl GameScreen {
    /// Active, unpaused and not game over.
    pub fn is_playable(self) -> bool {
        matches!(self, GameScreen::Playing)
    }
}

// Port for one live gameplay instance. Sessions hold it weakly.
pub trait GameplayHandle: Send + Sync {
    /// Authoritative song (conductor) position in milliseconds.
    fn song_position_ms(&self) -> f64;
    /// False while the music clock is stopped (countdown, pause, song end).
    fn is_music_playing(&self) -> bool;
    /// Notes of the player-controlled lane, `None` when the lane does not exist.
    fn player_notes(&self) -> Option<Vec<LiveNote>>;
}

// Port for engine-wide queries and the synthetic input injection point.
pub trait GameHost {
    fn current_screen(&self) -> GameScreen;
    /// Feeds one synthetic press/release into the game's input queue.
    fn inject(&mut self, event: QueuedInputEvent);
}

// Port for the timestamp domain the game's real input system uses.
pub trait InputClock: Send + Sync {
    fn now_ms(&self) -> f64;
}

/// What the coordinator hands to the transport on each send tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryFrame {
    pub snapshot: GameStateSnapshot,
    pub screen: GameScreen,
    pub is_playing: bool,
}

// Port for whichever transport role is active in this process.
pub trait Transport {
    /// Starts the role's background loops; a no-op when already running.
    fn start(&self) -> Result<(), BridgeError>;
    /// Stops every loop and closes every socket; safe to call repeatedly.
    fn stop(&self);
    fn is_running(&self) -> bool;
    /// Best-effort delivery of one frame; never blocks the caller.
    fn publish(&self, frame: &TelemetryFrame);
    /// The bound session ended; stale telemetry must not be sent again.
    fn session_ended(&self);
    /// The music clock stopped; nothing is sent until the next `publish`.
    fn quiesce(&self);
}
