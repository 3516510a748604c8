// Directional input commands, per-direction held state and queued edges.

use super::notes::Direction;

/// Set of directions that should be held, indexed by lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionSet([bool; 4]);

impl DirectionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, direction: Direction) {
        self.0[direction.index()] = true;
    }

    pub fn remove(&mut self, direction: Direction) {
        self.0[direction.index()] = false;
    }

    pub fn contains(&self, direction: Direction) -> bool {
        self.0[direction.index()]
    }

    pub fn is_empty(&self) -> bool {
        !self.0.iter().any(|held| *held)
    }

    pub fn iter(&self) -> impl Iterator<Item = Direction> + '_ {
        Direction::ALL.into_iter().filter(|d| self.contains(*d))
    }
}

impl FromIterator<Direction> for DirectionSet {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut set = Self::empty();
        for direction in iter {
            set.insert(direction);
        }
        set
    }
}

/// Desired held/released state, either for one direction or for all four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommand {
    /// "This one direction just changed."
    Edge { direction: Direction, pressed: bool },
    /// "Exactly these directions should be held now."
    Level { held: DirectionSet },
}

/// Inbound command stamped with the game's input clock when it was read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedCommand {
    pub command: InputCommand,
    pub received_at_ms: f64,
}

/// Held state for one direction and the time it last flipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionInputState {
    pub held: bool,
    pub last_change_ms: f64,
}

impl Default for DirectionInputState {
    fn default() -> Self {
        // Never changed, so the first request always clears the dwell check.
        Self {
            held: false,
            last_change_ms: f64::NEG_INFINITY,
        }
    }
}

/// Discrete press/release edge waiting to be injected into the game.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedInputEvent {
    pub direction: Direction,
    pub is_pressed: bool,
    pub timestamp_ms: f64,
}
