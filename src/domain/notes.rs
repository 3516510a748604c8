// Note lanes, live note state and the read-only snapshots sent over the wire.

/// One of the four note columns, in canonical lane order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Down,
    Up,
    Right,
}

impl Direction {
    /// Canonical order used whenever several directions change at once.
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Down,
        Direction::Up,
        Direction::Right,
    ];

    /// Lane index (0..=3), also the wire `keyCode`/`direction` value.
    pub fn index(self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Down => 1,
            Direction::Up => 2,
            Direction::Right => 3,
        }
    }

    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Direction::Left),
            1 => Some(Direction::Down),
            2 => Some(Direction::Up),
            3 => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Down => "down",
            Direction::Up => "up",
            Direction::Right => "right",
        }
    }

    /// Parses a direction token such as `"left"`; case and surrounding space are ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Direction::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
    }
}

/// Live note state as exposed by the gameplay engine for the player lane.
///
/// The host fills these from its own note objects every time the bridge asks;
/// the bridge never writes them back.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveNote {
    pub direction: Direction,
    pub strum_time_ms: f64,
    pub length_ms: f64,
    pub is_hold_note: bool,
    pub may_hit: bool,
    pub too_early: bool,
    pub has_missed: bool,
    pub has_been_hit: bool,
    pub miss_handled: bool,
    pub alive: bool,
}

impl LiveNote {
    /// Not yet judged and still on screen.
    pub fn is_pending(&self) -> bool {
        !self.has_been_hit && !self.miss_handled && self.alive
    }
}

/// Immutable projection of a live note at extraction time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteSnapshot {
    pub direction: Direction,
    pub strum_time_ms: f64,
    pub length_ms: f64,
    pub is_hold_note: bool,
    pub may_hit: bool,
    pub too_early: bool,
    pub has_missed: bool,
}

impl From<&LiveNote> for NoteSnapshot {
    fn from(note: &LiveNote) -> Self {
        Self {
            direction: note.direction,
            strum_time_ms: note.strum_time_ms,
            length_ms: note.length_ms,
            is_hold_note: note.is_hold_note,
            may_hit: note.may_hit,
            too_early: note.too_early,
            has_missed: note.has_missed,
        }
    }
}

/// Hit-eligible and about-to-arrive notes at one point of the song clock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameStateSnapshot {
    pub current_time_ms: f64,
    pub current_notes: Vec<NoteSnapshot>,
    pub upcoming_notes: Vec<NoteSnapshot>,
}

impl GameStateSnapshot {
    pub fn empty(current_time_ms: f64) -> Self {
        Self {
            current_time_ms,
            ..Self::default()
        }
    }

    /// Current notes followed by upcoming notes that are not already hit-eligible.
    ///
    /// Both lists share the pending predicate, so an upcoming note is also current
    /// exactly when `may_hit` is set.
    pub fn merged_notes(&self) -> impl Iterator<Item = &NoteSnapshot> {
        self.current_notes
            .iter()
            .chain(self.upcoming_notes.iter().filter(|n| !n.may_hit))
    }
}
