// Note window extraction: live player-lane notes to a wire-ready snapshot.

use crate::domain::{GameStateSnapshot, GameplayHandle, LiveNote, NoteSnapshot};

/// Builds the current/upcoming note lists for one instant of the song clock.
///
/// `current_notes` holds every pending note the game allows hitting right now;
/// `upcoming_notes` holds pending notes whose strum time falls in
/// `(now, now + window_ms]`. Extraction order is preserved.
pub fn extract(notes: &[LiveNote], now_ms: f64, window_ms: f64) -> GameStateSnapshot {
    let current_notes = notes
        .iter()
        .filter(|n| n.may_hit && n.is_pending())
        .map(NoteSnapshot::from)
        .collect();

    let upcoming_notes = notes
        .iter()
        .filter(|n| {
            n.is_pending() && n.strum_time_ms > now_ms && n.strum_time_ms <= now_ms + window_ms
        })
        .map(NoteSnapshot::from)
        .collect();

    GameStateSnapshot {
        current_time_ms: now_ms,
        current_notes,
        upcoming_notes,
    }
}

/// Extractor bound to one session; holds only its lookahead window.
#[derive(Debug, Clone, Copy)]
pub struct NoteWindowExtractor {
    window_ms: f64,
}

impl NoteWindowExtractor {
    pub fn new(window_ms: f64) -> Self {
        Self { window_ms }
    }

    /// Snapshot of the handle's player lane; empty when there is no gameplay or lane.
    pub fn snapshot(&self, gameplay: Option<&dyn GameplayHandle>) -> GameStateSnapshot {
        let Some(gameplay) = gameplay else {
            return GameStateSnapshot::empty(0.0);
        };
        let now_ms = gameplay.song_position_ms();
        match gameplay.player_notes() {
            Some(notes) => extract(&notes, now_ms, self.window_ms),
            None => GameStateSnapshot::empty(now_ms),
        }
    }
}
