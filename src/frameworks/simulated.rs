// Simulated song and host so a controller can be exercised without a game.

use crate::domain::{
    Direction, DirectionSet, GameHost, GameScreen, GameplayHandle, InputClock, LiveNote,
    QueuedInputEvent,
};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info};

// Notes are generated this far ahead of the song position.
const CHART_LOOKAHEAD_MS: f64 = 2000.0;
// Judged notes linger this long before being pruned.
const PRUNE_AFTER_MS: f64 = 1000.0;
// Every Nth note is a hold.
const HOLD_EVERY: u64 = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score {
    pub hits: u64,
    pub misses: u64,
}

struct SongState {
    position_ms: f64,
    notes: Vec<LiveNote>,
    next_index: u64,
    score: Score,
}

/// Endless scripted chart cycling left, down, up, right.
///
/// The song clock is wall time since construction. [`advance`](Self::advance)
/// moves the judged position and refreshes note flags the way a game would on
/// each frame.
pub struct SimulatedSong {
    started: Instant,
    step_ms: f64,
    hit_window_ms: f64,
    state: Mutex<SongState>,
}

impl SimulatedSong {
    pub fn new(step_ms: f64, hit_window_ms: f64) -> Self {
        Self {
            started: Instant::now(),
            step_ms,
            hit_window_ms,
            state: Mutex::new(SongState {
                position_ms: 0.0,
                notes: Vec::new(),
                next_index: 0,
                score: Score::default(),
            }),
        }
    }

    /// Wall-clock song time; what a real input system would stamp presses with.
    pub fn clock_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    pub fn score(&self) -> Score {
        self.lock().score
    }

    /// Moves the song to `position_ms`, extends the chart and judges misses.
    pub fn advance(&self, position_ms: f64) {
        let mut state = self.lock();
        state.position_ms = position_ms;

        while self.strum_time(state.next_index) <= position_ms + CHART_LOOKAHEAD_MS {
            let note = self.chart_note(state.next_index);
            state.notes.push(note);
            state.next_index += 1;
        }

        let window = self.hit_window_ms;
        let mut missed = 0;
        for note in state.notes.iter_mut().filter(|n| n.is_pending()) {
            let delta = note.strum_time_ms - position_ms;
            note.may_hit = delta.abs() <= window;
            note.too_early = delta > window;
            if delta < -window {
                note.has_missed = true;
                note.miss_handled = true;
                note.alive = false;
                missed += 1;
            }
        }
        state.score.misses += missed;
        state
            .notes
            .retain(|n| n.alive || n.strum_time_ms >= position_ms - PRUNE_AFTER_MS);
    }

    /// Hits the closest hittable note in `direction`; returns the timing offset.
    pub fn judge(&self, direction: Direction, at_ms: f64) -> Option<f64> {
        let mut state = self.lock();
        let note = state
            .notes
            .iter_mut()
            .filter(|n| n.direction == direction && n.may_hit && n.is_pending())
            .min_by(|a, b| {
                let da = (a.strum_time_ms - at_ms).abs();
                let db = (b.strum_time_ms - at_ms).abs();
                da.total_cmp(&db)
            })?;
        let offset = at_ms - note.strum_time_ms;
        note.has_been_hit = true;
        note.may_hit = false;
        if !note.is_hold_note {
            note.alive = false;
        }
        state.score.hits += 1;
        Some(offset)
    }

    fn strum_time(&self, index: u64) -> f64 {
        // Four beats of lead-in before the first note.
        (index + 4) as f64 * self.step_ms
    }

    fn chart_note(&self, index: u64) -> LiveNote {
        let is_hold_note = index % HOLD_EVERY == HOLD_EVERY - 1;
        LiveNote {
            direction: Direction::ALL[(index % 4) as usize],
            strum_time_ms: self.strum_time(index),
            length_ms: if is_hold_note { self.step_ms / 2.0 } else { 0.0 },
            is_hold_note,
            may_hit: false,
            too_early: true,
            has_missed: false,
            has_been_hit: false,
            miss_handled: false,
            alive: true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SongState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GameplayHandle for SimulatedSong {
    fn song_position_ms(&self) -> f64 {
        self.lock().position_ms
    }

    // The scripted chart never pauses.
    fn is_music_playing(&self) -> bool {
        true
    }

    fn player_notes(&self) -> Option<Vec<LiveNote>> {
        Some(self.lock().notes.clone())
    }
}

impl InputClock for SimulatedSong {
    fn now_ms(&self) -> f64 {
        self.clock_ms()
    }
}

/// Host that judges injected presses against a [`SimulatedSong`].
pub struct SimulatedHost {
    song: Arc<SimulatedSong>,
    held: DirectionSet,
    presses: u64,
    ghost_taps: u64,
}

impl SimulatedHost {
    pub fn new(song: Arc<SimulatedSong>) -> Self {
        Self {
            song,
            held: DirectionSet::empty(),
            presses: 0,
            ghost_taps: 0,
        }
    }

    pub fn held(&self) -> DirectionSet {
        self.held
    }

    pub fn presses(&self) -> u64 {
        self.presses
    }

    /// Presses that matched no hittable note.
    pub fn ghost_taps(&self) -> u64 {
        self.ghost_taps
    }
}

impl GameHost for SimulatedHost {
    fn current_screen(&self) -> GameScreen {
        GameScreen::Playing
    }

    fn inject(&mut self, event: QueuedInputEvent) {
        if !event.is_pressed {
            self.held.remove(event.direction);
            return;
        }
        self.held.insert(event.direction);
        self.presses += 1;
        match self.song.judge(event.direction, event.timestamp_ms) {
            Some(offset_ms) => debug!(
                direction = event.direction.name(),
                offset_ms, "note hit"
            ),
            None => {
                self.ghost_taps += 1;
                debug!(direction = event.direction.name(), "ghost tap");
            }
        }
    }
}

/// Logs the running score; called periodically by the host loop.
pub fn log_score(song: &SimulatedSong, host: &SimulatedHost) {
    let score = song.score();
    info!(
        hits = score.hits,
        misses = score.misses,
        presses = host.presses(),
        ghost_taps = host.ghost_taps(),
        held = host.held().iter().count(),
        "score"
    );
}
