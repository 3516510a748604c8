// Input debounce & queue engine shared by the server and client roles.

use crate::domain::{
    Direction, DirectionInputState, DirectionSet, GameHost, InputCommand, QueuedInputEvent,
};
use std::collections::VecDeque;

/// Turns desired held/released states into clean press/release edges.
///
/// A direction may flip at most once per `min_input_delay_ms`; faster requests
/// are dropped without queuing anything.
#[derive(Debug, Clone)]
pub struct InputEngine {
    min_input_delay_ms: f64,
    states: [DirectionInputState; 4],
    queue: VecDeque<QueuedInputEvent>,
}

impl InputEngine {
    pub fn new(min_input_delay_ms: f64) -> Self {
        Self {
            min_input_delay_ms,
            states: [DirectionInputState::default(); 4],
            queue: VecDeque::new(),
        }
    }

    pub fn state(&self, direction: Direction) -> DirectionInputState {
        self.states[direction.index()]
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn queued(&self) -> impl Iterator<Item = &QueuedInputEvent> {
        self.queue.iter()
    }

    /// Applies one command at `now_ms`; returns how many edges were queued.
    pub fn apply(&mut self, command: InputCommand, now_ms: f64) -> usize {
        match command {
            InputCommand::Edge { direction, pressed } => {
                usize::from(self.request(direction, pressed, now_ms))
            }
            InputCommand::Level { held } => self.apply_level(held, now_ms),
        }
    }

    /// Level form: every direction not in `held` should be released.
    pub fn apply_level(&mut self, held: DirectionSet, now_ms: f64) -> usize {
        Direction::ALL
            .into_iter()
            .filter(|d| self.request(*d, held.contains(*d), now_ms))
            .count()
    }

    pub fn apply_edge(&mut self, direction: Direction, pressed: bool, now_ms: f64) -> bool {
        self.request(direction, pressed, now_ms)
    }

    fn request(&mut self, direction: Direction, desired: bool, now_ms: f64) -> bool {
        let state = &mut self.states[direction.index()];
        if state.held == desired {
            return false;
        }
        if now_ms - state.last_change_ms < self.min_input_delay_ms {
            return false;
        }

        state.held = desired;
        state.last_change_ms = now_ms;
        self.queue.push_back(QueuedInputEvent {
            direction,
            is_pressed: desired,
            timestamp_ms: now_ms,
        });
        true
    }

    /// Injects every queued event in FIFO order; returns how many were sent.
    pub fn drain_into<H: GameHost + ?Sized>(&mut self, host: &mut H) -> usize {
        let count = self.queue.len();
        for event in self.queue.drain(..) {
            host.inject(event);
        }
        count
    }

    /// Drops queued events without dispatching them; returns how many were dropped.
    pub fn discard_pending(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        count
    }

    /// Back to four released directions with an empty queue.
    pub fn reset(&mut self) {
        self.states = [DirectionInputState::default(); 4];
        self.queue.clear();
    }
}
