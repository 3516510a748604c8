// Session coordinator: binds one gameplay instance to the active transport.

use super::debounce::InputEngine;
use super::extractor::NoteWindowExtractor;
use crate::domain::{
    BridgeError, GameHost, GameStateSnapshot, GameplayHandle, TelemetryFrame, TimedCommand,
    Transport,
};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Fixed tuning for the coordinator and its input engine.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// When false, `initialize` leaves the bridge inert.
    pub enabled: bool,
    /// Minimum dwell between two accepted flips of one direction.
    pub min_input_delay_ms: f64,
    /// Lookahead for upcoming notes.
    pub note_window_ms: f64,
    /// Cadence of note extraction.
    pub extract_interval: Duration,
    /// Cadence of telemetry publication.
    pub send_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initialized,
    SessionActive,
    ShutDown,
}

/// What one `tick` did; mostly useful for tests and debug logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub commands_applied: usize,
    pub commands_dropped: usize,
    pub events_injected: usize,
    pub events_discarded: usize,
    pub published: bool,
}

// Fires at most once per interval, catching up to `now` after a stall.
#[derive(Debug)]
struct RateGate {
    interval: Duration,
    next_due: Option<Instant>,
}

impl RateGate {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    fn ready(&mut self, now: Instant) -> bool {
        let due = self.next_due.unwrap_or(now);
        if now < due {
            return false;
        }
        let next = due + self.interval;
        self.next_due = Some(if next <= now { now + self.interval } else { next });
        true
    }
}

struct Session {
    id: u64,
    gameplay: Weak<dyn GameplayHandle>,
    extractor: NoteWindowExtractor,
    extract_gate: RateGate,
    send_gate: RateGate,
    latest: Option<GameStateSnapshot>,
    frames_published: u64,
    // Set once the transport was told the music stopped; cleared on publish.
    quiesced: bool,
}

/// Single owner of the bridge lifecycle, the input engine and the session.
///
/// Everything here runs on the gameplay thread: the host calls [`tick`] from
/// its update loop, which is where inbound commands are applied, queued edges
/// are injected and notes are extracted.
///
/// [`tick`]: SessionCoordinator::tick
pub struct SessionCoordinator<T, H> {
    settings: SessionSettings,
    transport: T,
    host: H,
    engine: InputEngine,
    commands: mpsc::Receiver<TimedCommand>,
    lifecycle: Lifecycle,
    session: Option<Session>,
    next_session_id: u64,
}

impl<T, H> SessionCoordinator<T, H>
where
    T: Transport,
    H: GameHost,
{
    pub fn new(
        settings: SessionSettings,
        transport: T,
        host: H,
        commands: mpsc::Receiver<TimedCommand>,
    ) -> Self {
        let engine = InputEngine::new(settings.min_input_delay_ms);
        Self {
            settings,
            transport,
            host,
            engine,
            commands,
            lifecycle: Lifecycle::Uninitialized,
            session: None,
            next_session_id: 1,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn engine(&self) -> &InputEngine {
        &self.engine
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Starts the transport. Failures leave the bridge inert but initialized.
    pub fn initialize(&mut self) {
        match self.lifecycle {
            Lifecycle::ShutDown => {
                warn!("initialize called after shutdown; ignoring");
                return;
            }
            Lifecycle::Uninitialized if !self.settings.enabled => {
                info!("bridge disabled; staying inert");
                return;
            }
            _ => {}
        }

        if let Err(e) = self.transport.start() {
            // Gameplay continues with real input only.
            error!(error = %e, "transport failed to start; bridge inert");
        }

        if self.lifecycle == Lifecycle::Uninitialized {
            self.lifecycle = Lifecycle::Initialized;
        }
    }

    /// Binds a new session to `gameplay`, replacing any active one.
    pub fn start_session<G>(&mut self, gameplay: &Arc<G>) -> Result<(), BridgeError>
    where
        G: GameplayHandle + 'static,
    {
        match self.lifecycle {
            Lifecycle::Uninitialized => return Err(BridgeError::NotInitialized),
            Lifecycle::ShutDown => return Err(BridgeError::ShutDown),
            Lifecycle::Initialized | Lifecycle::SessionActive => {}
        }

        if self.session.is_some() {
            self.end_session("replaced");
        }
        // Commands that arrived between sessions belong to neither.
        let dropped = self.discard_commands();
        if dropped > 0 {
            debug!(dropped, "discarded commands received before session start");
        }

        let gameplay: Weak<G> = Arc::downgrade(gameplay);
        let gameplay: Weak<dyn GameplayHandle> = gameplay;
        let id = self.next_session_id;
        self.next_session_id += 1;
        self.session = Some(Session {
            id,
            gameplay,
            extractor: NoteWindowExtractor::new(self.settings.note_window_ms),
            extract_gate: RateGate::new(self.settings.extract_interval),
            send_gate: RateGate::new(self.settings.send_interval),
            latest: None,
            frames_published: 0,
            quiesced: false,
        });
        self.lifecycle = Lifecycle::SessionActive;
        info!(session_id = id, "session started");
        Ok(())
    }

    /// Tears down the active session, if any.
    pub fn stop_session(&mut self) {
        if self.session.is_some() {
            self.end_session("stopped");
        }
    }

    /// Stops the session and the transport. Terminal.
    pub fn shutdown(&mut self) {
        if self.lifecycle == Lifecycle::ShutDown {
            return;
        }
        self.stop_session();
        self.transport.stop();
        self.lifecycle = Lifecycle::ShutDown;
        info!("bridge shut down");
    }

    /// One gameplay update: apply inbound commands, inject their edges, then
    /// extract and publish on their own cadences.
    ///
    /// Commands are only applied while a session is live and the screen is
    /// playable. Outside play they are dropped before reaching the engine, so
    /// its held state keeps matching what the game was actually sent.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        let screen = self.host.current_screen();
        let accepting = self.session.is_some() && screen.is_playable();

        while let Ok(timed) = self.commands.try_recv() {
            if accepting {
                self.engine.apply(timed.command, timed.received_at_ms);
                report.commands_applied += 1;
            } else {
                report.commands_dropped += 1;
            }
        }
        if report.commands_dropped > 0 {
            debug!(dropped = report.commands_dropped, ?screen, "dropped commands outside play");
        }

        if self.engine.pending() > 0 {
            if accepting {
                report.events_injected = self.engine.drain_into(&mut self.host);
            } else {
                report.events_discarded = self.engine.discard_pending();
                debug!(
                    dropped = report.events_discarded,
                    ?screen,
                    "discarded input events outside play"
                );
            }
        }

        let Some(session) = self.session.as_mut() else {
            return report;
        };
        // Quiescent states: gameplay gone or the music clock is not advancing.
        let advancing = session
            .gameplay
            .upgrade()
            .filter(|gameplay| gameplay.is_music_playing());
        let Some(gameplay) = advancing else {
            if !session.quiesced {
                session.quiesced = true;
                session.latest = None;
                self.transport.quiesce();
                debug!(session_id = session.id, "gameplay quiescent; telemetry paused");
            }
            return report;
        };

        if session.extract_gate.ready(now) {
            session.latest = Some(session.extractor.snapshot(Some(gameplay.as_ref())));
        }
        if session.send_gate.ready(now) {
            if let Some(snapshot) = &session.latest {
                self.transport.publish(&TelemetryFrame {
                    snapshot: snapshot.clone(),
                    screen,
                    is_playing: true,
                });
                session.frames_published += 1;
                session.quiesced = false;
                report.published = true;
            }
        }

        report
    }

    fn end_session(&mut self, reason: &'static str) {
        let Some(session) = self.session.take() else {
            return;
        };
        let dropped_events = self.engine.pending();
        self.engine.reset();
        let dropped_commands = self.discard_commands();
        self.transport.session_ended();
        self.lifecycle = Lifecycle::Initialized;
        info!(
            session_id = session.id,
            frames = session.frames_published,
            dropped_events,
            dropped_commands,
            reason,
            "session ended"
        );
    }

    fn discard_commands(&mut self) -> usize {
        let mut count = 0;
        while self.commands.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Direction, DirectionSet, GameScreen, InputClock, InputCommand, LiveNote, QueuedInputEvent,
    };
    use crate::use_cases::commands::{CommandIntake, command_channel};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    #[derive(Default)]
    struct TransportLog {
        starts: usize,
        stops: usize,
        session_ends: usize,
        quiesces: usize,
        frames: Vec<TelemetryFrame>,
    }

    #[derive(Clone, Default)]
    struct RecordingTransport {
        log: Arc<Mutex<TransportLog>>,
        running: Arc<AtomicBool>,
        fail_start: bool,
    }

    impl RecordingTransport {
        fn log(&self) -> std::sync::MutexGuard<'_, TransportLog> {
            self.log.lock().expect("transport log poisoned")
        }
    }

    impl Transport for RecordingTransport {
        fn start(&self) -> Result<(), BridgeError> {
            self.log().starts += 1;
            if self.fail_start {
                return Err(BridgeError::Runtime(std::io::Error::other("bind refused")));
            }
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.log().stops += 1;
            self.running.store(false, Ordering::SeqCst);
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn publish(&self, frame: &TelemetryFrame) {
            self.log().frames.push(frame.clone());
        }

        fn session_ended(&self) {
            self.log().session_ends += 1;
        }

        fn quiesce(&self) {
            self.log().quiesces += 1;
        }
    }

    struct RecordingHost {
        screen: GameScreen,
        injected: Vec<QueuedInputEvent>,
    }

    impl GameHost for RecordingHost {
        fn current_screen(&self) -> GameScreen {
            self.screen
        }

        fn inject(&mut self, event: QueuedInputEvent) {
            self.injected.push(event);
        }
    }

    struct FakeSong {
        position_ms: Mutex<f64>,
        playing: AtomicBool,
        notes: Vec<LiveNote>,
    }

    impl GameplayHandle for FakeSong {
        fn song_position_ms(&self) -> f64 {
            *self.position_ms.lock().expect("position poisoned")
        }

        fn is_music_playing(&self) -> bool {
            self.playing.load(Ordering::SeqCst)
        }

        fn player_notes(&self) -> Option<Vec<LiveNote>> {
            Some(self.notes.clone())
        }
    }

    // Settable clock stored as f64 bits.
    struct ManualClock(AtomicU64);

    impl ManualClock {
        fn set(&self, ms: f64) {
            self.0.store(ms.to_bits(), Ordering::SeqCst);
        }
    }

    impl InputClock for ManualClock {
        fn now_ms(&self) -> f64 {
            f64::from_bits(self.0.load(Ordering::SeqCst))
        }
    }

    type Coordinator = SessionCoordinator<RecordingTransport, RecordingHost>;

    fn settings() -> SessionSettings {
        SessionSettings {
            enabled: true,
            min_input_delay_ms: 50.0,
            note_window_ms: 10.0,
            extract_interval: Duration::from_millis(1000 / 60),
            send_interval: Duration::from_millis(1000 / 30),
        }
    }

    fn coordinator_with(
        settings: SessionSettings,
        transport: RecordingTransport,
    ) -> (Coordinator, CommandIntake, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock(AtomicU64::new(0.0f64.to_bits())));
        let (intake, rx) = command_channel(64, clock.clone());
        let host = RecordingHost {
            screen: GameScreen::Playing,
            injected: Vec::new(),
        };
        (
            SessionCoordinator::new(settings, transport, host, rx),
            intake,
            clock,
        )
    }

    fn song() -> Arc<FakeSong> {
        let note = LiveNote {
            direction: Direction::Left,
            strum_time_ms: 1_000.0,
            length_ms: 0.0,
            is_hold_note: false,
            may_hit: true,
            too_early: false,
            has_missed: false,
            has_been_hit: false,
            miss_handled: false,
            alive: true,
        };
        Arc::new(FakeSong {
            position_ms: Mutex::new(995.0),
            playing: AtomicBool::new(true),
            notes: vec![note],
        })
    }

    fn level(directions: &[Direction]) -> InputCommand {
        InputCommand::Level {
            held: directions.iter().copied().collect::<DirectionSet>(),
        }
    }

    #[test]
    fn when_initialized_then_transport_starts_once_per_call_and_lifecycle_advances() {
        let transport = RecordingTransport::default();
        let (mut coordinator, _intake, _clock) = coordinator_with(settings(), transport.clone());

        assert_eq!(coordinator.lifecycle(), Lifecycle::Uninitialized);
        coordinator.initialize();
        coordinator.initialize();

        assert_eq!(coordinator.lifecycle(), Lifecycle::Initialized);
        assert!(transport.is_running());
        assert_eq!(transport.log().starts, 2);
    }

    #[test]
    fn when_disabled_then_initialize_is_a_no_op() {
        let transport = RecordingTransport::default();
        let mut disabled = settings();
        disabled.enabled = false;
        let (mut coordinator, _intake, _clock) = coordinator_with(disabled, transport.clone());

        coordinator.initialize();

        assert_eq!(coordinator.lifecycle(), Lifecycle::Uninitialized);
        assert_eq!(transport.log().starts, 0);
        assert!(matches!(
            coordinator.start_session(&song()),
            Err(BridgeError::NotInitialized)
        ));
    }

    #[test]
    fn when_transport_fails_to_start_then_bridge_is_initialized_but_inert() {
        let transport = RecordingTransport {
            fail_start: true,
            ..RecordingTransport::default()
        };
        let (mut coordinator, _intake, _clock) = coordinator_with(settings(), transport.clone());

        coordinator.initialize();

        assert_eq!(coordinator.lifecycle(), Lifecycle::Initialized);
        assert!(!transport.is_running());
    }

    #[test]
    fn when_session_starts_then_frames_are_published_at_the_send_rate() {
        let transport = RecordingTransport::default();
        let (mut coordinator, _intake, _clock) = coordinator_with(settings(), transport.clone());
        coordinator.initialize();
        let song = song();
        coordinator.start_session(&song).expect("session should start");

        let start = Instant::now();
        // 60 frames of gameplay, one second.
        for frame in 0..60u64 {
            coordinator.tick(start + Duration::from_micros(frame * 16_667));
        }

        let log = transport.log();
        assert!(
            (29..=31).contains(&log.frames.len()),
            "published {} frames",
            log.frames.len()
        );
        let frame = &log.frames[0];
        assert!(frame.is_playing);
        assert_eq!(frame.screen, GameScreen::Playing);
        assert_eq!(frame.snapshot.current_time_ms, 995.0);
        assert_eq!(frame.snapshot.current_notes.len(), 1);
        assert_eq!(frame.snapshot.upcoming_notes.len(), 1);
    }

    #[test]
    fn when_no_session_is_active_then_nothing_is_published() {
        let transport = RecordingTransport::default();
        let (mut coordinator, _intake, _clock) = coordinator_with(settings(), transport.clone());
        coordinator.initialize();

        let report = coordinator.tick(Instant::now());

        assert!(!report.published);
        assert!(transport.log().frames.is_empty());
    }

    #[test]
    fn when_music_is_not_advancing_then_ticks_are_quiet() {
        let transport = RecordingTransport::default();
        let (mut coordinator, _intake, _clock) = coordinator_with(settings(), transport.clone());
        coordinator.initialize();
        let song = song();
        song.playing.store(false, Ordering::SeqCst);
        coordinator.start_session(&song).expect("session should start");

        assert!(!coordinator.tick(Instant::now()).published);
        assert!(transport.log().frames.is_empty());
    }

    #[test]
    fn when_music_stops_mid_session_then_transport_is_quiesced_once_until_resumed() {
        let transport = RecordingTransport::default();
        let (mut coordinator, _intake, _clock) = coordinator_with(settings(), transport.clone());
        coordinator.initialize();
        let song = song();
        coordinator.start_session(&song).expect("session should start");
        let start = Instant::now();
        assert!(coordinator.tick(start).published);

        song.playing.store(false, Ordering::SeqCst);
        for frame in 1..10u64 {
            coordinator.tick(start + Duration::from_millis(frame * 50));
        }
        assert_eq!(transport.log().quiesces, 1);
        assert_eq!(transport.log().frames.len(), 1);

        song.playing.store(true, Ordering::SeqCst);
        assert!(coordinator.tick(start + Duration::from_secs(1)).published);
        song.playing.store(false, Ordering::SeqCst);
        coordinator.tick(start + Duration::from_millis(1_050));
        assert_eq!(transport.log().quiesces, 2);
    }

    #[test]
    fn when_gameplay_handle_is_dropped_then_ticks_are_quiet() {
        let transport = RecordingTransport::default();
        let (mut coordinator, _intake, _clock) = coordinator_with(settings(), transport.clone());
        coordinator.initialize();
        let song = song();
        coordinator.start_session(&song).expect("session should start");
        drop(song);

        assert!(!coordinator.tick(Instant::now()).published);
        assert!(coordinator.has_session());
    }

    #[test]
    fn when_commands_arrive_during_play_then_edges_are_injected_with_receive_times() {
        let transport = RecordingTransport::default();
        let (mut coordinator, intake, clock) = coordinator_with(settings(), transport);
        coordinator.initialize();
        coordinator.start_session(&song()).expect("session should start");

        clock.set(100.0);
        intake.submit(level(&[Direction::Left]));
        clock.set(110.0);
        intake.submit(level(&[Direction::Left, Direction::Right]));

        let report = coordinator.tick(Instant::now());

        assert_eq!(report.commands_applied, 2);
        assert_eq!(report.events_injected, 2);
        let injected: Vec<(Direction, bool, f64)> = coordinator
            .host()
            .injected
            .iter()
            .map(|e| (e.direction, e.is_pressed, e.timestamp_ms))
            .collect();
        assert_eq!(
            injected,
            vec![(Direction::Left, true, 100.0), (Direction::Right, true, 110.0)]
        );
    }

    #[test]
    fn when_game_is_paused_then_commands_are_dropped_not_deferred() {
        let transport = RecordingTransport::default();
        let (mut coordinator, intake, clock) = coordinator_with(settings(), transport);
        coordinator.initialize();
        coordinator.start_session(&song()).expect("session should start");
        coordinator.host_mut().screen = GameScreen::Paused;

        clock.set(0.0);
        intake.submit(level(&[Direction::Up]));
        let report = coordinator.tick(Instant::now());
        assert_eq!(report.commands_dropped, 1);
        assert!(!coordinator.engine().state(Direction::Up).held);

        coordinator.host_mut().screen = GameScreen::Playing;
        let report = coordinator.tick(Instant::now());
        assert_eq!(report.events_injected, 0);
        assert!(coordinator.host().injected.is_empty());
    }

    #[test]
    fn when_a_release_arrives_during_pause_then_a_later_release_still_reaches_the_game() {
        let transport = RecordingTransport::default();
        let (mut coordinator, intake, clock) = coordinator_with(settings(), transport);
        coordinator.initialize();
        coordinator.start_session(&song()).expect("session should start");

        clock.set(0.0);
        intake.submit(level(&[Direction::Left]));
        coordinator.tick(Instant::now());

        coordinator.host_mut().screen = GameScreen::Paused;
        clock.set(100.0);
        intake.submit(level(&[]));
        coordinator.tick(Instant::now());
        assert!(coordinator.engine().state(Direction::Left).held);

        coordinator.host_mut().screen = GameScreen::Playing;
        clock.set(200.0);
        intake.submit(level(&[]));
        coordinator.tick(Instant::now());

        let injected: Vec<(Direction, bool)> = coordinator
            .host()
            .injected
            .iter()
            .map(|e| (e.direction, e.is_pressed))
            .collect();
        assert_eq!(
            injected,
            vec![(Direction::Left, true), (Direction::Left, false)]
        );
    }

    #[test]
    fn when_session_stops_with_queued_events_then_next_tick_dispatches_nothing() {
        let transport = RecordingTransport::default();
        let (mut coordinator, intake, clock) = coordinator_with(settings(), transport.clone());
        coordinator.initialize();
        coordinator.start_session(&song()).expect("session should start");

        // Three edges already in the engine queue...
        coordinator.engine.apply(
            level(&[Direction::Left, Direction::Down, Direction::Up]),
            0.0,
        );
        assert_eq!(coordinator.engine().pending(), 3);
        // ...and one command still in flight.
        clock.set(5.0);
        intake.submit(level(&[Direction::Right]));

        coordinator.stop_session();
        let report = coordinator.tick(Instant::now());

        assert_eq!(coordinator.engine().pending(), 0);
        assert_eq!(report.events_injected, 0);
        assert!(coordinator.host().injected.is_empty());
        assert_eq!(transport.log().session_ends, 1);
        assert_eq!(coordinator.lifecycle(), Lifecycle::Initialized);
    }

    #[test]
    fn when_stop_session_is_called_twice_then_second_call_changes_nothing() {
        let transport = RecordingTransport::default();
        let (mut coordinator, _intake, _clock) = coordinator_with(settings(), transport.clone());
        coordinator.initialize();
        coordinator.start_session(&song()).expect("session should start");

        coordinator.stop_session();
        coordinator.stop_session();

        assert_eq!(transport.log().session_ends, 1);
        assert_eq!(coordinator.lifecycle(), Lifecycle::Initialized);
        assert!(!coordinator.has_session());
    }

    #[test]
    fn when_a_session_is_started_twice_then_it_replaces_the_first() {
        let transport = RecordingTransport::default();
        let (mut coordinator, _intake, _clock) = coordinator_with(settings(), transport.clone());
        coordinator.initialize();
        let first = song();
        let second = song();
        *second.position_ms.lock().expect("position poisoned") = 2_000.0;

        coordinator.start_session(&first).expect("first session");
        coordinator.start_session(&second).expect("second session");
        coordinator.tick(Instant::now());

        assert_eq!(coordinator.lifecycle(), Lifecycle::SessionActive);
        let log = transport.log();
        assert_eq!(log.session_ends, 1);
        assert_eq!(log.frames[0].snapshot.current_time_ms, 2_000.0);
    }

    #[test]
    fn when_shutdown_then_transport_stops_and_sessions_are_refused() {
        let transport = RecordingTransport::default();
        let (mut coordinator, _intake, _clock) = coordinator_with(settings(), transport.clone());
        coordinator.initialize();
        coordinator.start_session(&song()).expect("session should start");

        coordinator.shutdown();
        coordinator.shutdown();

        assert_eq!(coordinator.lifecycle(), Lifecycle::ShutDown);
        assert!(!transport.is_running());
        assert_eq!(transport.log().stops, 1);
        assert!(matches!(
            coordinator.start_session(&song()),
            Err(BridgeError::ShutDown)
        ));
    }

    #[test]
    fn when_commands_arrive_without_a_session_then_they_never_reach_the_next_one() {
        let transport = RecordingTransport::default();
        let (mut coordinator, intake, _clock) = coordinator_with(settings(), transport);
        coordinator.initialize();

        intake.submit(level(&[Direction::Down]));
        let report = coordinator.tick(Instant::now());
        assert_eq!(report.commands_dropped, 1);

        intake.submit(level(&[Direction::Up]));
        coordinator.start_session(&song()).expect("session should start");
        let report = coordinator.tick(Instant::now());

        assert_eq!(report.commands_applied, 0);
        assert!(coordinator.host().injected.is_empty());
    }

    #[test]
    fn rate_gate_fires_once_per_interval() {
        let mut gate = RateGate::new(Duration::from_millis(10));
        let t0 = Instant::now();

        assert!(gate.ready(t0));
        assert!(!gate.ready(t0 + Duration::from_millis(5)));
        assert!(gate.ready(t0 + Duration::from_millis(10)));
        // A long stall does not cause a burst of catch-up fires.
        assert!(gate.ready(t0 + Duration::from_millis(100)));
        assert!(!gate.ready(t0 + Duration::from_millis(105)));
    }
}
