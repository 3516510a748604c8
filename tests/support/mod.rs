// Shared fakes and helpers for the transport integration tests.
#![allow(dead_code)]

use rhythm_bridge::domain::{
    Direction, GameHost, GameScreen, GameplayHandle, InputClock, LiveNote, QueuedInputEvent,
};
use rhythm_bridge::interface_adapters::net::{
    ClientSettings, ServerSettings, TransportClient, TransportServer,
};
use rhythm_bridge::use_cases::{SessionCoordinator, SessionSettings, command_channel};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

// Upper bound for anything a test waits on over loopback.
pub const WAIT: Duration = Duration::from_secs(3);

pub struct RecordingHost {
    pub screen: GameScreen,
    pub injected: Vec<QueuedInputEvent>,
}

impl RecordingHost {
    pub fn playing() -> Self {
        Self {
            screen: GameScreen::Playing,
            injected: Vec::new(),
        }
    }
}

impl GameHost for RecordingHost {
    fn current_screen(&self) -> GameScreen {
        self.screen
    }

    fn inject(&mut self, event: QueuedInputEvent) {
        self.injected.push(event);
    }
}

// Settable clock stored as f64 bits.
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn at(ms: f64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(ms.to_bits())))
    }

    pub fn set(&self, ms: f64) {
        self.0.store(ms.to_bits(), Ordering::SeqCst);
    }
}

impl InputClock for ManualClock {
    fn now_ms(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::SeqCst))
    }
}

pub struct FakeSong {
    pub position_ms: Mutex<f64>,
    pub playing: AtomicBool,
    pub notes: Mutex<Vec<LiveNote>>,
}

impl FakeSong {
    pub fn new(position_ms: f64, notes: Vec<LiveNote>) -> Arc<Self> {
        Arc::new(Self {
            position_ms: Mutex::new(position_ms),
            playing: AtomicBool::new(true),
            notes: Mutex::new(notes),
        })
    }
}

impl GameplayHandle for FakeSong {
    fn song_position_ms(&self) -> f64 {
        *self.position_ms.lock().expect("position poisoned")
    }

    fn is_music_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn player_notes(&self) -> Option<Vec<LiveNote>> {
        Some(self.notes.lock().expect("notes poisoned").clone())
    }
}

pub fn note(direction: Direction, strum_time_ms: f64, may_hit: bool) -> LiveNote {
    LiveNote {
        direction,
        strum_time_ms,
        length_ms: 0.0,
        is_hold_note: false,
        may_hit,
        too_early: !may_hit,
        has_missed: false,
        has_been_hit: false,
        miss_handled: false,
        alive: true,
    }
}

pub fn session_settings() -> SessionSettings {
    SessionSettings {
        enabled: true,
        min_input_delay_ms: 50.0,
        note_window_ms: 10.0,
        extract_interval: Duration::from_millis(1000 / 60),
        send_interval: Duration::from_millis(1000 / 30),
    }
}

pub fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

pub type ServerBridge = SessionCoordinator<TransportServer, RecordingHost>;
pub type ClientBridge = SessionCoordinator<TransportClient, RecordingHost>;

/// Uninitialized server-role coordinator on an ephemeral loopback port.
pub fn server_bridge(with_ws: bool) -> (ServerBridge, Arc<ManualClock>) {
    let clock = ManualClock::at(1000.0);
    let (intake, commands) = command_channel(64, clock.clone());
    let settings = ServerSettings {
        bind_addr: loopback(),
        ws_addr: with_ws.then(loopback),
        ..ServerSettings::default()
    };
    let transport = TransportServer::new(settings, tokio::runtime::Handle::current(), intake);
    let bridge = SessionCoordinator::new(
        session_settings(),
        transport,
        RecordingHost::playing(),
        commands,
    );
    (bridge, clock)
}

/// Uninitialized client-role coordinator dialing `controller_addr`.
pub fn client_bridge(controller_addr: SocketAddr) -> (ClientBridge, Arc<ManualClock>) {
    let clock = ManualClock::at(1000.0);
    let (intake, commands) = command_channel(64, clock.clone());
    let settings = ClientSettings {
        controller_addr,
        reconnect_backoff: Duration::from_millis(50),
        send_interval: Duration::from_millis(20),
        ..ClientSettings::default()
    };
    let transport = TransportClient::new(settings, tokio::runtime::Handle::current(), intake);
    let bridge = SessionCoordinator::new(
        session_settings(),
        transport,
        RecordingHost::playing(),
        commands,
    );
    (bridge, clock)
}

/// Polls `check` until it holds, yielding to the runtime between attempts.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Reads one `\n`-terminated line, failing the test on timeout or EOF.
pub async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> String {
    let mut line = String::new();
    let read = tokio::time::timeout(WAIT, reader.read_line(&mut line))
        .await
        .expect("line before timeout")
        .expect("read line");
    assert!(read > 0, "connection closed before a line arrived");
    line
}

/// Reads until the peer closes; returns the bytes read before EOF.
pub async fn read_to_eof<R: AsyncBufRead + Unpin>(reader: &mut R) -> usize {
    let mut total = 0;
    let mut line = String::new();
    loop {
        line.clear();
        let read = tokio::time::timeout(WAIT, reader.read_line(&mut line))
            .await
            .expect("eof before timeout");
        match read {
            Ok(0) | Err(_) => return total,
            Ok(n) => total += n,
        }
    }
}
