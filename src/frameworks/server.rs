// Framework bootstrap: tracing, config, transport role selection and the
// simulated host loop that drives the bridge.

use crate::domain::{GameHost, InputClock};
use crate::frameworks::config::{self, BridgeRole};
use crate::frameworks::simulated::{SimulatedHost, SimulatedSong, log_score};
use crate::interface_adapters::BridgeTransport;
use crate::interface_adapters::net::{
    ClientSettings, ServerSettings, TransportClient, TransportServer,
};
use crate::use_cases::{CommandIntake, SessionCoordinator, SessionSettings, command_channel};

use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use std::{io::Result, sync::Arc};
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;

// Spacing of the simulated chart.
const CHART_STEP_MS: f64 = 500.0;
const SCORE_LOG_INTERVAL: Duration = Duration::from_secs(5);

pub type Bridge<H> = SessionCoordinator<BridgeTransport, H>;

pub fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub fn session_settings() -> SessionSettings {
    SessionSettings {
        enabled: config::enabled(),
        min_input_delay_ms: config::MIN_INPUT_DELAY.as_secs_f64() * 1000.0,
        note_window_ms: config::NOTE_WINDOW.as_secs_f64() * 1000.0,
        extract_interval: config::EXTRACT_INTERVAL,
        send_interval: config::SEND_INTERVAL,
    }
}

pub fn server_settings() -> ServerSettings {
    ServerSettings {
        bind_addr: SocketAddr::from(([0, 0, 0, 0], config::server_port())),
        ws_addr: config::ws_port().map(|port| SocketAddr::from(([0, 0, 0, 0], port))),
        frame_broadcast_capacity: config::FRAME_BROADCAST_CAPACITY,
        max_line_bytes: config::MAX_LINE_BYTES,
        write_timeout: config::WRITE_TIMEOUT,
    }
}

pub fn client_settings() -> ClientSettings {
    ClientSettings {
        controller_addr: config::controller_addr(),
        reconnect_backoff: config::RECONNECT_BACKOFF,
        send_interval: config::SEND_INTERVAL,
        max_line_bytes: config::MAX_LINE_BYTES,
        write_timeout: config::WRITE_TIMEOUT,
    }
}

pub fn build_transport(role: BridgeRole, runtime: Handle, intake: CommandIntake) -> BridgeTransport {
    match role {
        BridgeRole::Server => {
            BridgeTransport::Server(TransportServer::new(server_settings(), runtime, intake))
        }
        BridgeRole::Client => {
            BridgeTransport::Client(TransportClient::new(client_settings(), runtime, intake))
        }
    }
}

/// Wires the configured transport role, the command channel and `host` into
/// an uninitialized coordinator.
pub fn build_bridge<H: GameHost>(runtime: Handle, host: H, clock: Arc<dyn InputClock>) -> Bridge<H> {
    let (intake, commands) = command_channel(config::COMMAND_CHANNEL_CAPACITY, clock);
    let role = config::role();
    let transport = build_transport(role, runtime, intake);
    tracing::debug!(role = transport.role(), "transport configured");
    SessionCoordinator::new(session_settings(), transport, host, commands)
}

/// Runs the simulated host until `shutdown` resolves.
pub async fn run(
    mut bridge: Bridge<SimulatedHost>,
    song: Arc<SimulatedSong>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    bridge.initialize();
    if let Err(e) = bridge.start_session(&song) {
        // Gameplay still runs; the bridge just has nothing bound.
        tracing::warn!(error = %e, "session not started");
    }

    let mut frame = tokio::time::interval(config::HOST_TICK_INTERVAL);
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_score_log = Instant::now();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = frame.tick() => {
                song.advance(song.clock_ms());
                bridge.tick(Instant::now());
                if last_score_log.elapsed() >= SCORE_LOG_INTERVAL {
                    last_score_log = Instant::now();
                    log_score(&song, bridge.host());
                }
            }
        }
    }

    tracing::info!("shutting down");
    bridge.shutdown();
    log_score(&song, bridge.host());
    Ok(())
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let hit_window_ms = config::HIT_WINDOW.as_secs_f64() * 1000.0;
    let song = Arc::new(SimulatedSong::new(CHART_STEP_MS, hit_window_ms));
    // Presses are stamped on the song clock, the same domain the host judges in.
    let clock: Arc<dyn InputClock> = song.clone();
    let host = SimulatedHost::new(Arc::clone(&song));
    let bridge = build_bridge(Handle::current(), host, clock);

    run(bridge, song, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    })
    .await
}
