// Framework bootstrap for the arena server runtime.

use crate::frameworks::config;
use crate::interface_adapters::routes;
use crate::interface_adapters::state::AppState;
use crate::use_cases::{ReconnectionManager, RoomRegistry, RoomSettings};

use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::time::Instant;

fn init_runtime() {
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

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    // build state
    let state = build_state();
    let registry = state.registry.clone();
    let app = routes::app(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state() -> Arc<AppState> {
    let settings = RoomSettings {
        command_channel_capacity: config::COMMAND_CHANNEL_CAPACITY,
        broadcast_capacity: config::ROOM_BROADCAST_CAPACITY,
        tick_interval: config::tick_interval(),
        tuning: config::room_tuning(),
    };
    let reconnect_window = config::reconnect_window();
    tracing::debug!(
        tick_interval_ms = settings.tick_interval.as_millis() as u64,
        max_players = settings.tuning.max_players,
        winning_score = settings.tuning.winning_score,
        reconnect_window_secs = reconnect_window.as_secs(),
        "room settings configured"
    );

    // The registry starts empty; rooms appear as players join.
    Arc::new(AppState {
        registry: Arc::new(RoomRegistry::new(settings)),
        reconnections: ReconnectionManager::new(reconnect_window),
        started_at: Instant::now(),
    })
}

async fn shutdown_signal(registry: Arc<RoomRegistry>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        // Without a signal there is nothing to wait for; keep serving.
        std::future::pending::<()>().await;
    }

    tracing::info!("shutdown requested");
    // Stopping the room tasks also closes every seated connection.
    let rooms = registry.drain().await;
    tracing::info!(rooms, "rooms stopped");
}
