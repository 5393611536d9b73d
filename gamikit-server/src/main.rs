//! gamikit server
//!
//! An event-driven gamification engine: points, levels, badges and
//! leaderboards behind a small HTTP and WebSocket API.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::file::{LogFormat, LoggingConfig, StorageAdapter};
use config::profiles::Profile;
use config::{ConfigError, ConfigLoader};
use gamikit_core::leaderboard::{MemoryLeaderboard, PgLeaderboard};
use gamikit_core::processors::RealtimeHub;
use gamikit_core::store::{MemoryStore, PgStore};
use gamikit_core::{EventBus, GamifyService, Leaderboard, Metric, Store};
use server::{build_router, cors_layer, run_server};
use shutdown::shutdown_signal;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// gamikit - event-driven gamification engine
#[derive(Parser, Debug)]
#[command(name = "gamikit-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./gamikit.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Configuration profile providing defaults
    #[arg(short, long, value_enum, env = "GAMIKIT_PROFILE", default_value_t = Profile::Development)]
    profile: Profile,

    /// Run database migrations on startup (postgres adapter only)
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.profile, args.listen);
    let loaded = config_loader.load().inspect_err(|e| {
        // Tracing is not up yet.
        eprintln!("Failed to load configuration: {e}");
    })?;

    // Initialize tracing
    init_tracing(&loaded.file.logging);

    tracing::info!("Starting gamikit-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        profile = %loaded.profile,
        path = ?config_loader.config_path(),
        "Configuration loaded"
    );
    match loaded.describe() {
        Ok(summary) => tracing::debug!("Effective configuration:\n{summary}"),
        Err(e) => tracing::warn!(error = %e, "Failed to render effective configuration"),
    }

    let file = &loaded.file;
    let board_name = file.leaderboard.board.as_str();

    // Storage backends
    let (store, leaderboard, db_pool): (Arc<dyn Store>, Arc<dyn Leaderboard>, Option<PgPool>) =
        match file.storage.adapter {
            StorageAdapter::Memory => {
                if args.migrate {
                    tracing::warn!("--migrate has no effect with the memory adapter");
                }
                tracing::info!("Using in-memory storage");
                (
                    Arc::new(MemoryStore::new()),
                    Arc::new(MemoryLeaderboard::new(board_name)),
                    None,
                )
            }
            StorageAdapter::Postgres => {
                let database_url = loaded
                    .database_url
                    .as_deref()
                    .ok_or(ConfigError::MissingDatabaseUrl)?;
                let pool = connect_database(
                    database_url,
                    file.storage.max_connections,
                    args.migrate,
                )
                .await?;
                (
                    Arc::new(PgStore::new(pool.clone())),
                    Arc::new(PgLeaderboard::new(pool.clone(), board_name)),
                    Some(pool),
                )
            }
        };

    // Event bus and orchestrator
    let bus = EventBus::with_limits(
        file.dispatch.mode,
        file.dispatch.max_in_flight,
        file.dispatch.overflow,
    );
    tracing::info!(
        mode = ?file.dispatch.mode,
        max_in_flight = file.dispatch.max_in_flight,
        overflow = ?file.dispatch.overflow,
        "Event bus configured"
    );
    let service = GamifyService::new(store, loaded.rules.clone(), bus.clone());

    // Create application state
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new(
        service,
        leaderboard,
        Metric::new(file.leaderboard.metric.as_str()),
        RealtimeHub::new(0),
        shutdown_rx,
    );

    // Build the router
    let cors = file.server.cors_origin().map(cors_layer).transpose()?;
    if let Some(origin) = file.server.cors_origin() {
        tracing::info!(origin, "CORS enabled");
    }
    let router = build_router(state, file.server.path_prefix.as_deref(), cors);

    // Run the server
    let listen_addr = file.server.listen;
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr, async move {
        shutdown_signal().await;
        // Closes open WebSocket sessions.
        let _ = shutdown_tx.send(true);
    })
    .await;

    // Let in-flight async handlers finish
    tracing::info!("Draining event bus...");
    bus.flush().await;

    // Close database connections gracefully
    if let Some(pool) = db_pool {
        tracing::info!("Closing database connections...");
        pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Connect to PostgreSQL and optionally run migrations.
async fn connect_database(
    database_url: &str,
    max_connections: u32,
    migrate: bool,
) -> anyhow::Result<PgPool> {
    tracing::info!(
        url = %config::redact_database_url(database_url),
        "Connecting to database..."
    );
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .inspect_err(|e| tracing::error!("Failed to connect to database: {}", e))?;
    tracing::info!("Database connection established");

    if migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .inspect_err(|e| tracing::error!("Failed to run migrations: {}", e))?;
        tracing::info!("Migrations completed successfully");
    }

    Ok(pool)
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
