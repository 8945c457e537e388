//! SpaceHub API Server
//!
//! Serves the booking & earnings core over HTTP and runs the periodic
//! pending-earnings promotion sweep.
//!
//! # Usage
//!
//! ```bash
//! # In-memory storage, default settings
//! spacehub-server
//!
//! # PostgreSQL
//! spacehub-server --storage postgres --database-url postgresql://localhost/spacehub
//!
//! # Environment overrides
//! SPACEHUB__SERVER__PORT=8080 SPACEHUB__LEDGER__PROMOTION_SWEEP_SECS=60 spacehub-server
//! ```

mod config;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spacehub_api::{create_router, AppState};
use spacehub_core::{BookingService, SystemClock, TracingNotifier};
use spacehub_db::{BookingStore, Database, EarningStore, InMemoryBookingStore, InMemoryEarningStore};

use crate::config::{LoggingConfig, ServerConfig, StorageBackend, StorageSettings};

/// SpaceHub booking & earnings API server
#[derive(Parser, Debug)]
#[command(name = "spacehub-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "SPACEHUB_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "SPACEHUB_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SPACEHUB_PORT")]
    port: Option<u16>,

    /// Storage backend (memory, postgres)
    #[arg(long, env = "SPACEHUB_STORAGE")]
    storage: Option<StorageBackend>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SPACEHUB_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "SPACEHUB_LOG_FORMAT")]
    log_format: Option<String>,
}

type Stores = (Arc<dyn BookingStore>, Arc<dyn EarningStore>, Option<Arc<Database>>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;

    // CLI flags win over files and environment
    if let Some(host) = args.host {
        server_config.server.host = host;
    }
    if let Some(port) = args.port {
        server_config.server.port = port;
    }
    if let Some(storage) = args.storage {
        server_config.storage.backend = storage;
    }
    if let Some(url) = args.database_url {
        server_config.storage.database.postgres_url = url;
    }
    if let Some(level) = args.log_level {
        server_config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        server_config.logging.format = format;
    }

    init_logging(&server_config.logging);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        storage = ?server_config.storage.backend,
        "Starting SpaceHub server"
    );

    let (bookings, earnings, database) = init_storage(&server_config.storage).await?;
    let service = Arc::new(BookingService::new(
        bookings,
        earnings,
        Arc::new(SystemClock),
        Arc::new(TracingNotifier),
        server_config.service_config(),
    )?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = server_config
        .ledger
        .sweep_interval()
        .map(|every| tokio::spawn(run_promotion_sweeps(service.clone(), every, shutdown_rx.clone())));

    let state = Arc::new(AppState::new(service, database));
    let app = create_router(state, &server_config.api);

    let addr = server_config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut drain_rx = shutdown_rx.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = drain_rx.changed().await;
            })
            .await
    });

    let mut signalled = shutdown_rx;
    tokio::select! {
        result = &mut server => result??,
        _ = signalled.changed() => {
            let timeout = server_config.server.shutdown_timeout();
            tracing::info!(timeout_secs = timeout.as_secs(), "Draining in-flight requests");
            match tokio::time::timeout(timeout, &mut server).await {
                Ok(result) => result??,
                Err(_) => tracing::warn!("Shutdown timeout elapsed with requests still in flight"),
            }
        }
    }

    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => subscriber.with(fmt::layer().json().with_target(true)).init(),
        _ => subscriber.with(fmt::layer().pretty().with_target(true)).init(),
    }
}

async fn init_storage(settings: &StorageSettings) -> anyhow::Result<Stores> {
    match settings.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; all data is lost on restart");
            let bookings: Arc<dyn BookingStore> = Arc::new(InMemoryBookingStore::new());
            let earnings: Arc<dyn EarningStore> = Arc::new(InMemoryEarningStore::new());
            Ok((bookings, earnings, None))
        }
        StorageBackend::Postgres => {
            let db = Database::connect(&settings.database).await?;
            if settings.database.run_migrations {
                db.migrate().await?;
            }
            if !db.health_check().await.postgres {
                anyhow::bail!("Database health check failed");
            }
            tracing::info!("Database health check passed");

            let bookings: Arc<dyn BookingStore> = Arc::new(db.booking_store());
            let earnings: Arc<dyn EarningStore> = Arc::new(db.earning_store());
            Ok((bookings, earnings, Some(Arc::new(db))))
        }
    }
}

/// Promote pending earnings whose date has passed until shutdown.
async fn run_promotion_sweeps(
    service: Arc<BookingService>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.run_promotion_sweep().await {
                    Ok(promoted) if !promoted.is_empty() => {
                        tracing::info!(count = promoted.len(), "Promotion sweep promoted earnings");
                    }
                    Ok(_) => tracing::debug!("Promotion sweep found nothing due"),
                    Err(e) => tracing::error!(error = %e, "Promotion sweep failed"),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
