#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use beacon_service::database::{self, DatabaseImpl};
use beacon_service::{Config, HttpProber, MonitoringExecutor, MonitoringScheduler, SubscriptionRegistry};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

mod error;
mod routes;
mod state;

use error::AppError;
use logger::init_tracing;
use state::AppState;

/// Monitoring engine: periodic sweeps plus live status over WebSocket
#[derive(Debug, Parser)]
#[command(name = "beacon-server", version, about)]
struct Cli {
    /// Path to the config file (defaults to $XDG_CONFIG_HOME/beacon/config.toml)
    #[arg(short, long, env = "BEACON_CONFIG")]
    config: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref())?;

    run_server(config).await
}

async fn run_server(config: Config) -> Result<(), AppError> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    let pool = database::open(&config.database.path).await.map_err(AppError::Database)?;
    let database = Arc::new(DatabaseImpl::new_from_pool(pool));

    let prober = HttpProber::new(config.monitoring.timeout(), config.monitoring.slow_threshold_ms)
        .map_err(|e| AppError::Prober(e.to_string()))?;
    let registry = Arc::new(SubscriptionRegistry::new(
        config.broadcast.send_timeout(),
        config.broadcast.outbox_capacity,
    ));
    let executor = Arc::new(MonitoringExecutor::new(Arc::new(prober), database, Arc::clone(&registry)));
    let scheduler = Arc::new(MonitoringScheduler::new(executor, config.monitoring.scheduler()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = scheduler.spawn(shutdown_rx);

    let state = web::Data::new(AppState::new(Arc::clone(&registry)));
    let server = HttpServer::new(move || App::new().app_data(state.clone()).configure(routes::routes))
        .disable_signals()
        .shutdown_timeout(config.server.shutdown_timeout_seconds)
        .bind(addr)?
        .run();
    let handle = server.handle();

    info!(%addr, database = %config.database.path, "Beacon server listening");

    let server_task = actix_web::rt::spawn(server);
    let result = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            result.map_err(AppError::from)
        }
        joined = server_task => match joined {
            Ok(result) => result.map_err(AppError::from),
            Err(e) => Err(AppError::Io(std::io::Error::other(e))),
        },
    };

    shutdown_tx.send_replace(true);
    registry.close_all().await;
    handle.stop(true).await;

    if tokio::time::timeout(Duration::from_secs(config.server.shutdown_timeout_seconds), scheduler_task)
        .await
        .is_err()
    {
        error!("Monitoring scheduler did not stop in time");
    }

    info!("Beacon server stopped");
    result
}
