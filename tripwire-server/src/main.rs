//! Tripwire Server
//!
//! The HTTP edge of the Tripwire workflow engine: external producers post
//! typed events, the engine matches them against standing triggers and
//! submits rendered jobs to the outbound bus.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use tripwire_core::bus::{HttpBus, MemoryBus, MessageBus};
use tripwire_core::dispatcher::{Dispatcher, StoreHandles};
use tripwire_core::ident::UuidGen;
use tripwire_core::index::{PgIndex, ensure_schema};
use url::Url;

use config::{BusKind, FileConfig, StorageBackend};
use server::{build_router, run_server};
use state::AppState;

/// Tripwire - event-driven workflow engine
#[derive(Parser, Debug)]
#[command(name = "tripwire-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./tripwire.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:14400)
    #[arg(short, long)]
    listen: Option<std::net::SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    tracing::info!("Starting tripwire-server v{}", env!("CARGO_PKG_VERSION"));

    let file_config = FileConfig::load(&args.config)?;
    let listen = args.listen.unwrap_or(file_config.server.listen);

    let handles = build_storage(&file_config).await?;
    let bus = build_bus(&file_config)?;

    let engine = Dispatcher::new(
        handles,
        bus,
        Arc::new(UuidGen),
        file_config.engine.clone(),
    );

    // The scheduler and its workers stop when this flips to true.
    let (scheduler_shutdown_tx, scheduler_shutdown_rx) = watch::channel(false);
    engine.init_cron(scheduler_shutdown_rx).await?;

    let router = build_router(AppState::new(engine));
    run_server(router, listen).await?;

    let _ = scheduler_shutdown_tx.send(true);
    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn build_storage(config: &FileConfig) -> anyhow::Result<StoreHandles> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("storage backend: memory");
            Ok(StoreHandles::memory())
        }
        StorageBackend::Postgres => {
            let url = config
                .storage
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("storage.database_url is required for postgres"))?;
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            ensure_schema(&pool).await?;
            tracing::info!("storage backend: postgres");
            Ok(StoreHandles {
                event_types: Arc::new(PgIndex::new(pool.clone(), "eventtypes")),
                events: Arc::new(PgIndex::new(pool.clone(), "events")),
                triggers: Arc::new(PgIndex::new(pool.clone(), "triggers")),
                alerts: Arc::new(PgIndex::new(pool.clone(), "alerts")),
                crons: Arc::new(PgIndex::new(pool, "crons")),
            })
        }
    }
}

fn build_bus(config: &FileConfig) -> anyhow::Result<Arc<dyn MessageBus>> {
    match config.bus.kind {
        BusKind::Memory => {
            tracing::info!("bus: memory");
            Ok(Arc::new(MemoryBus::new()))
        }
        BusKind::Http => {
            let endpoint = config
                .bus
                .endpoint
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("bus.endpoint is required for the http bus"))?;
            let endpoint = Url::parse(endpoint)?;
            tracing::info!(endpoint = %endpoint, "bus: http relay");
            Ok(Arc::new(HttpBus::new(endpoint)))
        }
    }
}
