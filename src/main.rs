//! walletx - custodial wallet backend
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────────┐    ┌──────────┐
//! │  Config  │───▶│ Gateway  │───▶│ FundsEngine  │───▶│  Store   │
//! │  (YAML)  │    │  (axum)  │    │ AccountSec.  │    │ (PG/Mem) │
//! └──────────┘    └──────────┘    └──────────────┘    └──────────┘
//! ```
//!
//! Usage: `walletx [--env dev|prod] [--port 8080]`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use walletx::config::{AppConfig, StorageKind};
use walletx::db::{Database, schema::init_schema};
use walletx::funding::ensure_services;
use walletx::gateway::{handlers::BUILD_VERSION, run_server, state::AppState};
use walletx::store::{MemoryStore, PgStore, TxRunner, WalletStore};
use walletx::user_auth::MemoryCodeStore;

const CODE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = walletx::logging::init_logging(&app_config);

    info!(
        env = %env,
        storage = ?app_config.storage,
        version = BUILD_VERSION,
        "Starting walletx"
    );

    match app_config.storage {
        StorageKind::Postgres => {
            let url = app_config
                .postgres_url
                .as_deref()
                .context("storage is postgres but postgres_url is not set")?;
            let db = Database::connect(url, app_config.max_connections)
                .await
                .context("Failed to connect to PostgreSQL")?;
            init_schema(db.pool()).await?;

            let db = Arc::new(db);
            let store = Arc::new(PgStore::new(&db));
            let served = serve(&app_config, store, Some(Arc::clone(&db))).await;
            db.close().await;
            served
        }
        StorageKind::Memory => {
            warn!("Running on the in-process store; all state is lost on exit");
            serve(&app_config, Arc::new(MemoryStore::new()), None).await
        }
    }
}

async fn serve<S: WalletStore>(
    config: &AppConfig,
    store: Arc<S>,
    pg_db: Option<Arc<Database>>,
) -> anyhow::Result<()> {
    let tx = TxRunner::new(
        Arc::clone(&store),
        Duration::from_millis(config.transaction_timeout_ms),
    );
    let created = ensure_services(&store, &tx, &config.services)
        .await
        .context("Failed to register services")?;
    info!(created, total = config.services.len(), "Service catalog ready");

    let codes = Arc::new(MemoryCodeStore::new());
    let purge = Arc::clone(&codes);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CODE_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = purge.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Expired verification codes purged");
            }
        }
    });

    let state = Arc::new(AppState::new(config, store, codes, pg_db));
    run_server(&config.gateway, state).await
}
