use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::{signal, sync::mpsc};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use marketplace_api as api;
use api::{
    auth::{Account, InMemoryAccountDirectory},
    cache::{InMemoryTtlCache, TtlCache},
    services::payments::LocalGateway,
};

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool)
            .await
            .context("failed running migrations")?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let event_sender = Arc::new(api::events::EventSender::new(event_tx));
    tokio::spawn(api::events::process_events(event_rx));

    // Accounts are owned by the upstream identity service; seed the local view
    let accounts = InMemoryAccountDirectory::new();
    if let Some(path) = cfg.accounts_file.as_deref() {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read accounts file {}", path))?;
        let seeded: Vec<Account> =
            serde_json::from_str(&raw).context("accounts file is not valid JSON")?;
        info!(count = seeded.len(), "accounts loaded");
        seeded.into_iter().for_each(|account| accounts.insert(account));
    } else {
        warn!("no accounts file configured; every request will be rejected as unauthenticated");
    }

    let verified_cache = Arc::new(InMemoryTtlCache::new());
    spawn_cache_purger(verified_cache.clone());

    let services = api::handlers::AppServices::new(
        db_arc.clone(),
        &cfg,
        event_sender.clone(),
        Arc::new(LocalGateway),
        verified_cache,
    );

    let cors_layer = if cfg.is_production() {
        CorsLayer::new()
    } else {
        CorsLayer::permissive()
    };

    let addr: SocketAddr = cfg
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", cfg.bind_address()))?;

    let app_state = api::AppState {
        db: db_arc,
        config: Arc::new(cfg),
        event_sender,
        accounts: Arc::new(accounts),
        services,
    };
    let app = api::build_router(app_state).layer(cors_layer);

    info!("marketplace-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

fn spawn_cache_purger(cache: Arc<InMemoryTtlCache>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match cache.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "expired verification entries purged"),
                Err(e) => warn!(error = %e, "cache purge failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
