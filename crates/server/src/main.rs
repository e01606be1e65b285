use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use base_smart_money::coingecko::CoinGecko;
use base_smart_money::config::AppConfig;
use base_smart_money::db::Postgres;
use base_smart_money::ingest::refresh::{
    run_rate_refresher, run_token_info_refresher, run_trending_refresher,
};
use base_smart_money::ingest::LogIngester;
use base_smart_money::kv::{KvStore, RedisKv};
use base_smart_money::logging;
use base_smart_money::server::{self, AppState};
use base_smart_money::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignore if missing).
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env()?;

    // Initialize tracing; hold the guard for the process lifetime.
    let _guard = logging::init_tracing(&config.log_dir)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_addr = %config.http_bind_addr,
        poll = ?config.db_poll_interval,
        from_block = config.from_block,
        max_range_block = config.max_range_block,
        "starting base smart-money analytics service"
    );

    // -----------------------------------------------------------------------
    // Clients and shared state
    // -----------------------------------------------------------------------

    let store = Arc::new(Store::new());

    let db = Arc::new(
        Postgres::connect(&config.database_url)
            .await
            .context("failed to connect to source database")?,
    );

    let kv: Arc<dyn KvStore> = Arc::new(
        RedisKv::connect(&config.redis_url)
            .await
            .context("failed to connect to key/value store")?,
    );

    let shutdown = CancellationToken::new();

    // -----------------------------------------------------------------------
    // Background tasks
    // -----------------------------------------------------------------------

    info!("spawning background tasks");

    let rate_handle = tokio::spawn(run_rate_refresher(
        kv.clone(),
        store.clone(),
        config.rate_refresh_interval,
        shutdown.clone(),
    ));

    let token_info_handle = tokio::spawn(run_token_info_refresher(
        kv.clone(),
        store.clone(),
        config.token_info_interval,
        shutdown.clone(),
    ));

    let trending_handle = tokio::spawn(run_trending_refresher(
        CoinGecko::new(),
        store.clone(),
        shutdown.clone(),
    ));

    let ingester = LogIngester::new(
        db,
        store.clone(),
        config.db_poll_interval,
        config.from_block,
        config.max_range_block,
    );
    let ingest_handle = tokio::spawn(ingester.run(shutdown.clone()));

    // -----------------------------------------------------------------------
    // HTTP gateway
    // -----------------------------------------------------------------------

    let app = server::router(AppState { store, kv });
    let listener = tokio::net::TcpListener::bind(&config.http_bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_bind_addr))?;

    info!(addr = %config.http_bind_addr, "serving; press Ctrl+C to shutdown");

    // Ctrl+C cancels every task, which also drains the HTTP server.
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        info!("shutdown signal received, stopping gracefully...");
        ctrl_c_token.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .context("gateway exited with error")?;

    // Wait for background tasks to finish.
    let (rate_res, token_info_res, trending_res, ingest_res) = tokio::join!(
        rate_handle,
        token_info_handle,
        trending_handle,
        ingest_handle
    );
    for (name, res) in [
        ("rate refresher", rate_res),
        ("token info refresher", token_info_res),
        ("trending refresher", trending_res),
        ("log ingester", ingest_res),
    ] {
        if let Err(e) = res {
            error!(task = name, error = %e, "background task panicked");
        }
    }

    info!("shutdown complete");
    Ok(())
}
