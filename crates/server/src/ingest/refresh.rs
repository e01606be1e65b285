//! Periodic refreshers for reference data.
//!
//! Each loop fetches, decodes and swaps a snapshot into the engine. Any
//! fetch or decode failure is logged and the previous snapshot stays in
//! place; a partial update is never published.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::coingecko::CoinGecko;
use crate::errors::AppError;
use crate::kv::KvStore;
use crate::store::Store;
use crate::types::{CmcTokens, Token};

/// K/V key holding the dexscreener price array.
const RATE_PRICES_KEY: &str = "dex_screener_prices";

/// K/V key holding the CMC token-info object.
const CMC_TOKEN_INFO_KEY: &str = "cmc_token_info";

/// The trending list moves slowly; six hours matches the upstream cadence.
pub const TRENDING_REFRESH_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Refresh the USD rate snapshot and per-address metadata every `every`.
pub async fn run_rate_refresher(
    kv: Arc<dyn KvStore>,
    store: Arc<Store>,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = refresh_rates(kv.as_ref(), &store).await {
                    error!(error = %e, "rate refresh failed");
                }
            }
            _ = shutdown.cancelled() => {
                debug!("rate refresher shutting down");
                return;
            }
        }
    }
}

async fn refresh_rates(kv: &dyn KvStore, store: &Store) -> Result<(), AppError> {
    let raw = kv.get(RATE_PRICES_KEY).await?;
    let rates: Vec<Token> = serde_json::from_str(&raw)?;
    store.set_token_rates(&rates);
    store.set_token_info(&rates);
    debug!(count = rates.len(), "price snapshot refreshed");
    Ok(())
}

/// Refresh the symbol-keyed CMC metadata every `every`.
pub async fn run_token_info_refresher(
    kv: Arc<dyn KvStore>,
    store: Arc<Store>,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = refresh_token_info(kv.as_ref(), &store).await {
                    error!(error = %e, "token info refresh failed");
                }
            }
            _ = shutdown.cancelled() => {
                debug!("token info refresher shutting down");
                return;
            }
        }
    }
}

async fn refresh_token_info(kv: &dyn KvStore, store: &Store) -> Result<(), AppError> {
    let raw = kv.get(CMC_TOKEN_INFO_KEY).await?;
    let info: CmcTokens = serde_json::from_str(&raw)?;
    store.set_cmc_tokens(&info);
    debug!(
        count = info.tokens.len(),
        updated_time = info.updated_time,
        "token info refreshed"
    );
    Ok(())
}

/// Refresh the trending list every [`TRENDING_REFRESH_INTERVAL`].
pub async fn run_trending_refresher(
    coingecko: CoinGecko,
    store: Arc<Store>,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(TRENDING_REFRESH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match coingecko.trending().await {
                    Ok(trending) => {
                        debug!(coins = trending.coins.len(), "trending list refreshed");
                        store.set_trending(trending);
                    }
                    Err(e) => error!(error = %e, "trending refresh failed"),
                }
            }
            _ = shutdown.cancelled() => {
                debug!("trending refresher shutting down");
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
