//! Enriched on-chain event records held by the aggregation engine.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::chain::Action;

/// One on-chain swap, enriched at ingest time with current reference rates
/// and the derived profit figure.
///
/// Addresses keep their source casing here; the engine lowercases at its
/// own boundary when keying aggregate maps.
#[derive(Debug, Clone, Serialize)]
pub struct TradeLog {
    #[serde(rename = "timestamp")]
    pub block_ts: DateTime<Utc>,
    pub block_number: u64,
    pub tx_hash: String,
    pub sender: String,

    pub token_in_address: String,
    pub token_in_amount: f64,
    pub token_in_usdt_rate: f64,

    pub token_out_address: String,
    pub token_out_amount: f64,
    pub token_out_usdt_rate: f64,

    pub native_usdt_rate: f64,

    pub current_token_in_usdt_rate: f64,
    pub current_token_out_usdt_rate: f64,
    pub profit: f64,
    /// Set when a current reference rate was unavailable at enrichment;
    /// such a record contributes its token addresses and nothing else.
    pub current_rate_missing: bool,
}

/// One on-chain token transfer touching a centralised-exchange wallet.
///
/// `is_cex_in` follows the production wire convention: `true` means the
/// external party sits on the in-side of the exchange's books, i.e. the
/// transfer is classified as a withdrawal from the exchange.
#[derive(Debug, Clone, Serialize)]
pub struct TransferLog {
    #[serde(rename = "timestamp")]
    pub block_ts: DateTime<Utc>,
    pub block_number: u64,
    pub tx_hash: String,

    pub from_address: String,
    pub to_address: String,

    pub token_address: String,
    pub token_amount: f64,
    pub is_cex_in: bool,

    pub current_token_usdt_rate: f64,
    pub current_rate_missing: bool,
}

/// A materialised highlight: any event whose USD value at ingest time
/// crossed the big-volume threshold.
#[derive(Debug, Clone, Serialize)]
pub struct BigTx {
    pub tx: String,
    pub token_address: String,
    #[serde(rename = "block_timestamp")]
    pub block_ts: DateTime<Utc>,
    pub block_number: u64,
    pub sender: String,
    pub value_in_token: f64,
    pub value_in_usdt: f64,
    pub price: f64,
    pub action: Action,
}
