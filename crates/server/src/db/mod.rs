//! Cursor interface over the source database.
//!
//! The ingester only ever needs three operations: the high-water block of a
//! table and forward pages of trade/transfer rows ordered by block number.
//! Keeping them behind a trait lets tests script the source.

mod postgres;

pub use postgres::Postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::errors::AppError;
use crate::types::{TradeLog, TransferLog};

pub const TRADE_TABLE: &str = "base_trade_logs";
pub const TRANSFER_TABLE: &str = "base_transfer_logs";

/// Read-only cursor over the append-only source tables.
#[async_trait]
pub trait Database: Send + Sync {
    /// Highest `block_number` present in `table`; `0` for an empty table.
    async fn max_block_number(&self, table: &str) -> Result<i64, AppError>;

    /// Up to `limit` trade rows with `block_number >= from_block`, ascending.
    async fn trades(&self, from_block: i64, limit: i64) -> Result<Vec<TradeRow>, AppError>;

    /// Up to `limit` transfer rows with `block_number >= from_block`,
    /// ascending.
    async fn transfers(&self, from_block: i64, limit: i64) -> Result<Vec<TransferRow>, AppError>;
}

/// Raw trade row as stored in Postgres, before enrichment.
#[derive(Debug, Clone, FromRow)]
pub struct TradeRow {
    pub block_timestamp: DateTime<Utc>,
    pub block_number: i64,
    pub tx_hash: String,
    pub sender: String,

    pub token_in_address: String,
    pub token_in_amount: f64,
    pub token_in_usdt_rate: f64,

    pub token_out_address: String,
    pub token_out_amount: f64,
    pub token_out_usdt_rate: f64,

    pub native_usdt_rate: f64,
}

impl TradeRow {
    /// Lift into the engine record; enrichment fills the derived fields.
    pub fn into_log(self) -> TradeLog {
        TradeLog {
            block_ts: self.block_timestamp,
            block_number: self.block_number as u64,
            tx_hash: self.tx_hash,
            sender: self.sender,
            token_in_address: self.token_in_address,
            token_in_amount: self.token_in_amount,
            token_in_usdt_rate: self.token_in_usdt_rate,
            token_out_address: self.token_out_address,
            token_out_amount: self.token_out_amount,
            token_out_usdt_rate: self.token_out_usdt_rate,
            native_usdt_rate: self.native_usdt_rate,
            current_token_in_usdt_rate: 0.0,
            current_token_out_usdt_rate: 0.0,
            profit: 0.0,
            current_rate_missing: false,
        }
    }
}

/// Raw transfer row as stored in Postgres, before enrichment.
#[derive(Debug, Clone, FromRow)]
pub struct TransferRow {
    pub block_timestamp: DateTime<Utc>,
    pub block_number: i64,
    pub tx_hash: String,

    pub from_address: String,
    pub to_address: String,

    pub token_address: String,
    pub token_amount: f64,
    pub is_cex_in: bool,
}

impl TransferRow {
    pub fn into_log(self) -> TransferLog {
        TransferLog {
            block_ts: self.block_timestamp,
            block_number: self.block_number as u64,
            tx_hash: self.tx_hash,
            from_address: self.from_address,
            to_address: self.to_address,
            token_address: self.token_address,
            token_amount: self.token_amount,
            is_cex_in: self.is_cex_in,
            current_token_usdt_rate: 0.0,
            current_rate_missing: false,
        }
    }
}
