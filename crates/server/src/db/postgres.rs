//! Postgres implementation of the source-database cursor.
//!
//! Uses runtime `sqlx::query_as` queries; the schema is owned by the
//! indexer that writes these tables, not by this service.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use super::{Database, TradeRow, TransferRow, TRADE_TABLE, TRANSFER_TABLE};
use crate::errors::AppError;

const TRADE_COLUMNS: &str = "block_timestamp, block_number, tx_hash, sender, \
     token_in_address, token_in_amount, token_in_usdt_rate, \
     token_out_address, token_out_amount, token_out_usdt_rate, \
     native_usdt_rate";

const TRANSFER_COLUMNS: &str = "block_timestamp, block_number, tx_hash, \
     from_address, to_address, token_address, token_amount, is_cex_in";

pub struct Postgres {
    pool: PgPool,
}

impl Postgres {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
        info!("connected to source database");
        Ok(Self { pool })
    }
}

#[async_trait]
impl Database for Postgres {
    async fn max_block_number(&self, table: &str) -> Result<i64, AppError> {
        // Table names come from the two module constants, never from input.
        let sql = format!("SELECT max(block_number) FROM {table}");
        let row: (Option<i64>,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(row.0.unwrap_or(0))
    }

    async fn trades(&self, from_block: i64, limit: i64) -> Result<Vec<TradeRow>, AppError> {
        let sql = format!(
            "SELECT {TRADE_COLUMNS} FROM {TRADE_TABLE} \
             WHERE block_number >= $1 ORDER BY block_number LIMIT $2"
        );
        Ok(sqlx::query_as(&sql)
            .bind(from_block)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn transfers(&self, from_block: i64, limit: i64) -> Result<Vec<TransferRow>, AppError> {
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM {TRANSFER_TABLE} \
             WHERE block_number >= $1 ORDER BY block_number LIMIT $2"
        );
        Ok(sqlx::query_as(&sql)
            .bind(from_block)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }
}
