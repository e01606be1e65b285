//! String key/value interface over the external in-memory store.
//!
//! The service reads reference prices, CMC metadata and user balance
//! snapshots out of Redis; it never owns those keys. The trait keeps the
//! gateway and refreshers testable without a live server.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::info;

use crate::errors::AppError;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<String, AppError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
}

/// Redis-backed implementation over a multiplexed async connection.
#[derive(Clone)]
pub struct RedisKv {
    conn: MultiplexedConnection,
}

impl RedisKv {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("connected to key/value store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<String, AppError> {
        let mut conn = self.conn.clone();
        Ok(conn.get::<_, String>(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }
}
