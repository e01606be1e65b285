use std::time::Duration;

use thiserror::Error;

/// Typed error hierarchy for the analytics service.
///
/// Request-validation variants surface as 4xx at the gateway; upstream
/// variants surface as 502. Application code wraps with `anyhow::Context`
/// for propagation.
#[derive(Error, Debug)]
pub enum AppError {
    // -- Request validation --------------------------------------------------
    #[error("no window configured for duration {0:?}")]
    InvalidDuration(Duration),

    #[error("unknown chain: {0}")]
    UnknownChain(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    // -- Upstream payloads ---------------------------------------------------
    #[error("corrupt upstream payload: {0}")]
    Corrupt(#[from] serde_json::Error),

    // -- Forwarded errors ----------------------------------------------------
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}
