//! Environment-driven runtime configuration.
//!
//! Every knob has a default except the database URL. Durations use the
//! compact string form (`"3s"`, `"24h"`, `"7d"`) shared with the query
//! surface; an unparseable override falls back to the default.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP gateway binds to.
    pub http_bind_addr: String,
    /// Postgres connection URL for the source tables.
    pub database_url: String,
    /// Redis connection URL for the reference-data K/V store.
    pub redis_url: String,
    /// Cadence of the source-database poll.
    pub db_poll_interval: Duration,
    /// Cadence of the price-snapshot refresh.
    pub rate_refresh_interval: Duration,
    /// Cadence of the CMC token-info refresh.
    pub token_info_interval: Duration,
    /// Starting ingest watermark (block number).
    pub from_block: i64,
    /// Backfill cap: never start more than this many blocks behind the tip.
    pub max_range_block: i64,
    /// Directory for rolling log files.
    pub log_dir: String,
}

impl AppConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Result<Self> {
        let database_url = env_string("DATABASE_URL").context("DATABASE_URL is required")?;
        let redis_url =
            env_string("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string());
        let http_bind_addr =
            env_string("HTTP_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        Ok(Self {
            http_bind_addr,
            database_url,
            redis_url,
            db_poll_interval: env_duration("GET_DATA_FROM_DB_DURATION")
                .unwrap_or(Duration::from_secs(3)),
            rate_refresh_interval: env_duration("GET_RATE_DURATION")
                .unwrap_or(Duration::from_secs(10)),
            token_info_interval: env_duration("GET_TOKEN_INFO_DURATION")
                .unwrap_or(Duration::from_secs(60)),
            from_block: env_parse("SOL_FROM_BLOCK").unwrap_or(0),
            max_range_block: env_parse("MAX_RANGE_BLOCK").unwrap_or(0),
            log_dir: env_string("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        })
    }
}

/// Read a non-empty env var as a `String`.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Read a non-empty env var and parse it as `T`.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

/// Read a non-empty env var and parse it as a duration string.
fn env_duration(key: &str) -> Option<Duration> {
    env_string(key).and_then(|v| parse_duration(&v).ok())
}

/// Parse a compact duration string: one or more `<number><unit>` segments
/// where the unit is `ms`, `s`, `m`, `h`, `d` or `w` (`"3s"`, `"1h30m"`,
/// `"7d"`). Fractions are allowed (`"1.5h"`).
pub fn parse_duration(s: &str) -> Result<Duration, AppError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(AppError::MalformedRequest("empty duration".to_string()));
    }

    let bytes = trimmed.as_bytes();
    let mut total = Duration::ZERO;
    let mut i = 0;
    while i < bytes.len() {
        let number_start = i;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
            i += 1;
        }
        let value: f64 = trimmed[number_start..i]
            .parse()
            .map_err(|_| AppError::MalformedRequest(format!("bad duration: {s}")))?;

        let unit_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let unit_secs = match &trimmed[unit_start..i] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            "d" => 86_400.0,
            "w" => 604_800.0,
            _ => return Err(AppError::MalformedRequest(format!("bad duration: {s}"))),
        };
        total += Duration::from_secs_f64(value * unit_secs);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clean_env() {
        for key in [
            "DATABASE_URL",
            "REDIS_URL",
            "HTTP_BIND_ADDR",
            "GET_DATA_FROM_DB_DURATION",
            "GET_RATE_DURATION",
            "GET_TOKEN_INFO_DURATION",
            "SOL_FROM_BLOCK",
            "MAX_RANGE_BLOCK",
            "LOG_DIR",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn parse_duration_accepts_window_spellings() {
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("4h").unwrap(), Duration::from_secs(4 * 3600));
        assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(7 * 86_400));
        assert_eq!(
            parse_duration("30d").unwrap(),
            Duration::from_secs(30 * 86_400)
        );
        assert_eq!(
            parse_duration("1h30m").unwrap(),
            Duration::from_secs(5400)
        );
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn parse_duration_rejects_junk() {
        for bad in ["", "h", "10", "10x", "ten seconds", "-5s"] {
            assert!(
                matches!(parse_duration(bad), Err(AppError::MalformedRequest(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    #[serial]
    fn from_env_requires_database_url() {
        clean_env();
        assert!(AppConfig::from_env().is_err());
        clean_env();
    }

    #[test]
    #[serial]
    fn from_env_applies_defaults() {
        clean_env();
        std::env::set_var("DATABASE_URL", "postgres://localhost/analytics");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.db_poll_interval, Duration::from_secs(3));
        assert_eq!(config.rate_refresh_interval, Duration::from_secs(10));
        assert_eq!(config.token_info_interval, Duration::from_secs(60));
        assert_eq!(config.from_block, 0);
        assert_eq!(config.http_bind_addr, "0.0.0.0:8080");
        clean_env();
    }

    #[test]
    #[serial]
    fn from_env_reads_overrides() {
        clean_env();
        std::env::set_var("DATABASE_URL", "postgres://localhost/analytics");
        std::env::set_var("GET_DATA_FROM_DB_DURATION", "5s");
        std::env::set_var("SOL_FROM_BLOCK", "123456");
        std::env::set_var("MAX_RANGE_BLOCK", "1000000");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.db_poll_interval, Duration::from_secs(5));
        assert_eq!(config.from_block, 123_456);
        assert_eq!(config.max_range_block, 1_000_000);
        clean_env();
    }

    #[test]
    #[serial]
    fn invalid_duration_override_falls_back_to_default() {
        clean_env();
        std::env::set_var("DATABASE_URL", "postgres://localhost/analytics");
        std::env::set_var("GET_RATE_DURATION", "soon");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.rate_refresh_interval, Duration::from_secs(10));
        clean_env();
    }
}
