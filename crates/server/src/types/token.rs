//! Token reference metadata decoded from the external K/V store.
//!
//! Field spellings are pinned to the upstream JSON contracts (the
//! dexscreener price array and the CMC token-info object), so these types
//! double as the wire schema. Missing fields decode to their zero values.

use serde::{Deserialize, Serialize};

/// Venue a reference price was sourced from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePrice {
    Cex,
    #[default]
    Dex,
}

/// Per-address token metadata, keyed by lower-cased address in the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    #[serde(rename = "usdPrice")]
    pub usd_price: f64,
    #[serde(rename = "tokenAddress")]
    pub address: String,
    pub symbol: String,
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "sourcePrice")]
    pub source_price: SourcePrice,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(rename = "dexId")]
    pub dex_id: String,
    pub url: String,

    #[serde(rename = "priceChangeM5")]
    pub price_change_m5: f64,
    #[serde(rename = "priceChangeH1")]
    pub price_change_h1: f64,
    #[serde(rename = "priceChangeH6")]
    pub price_change_h6: f64,
    #[serde(rename = "priceChangeH24")]
    pub price_change_h24: f64,
}

/// The `cmc_token_info` payload: a refresh timestamp plus the token list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CmcTokens {
    pub updated_time: i64,
    pub tokens: Vec<CmcTokenInfo>,
}

/// Symbol-keyed market metadata from the primary source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CmcTokenInfo {
    pub name: String,
    pub symbol: String,
    pub circulating_supply: f64,
    pub total_supply: f64,
    pub max_supply: f64,
    pub usd_price: f64,
    pub market_cap: f64,
    pub tags: Vec<String>,
    pub volume_24h: f64,
    pub fully_diluted_valuation: f64,
    pub percent_change_1h: f64,
    pub percent_change_24h: f64,
    pub percent_change_7d: f64,
}

/// One row of a user balance snapshot (`<chain>_<address>` K/V key).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenBalance {
    pub address: String,
    pub amount: f64,
}
