//! Trending-list client for the CoinGecko API.

use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::AppError;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The trending payload, cached as-is and replaced atomically on refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendingList {
    pub coins: Vec<TrendingCoin>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendingCoin {
    pub item: TrendingItem,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendingItem {
    pub name: String,
    pub symbol: String,
    pub thumb: String,
    pub small: String,
    pub data: TrendingData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendingData {
    pub price: f64,
    pub market_cap: String,
    pub total_volume: String,
    pub price_change_percentage_24h: PriceChange24h,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceChange24h {
    pub eur: f64,
}

pub struct CoinGecko {
    client: reqwest::Client,
    base_url: String,
}

impl Default for CoinGecko {
    fn default() -> Self {
        Self::new()
    }
}

impl CoinGecko {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Fetch the current trending coin list.
    pub async fn trending(&self) -> Result<TrendingList, AppError> {
        let resp = self
            .client
            .get(format!("{}/search/trending", self.base_url))
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trending_payload_decodes() {
        let raw = r#"{
            "coins": [{
                "item": {
                    "name": "Zed Run",
                    "symbol": "ZED",
                    "thumb": "https://img.example/t.png",
                    "small": "https://img.example/s.png",
                    "data": {
                        "price": 0.042,
                        "market_cap": "$1,234,567",
                        "total_volume": "$89,000",
                        "price_change_percentage_24h": { "eur": -3.2 }
                    }
                }
            }]
        }"#;
        let list: TrendingList = serde_json::from_str(raw).unwrap();
        assert_eq!(list.coins.len(), 1);
        let item = &list.coins[0].item;
        assert_eq!(item.symbol, "ZED");
        assert_eq!(item.data.price, 0.042);
        assert_eq!(item.data.price_change_percentage_24h.eur, -3.2);
    }
}
