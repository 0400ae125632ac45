use std::collections::HashMap;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{error, info};

use crate::config::Asset;

const COINGECKO_SIMPLE_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

/// USD price lookup backed by the Coingecko simple-price endpoint.
pub struct PriceOracle {
    client: reqwest::Client,
}

impl Default for PriceOracle {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl PriceOracle {
    /// Fetches prices for every configured asset, keyed by symbol. A
    /// failed request yields an empty map so callers fall back to
    /// zero prices.
    pub async fn price_map(&self, assets: &[Asset]) -> HashMap<String, f64> {
        match self.fetch(assets).await {
            Ok(prices) => prices,
            Err(e) => {
                error!("Failed to fetch price map: {:#}", e);
                HashMap::new()
            }
        }
    }

    async fn fetch(&self, assets: &[Asset]) -> Result<HashMap<String, f64>> {
        let ids: Vec<&str> = assets
            .iter()
            .map(|asset| asset.coingecko_id.as_str())
            .collect();
        let url = format!(
            "{COINGECKO_SIMPLE_PRICE_URL}?ids={}&vs_currencies=usd",
            ids.join(",")
        );

        let json: Value = self
            .client
            .get(&url)
            .send()
            .await
            .context("Price request failed")?
            .error_for_status()
            .context("Price request rejected")?
            .json()
            .await
            .context("Price response is not valid JSON")?;

        Ok(parse_price_map(assets, &json))
    }
}

/// Maps the Coingecko response onto asset symbols. Assets missing from
/// the response get a zero price.
fn parse_price_map(assets: &[Asset], json: &Value) -> HashMap<String, f64> {
    let mut prices = HashMap::new();

    for asset in assets {
        let price = json[&asset.coingecko_id]["usd"].as_f64().unwrap_or(0.0);
        info!("Price {}: ${}", asset.symbol, price);
        prices.insert(asset.symbol.clone(), price);
    }

    prices
}
