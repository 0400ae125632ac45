use std::path::Path;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Static configuration for one tracked lending-pool asset. Immutable for
/// the duration of a run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub symbol: String,
    pub decimals: u8,
    /// Yield-bearing token issued against deposits.
    pub a_token: Address,
    /// Virtual token tracking reward accrual, when the asset has one.
    #[serde(default)]
    pub virtual_reward_token: Option<Address>,
    /// Price-feed identifier on CoinGecko.
    pub coingecko_id: String,
    /// Earliest block worth scanning for transfers.
    #[serde(default)]
    pub origin_block: u64,
}

impl Asset {
    /// Loads the asset list from a JSON config file.
    pub fn load_all(path: &Path) -> Result<Vec<Asset>> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read assets config {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Malformed assets config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_asset_list() {
        let json = r#"[
            {
                "symbol": "USDT",
                "decimals": 6,
                "aToken": "0x0000000000000000000000000000000000000001",
                "virtualRewardToken": "0x0000000000000000000000000000000000000002",
                "coingeckoId": "tether",
                "originBlock": 12345
            },
            {
                "symbol": "WCORE",
                "decimals": 18,
                "aToken": "0x0000000000000000000000000000000000000003",
                "coingeckoId": "coredaoorg"
            }
        ]"#;

        let assets: Vec<Asset> = serde_json::from_str(json).unwrap();

        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].symbol, "USDT");
        assert_eq!(assets[0].origin_block, 12345);
        assert!(assets[0].virtual_reward_token.is_some());
        assert_eq!(assets[1].origin_block, 0);
        assert!(assets[1].virtual_reward_token.is_none());
    }
}
