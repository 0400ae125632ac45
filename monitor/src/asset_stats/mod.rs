use std::collections::{BTreeMap, HashMap};

use chain_client::ChainReader;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use snapshot_store::HolderRecord;
use tracing::{error, info};

use crate::{config::Asset, holders_indexer::AssetHolders, utils::math_helper};

/// Pool-side TVL of one asset, valued at the current oracle price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTvl {
    pub symbol: String,
    pub raw_supply: String,
    pub decimals: u8,
    pub price: f64,
    #[serde(rename = "tvlUSD")]
    pub tvl_usd: f64,
    pub updated_at: String,
}

/// Reward emission schedule of one asset's virtual reward token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionStats {
    pub reward_token: String,
    pub emission_per_second: String,
    pub emission_end: String,
}

/// Subscriber-side TVL measured through the virtual reward token supply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualTvl {
    #[serde(rename = "tvlSubsUSD")]
    pub tvl_subs_usd: f64,
    #[serde(rename = "tvlSubsRaw")]
    pub tvl_subs_raw: String,
}

/// One row of the published asset statistics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedAssetStats {
    #[serde(flatten)]
    pub tvl: AssetTvl,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub emission: Option<EmissionStats>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub virtual_tvl: Option<VirtualTvl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holders: Option<BTreeMap<String, HolderRecord>>,
    pub tvl_subs_pct: Option<f64>,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Values each asset's aToken total supply at the current price. Assets
/// whose supply read fails are logged and left out.
pub async fn fetch_total_supply_in_usd<C: ChainReader>(
    reader: &C,
    assets: &[Asset],
    price_map: &HashMap<String, f64>,
) -> Vec<AssetTvl> {
    let mut result = Vec::with_capacity(assets.len());

    for asset in assets {
        let raw_supply = match reader.total_supply(asset.a_token).await {
            Ok(supply) => supply,
            Err(e) => {
                error!("Error fetching supply for {}: {:#}", asset.symbol, e);
                continue;
            }
        };

        let price = price_map.get(&asset.symbol).copied().unwrap_or(0.0);
        let tvl_usd = math_helper::divide_by_precision_f64(raw_supply, asset.decimals) * price;
        info!("{} TVL: ${:.2}", asset.symbol, tvl_usd);

        result.push(AssetTvl {
            symbol: asset.symbol.clone(),
            raw_supply: raw_supply.to_string(),
            decimals: asset.decimals,
            price,
            tvl_usd,
            updated_at: now_rfc3339(),
        });
    }

    result
}

/// Reads the emission schedule of the first reward token configured for
/// each asset's virtual reward token. Assets without one are skipped.
pub async fn fetch_emission_stats<C: ChainReader>(
    reader: &C,
    assets: &[Asset],
) -> HashMap<String, EmissionStats> {
    let mut results = HashMap::new();

    for asset in assets {
        let Some(reward_asset) = asset.virtual_reward_token else {
            info!("{}: no virtual reward token defined, skipping", asset.symbol);
            continue;
        };

        let reward_tokens = match reader.reward_tokens(reward_asset).await {
            Ok(tokens) => tokens,
            Err(e) => {
                error!("Failed to fetch emission for {}: {:#}", asset.symbol, e);
                continue;
            }
        };
        let Some(reward_token) = reward_tokens.first().copied() else {
            info!("{}: no reward tokens found", asset.symbol);
            continue;
        };

        let schedule = match reader.emission_schedule(reward_asset, reward_token).await {
            Ok(schedule) => schedule,
            Err(e) => {
                error!("Failed to fetch emission for {}: {:#}", asset.symbol, e);
                continue;
            }
        };

        let emission_end = DateTime::from_timestamp(schedule.end_time as i64, 0)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default();
        info!(
            "{}: emission {} until {}",
            asset.symbol, schedule.emission_per_second, emission_end
        );

        results.insert(
            asset.symbol.clone(),
            EmissionStats {
                reward_token: format!("{reward_token:#x}"),
                emission_per_second: schedule.emission_per_second.to_string(),
                emission_end,
            },
        );
    }

    results
}

/// Values each asset's virtual reward token supply, yielding the
/// subscriber-side TVL.
pub async fn fetch_virtual_tvls<C: ChainReader>(
    reader: &C,
    assets: &[Asset],
    price_map: &HashMap<String, f64>,
) -> HashMap<String, VirtualTvl> {
    let mut result = HashMap::new();

    for asset in assets {
        let Some(reward_token) = asset.virtual_reward_token else {
            continue;
        };

        let raw_supply = match reader.total_supply(reward_token).await {
            Ok(supply) => supply,
            Err(e) => {
                error!("Failed to fetch virtual TVL for {}: {:#}", asset.symbol, e);
                continue;
            }
        };

        let price = price_map.get(&asset.symbol).copied().unwrap_or(0.0);
        let tvl_subs_usd = math_helper::divide_by_precision_f64(raw_supply, asset.decimals) * price;
        info!("{} subscriber TVL: ${:.2}", asset.symbol, tvl_subs_usd);

        result.insert(
            asset.symbol.clone(),
            VirtualTvl {
                tvl_subs_usd,
                tvl_subs_raw: raw_supply.to_string(),
            },
        );
    }

    result
}

/// Joins the TVL rows with emission, virtual TVL and holder data into the
/// final report. `tvl_subs_pct` is derived when both TVL sides are known
/// and positive.
pub fn combine(
    tvl_data: Vec<AssetTvl>,
    mut emission_data: HashMap<String, EmissionStats>,
    mut virtual_tvl_map: HashMap<String, VirtualTvl>,
    holder_data: &HashMap<String, AssetHolders>,
) -> Vec<CombinedAssetStats> {
    tvl_data
        .into_iter()
        .map(|tvl| {
            let emission = emission_data.remove(&tvl.symbol);
            let virtual_tvl = virtual_tvl_map.remove(&tvl.symbol);
            let primary = holder_data
                .get(&tvl.symbol)
                .and_then(|holders| holders.primary.as_ref());

            let tvl_subs_pct = virtual_tvl.as_ref().and_then(|virtual_tvl| {
                (tvl.tvl_usd > 0.0 && virtual_tvl.tvl_subs_usd > 0.0)
                    .then(|| virtual_tvl.tvl_subs_usd / tvl.tvl_usd * 100.0)
            });

            CombinedAssetStats {
                tvl,
                emission,
                virtual_tvl,
                holder_count: primary.map(|outcome| outcome.holder_count),
                holders: primary.map(|outcome| outcome.holders.clone()),
                tvl_subs_pct,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, U256};
    use chain_client::EmissionSchedule;

    use super::*;
    use crate::holders_indexer::BuildOutcome;
    use crate::test_support::{test_asset, MockChainReader};

    fn tvl(symbol: &str, tvl_usd: f64) -> AssetTvl {
        AssetTvl {
            symbol: symbol.to_string(),
            raw_supply: "1000000".to_string(),
            decimals: 6,
            price: 1.0,
            tvl_usd,
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn subscriber_percentage_requires_both_sides() {
        let virtual_tvls = HashMap::from([
            (
                "USDT".to_string(),
                VirtualTvl {
                    tvl_subs_usd: 25.0,
                    tvl_subs_raw: "25000000".to_string(),
                },
            ),
            (
                "WCORE".to_string(),
                VirtualTvl {
                    tvl_subs_usd: 0.0,
                    tvl_subs_raw: "0".to_string(),
                },
            ),
        ]);

        let combined = combine(
            vec![tvl("USDT", 100.0), tvl("WCORE", 100.0)],
            HashMap::new(),
            virtual_tvls,
            &HashMap::new(),
        );

        assert_eq!(combined[0].tvl_subs_pct, Some(25.0));
        assert_eq!(combined[1].tvl_subs_pct, None);
    }

    #[test]
    fn combined_rows_flatten_into_one_object() {
        let emission = HashMap::from([(
            "USDT".to_string(),
            EmissionStats {
                reward_token: "0x00000000000000000000000000000000000000aa".to_string(),
                emission_per_second: "1000".to_string(),
                emission_end: "2026-12-31T00:00:00.000Z".to_string(),
            },
        )]);
        let virtual_tvls = HashMap::from([(
            "USDT".to_string(),
            VirtualTvl {
                tvl_subs_usd: 50.0,
                tvl_subs_raw: "50000000".to_string(),
            },
        )]);
        let holders = HashMap::from([(
            "USDT".to_string(),
            AssetHolders {
                primary: Some(BuildOutcome {
                    holder_count: 2,
                    skipped_ranges: 0,
                    holders: BTreeMap::from([(
                        "0x0000000000000000000000000000000000000001".to_string(),
                        HolderRecord::Valued {
                            raw: "1000000".to_string(),
                            usd: 1.0,
                        },
                    )]),
                }),
                reward: None,
            },
        )]);

        let combined = combine(vec![tvl("USDT", 100.0)], emission, virtual_tvls, &holders);
        let value = serde_json::to_value(&combined[0]).unwrap();

        assert_eq!(value["symbol"], "USDT");
        assert_eq!(value["tvlUSD"], 100.0);
        assert_eq!(value["emissionPerSecond"], "1000");
        assert_eq!(value["tvlSubsUSD"], 50.0);
        assert_eq!(value["holderCount"], 2);
        assert_eq!(value["tvlSubsPct"], 50.0);
        assert!(value["holders"].is_object());
    }

    #[tokio::test]
    async fn total_supply_rows_skip_assets_whose_read_fails() {
        let good = Address::with_last_byte(1);
        let bad = Address::with_last_byte(2);
        let mut reader = MockChainReader::new(100);
        // 6 decimals at $1.50: 5_000_000 raw = $7.50. No scripted supply
        // for the second token, so its read fails.
        reader.supplies.insert(good, U256::from(5_000_000u64));

        let assets = vec![
            test_asset("USDT", 6, good, 0),
            test_asset("WCORE", 18, bad, 0),
        ];
        let price_map = HashMap::from([
            ("USDT".to_string(), 1.5),
            ("WCORE".to_string(), 2.0),
        ]);

        let rows = fetch_total_supply_in_usd(&reader, &assets, &price_map).await;

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "USDT");
        assert_eq!(rows[0].raw_supply, "5000000");
        assert_eq!(rows[0].price, 1.5);
        assert_eq!(rows[0].tvl_usd, 7.5);
    }

    #[tokio::test]
    async fn missing_price_yields_zero_tvl() {
        let token = Address::with_last_byte(1);
        let mut reader = MockChainReader::new(100);
        reader.supplies.insert(token, U256::from(5_000_000u64));

        let rows = fetch_total_supply_in_usd(
            &reader,
            &[test_asset("USDT", 6, token, 0)],
            &HashMap::new(),
        )
        .await;

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price, 0.0);
        assert_eq!(rows[0].tvl_usd, 0.0);
    }

    #[tokio::test]
    async fn emission_stats_cover_only_assets_with_schedules() {
        let scheduled = Address::with_last_byte(3);
        let reward = Address::with_last_byte(4);
        let unscheduled = Address::with_last_byte(5);
        let another_reward = Address::with_last_byte(6);

        let mut reader = MockChainReader::new(100);
        reader.reward_tokens.insert(scheduled, vec![reward]);
        reader.schedules.insert(
            (scheduled, reward),
            EmissionSchedule {
                emission_per_second: U256::from(1000u64),
                // 2026-01-01T00:00:00Z
                end_time: 1_767_225_600,
            },
        );
        // Reward token known, but the schedule read fails.
        reader
            .reward_tokens
            .insert(unscheduled, vec![another_reward]);

        let mut with_schedule = test_asset("USDT", 6, Address::with_last_byte(1), 0);
        with_schedule.virtual_reward_token = Some(scheduled);
        let mut without_schedule = test_asset("WCORE", 18, Address::with_last_byte(2), 0);
        without_schedule.virtual_reward_token = Some(unscheduled);
        let no_reward_token = test_asset("USDC", 6, Address::with_last_byte(7), 0);

        let stats = fetch_emission_stats(
            &reader,
            &[with_schedule, without_schedule, no_reward_token],
        )
        .await;

        assert_eq!(stats.len(), 1);
        let usdt = &stats["USDT"];
        assert_eq!(usdt.reward_token, format!("{reward:#x}"));
        assert_eq!(usdt.emission_per_second, "1000");
        assert_eq!(usdt.emission_end, "2026-01-01T00:00:00.000Z");
    }

    #[tokio::test]
    async fn virtual_tvls_value_reward_supply_at_the_asset_price() {
        let virtual_token = Address::with_last_byte(3);
        let failing_token = Address::with_last_byte(4);
        let mut reader = MockChainReader::new(100);
        reader.supplies.insert(virtual_token, U256::from(2_000_000u64));

        let mut tracked = test_asset("USDT", 6, Address::with_last_byte(1), 0);
        tracked.virtual_reward_token = Some(virtual_token);
        let mut failing = test_asset("WCORE", 18, Address::with_last_byte(2), 0);
        failing.virtual_reward_token = Some(failing_token);
        let untracked = test_asset("USDC", 6, Address::with_last_byte(5), 0);

        let price_map = HashMap::from([
            ("USDT".to_string(), 1.5),
            ("WCORE".to_string(), 2.0),
        ]);

        let tvls = fetch_virtual_tvls(&reader, &[tracked, failing, untracked], &price_map).await;

        assert_eq!(tvls.len(), 1);
        assert_eq!(tvls["USDT"].tvl_subs_usd, 3.0);
        assert_eq!(tvls["USDT"].tvl_subs_raw, "2000000");
    }

    #[test]
    fn assets_without_extras_serialize_without_their_keys() {
        let combined = combine(
            vec![tvl("USDT", 100.0)],
            HashMap::new(),
            HashMap::new(),
            &HashMap::new(),
        );
        let value = serde_json::to_value(&combined[0]).unwrap();

        assert!(value.get("emissionPerSecond").is_none());
        assert!(value.get("tvlSubsUSD").is_none());
        assert!(value.get("holderCount").is_none());
        assert_eq!(value["tvlSubsPct"], serde_json::Value::Null);
    }
}
