use anyhow::{Context, Result};
use chain_client::{build_provider, ChainReader, RpcChainReader};
use snapshot_store::{persist, JsonFileStore, SnapshotStore};
use tracing::{error, info, instrument, warn};

use crate::{
    asset_stats, config::LocalConfig, health_factor_service::HealthCheck, holders_indexer,
    price_oracle::PriceOracle, publisher::GitPublisher, telegram::TelegramNotifier,
};

/// Batch size for the health check embedded in a full aggregation run.
/// The embedded pass reviews every account, so the deposit floor is zero.
const RUN_ONCE_HEALTH_BATCH_SIZE: usize = 200;

/// One full aggregation pass: prices, TVL, emissions, holder snapshots,
/// the combined report, a health review and finally publication.
#[instrument("RUN_ONCE", skip_all)]
pub async fn run_once(config: &LocalConfig) -> Result<()> {
    info!("Starting TVL, emission, holder and health aggregation");

    let assets = crate::config::Asset::load_all(&config.assets_file)?;
    let provider = build_provider(&config.rpc_url)?;
    let reader = RpcChainReader::new(provider, config.rewards_controller);
    let store = JsonFileStore::new(config.holders_dir())?;

    let price_map = PriceOracle::default().price_map(&assets).await;

    let tvl_data = asset_stats::fetch_total_supply_in_usd(&reader, &assets, &price_map).await;
    let emission_data = asset_stats::fetch_emission_stats(&reader, &assets).await;
    let virtual_tvl_map = asset_stats::fetch_virtual_tvls(&reader, &assets, &price_map).await;
    let holder_data = holders_indexer::build_all(&reader, &store, &assets, &price_map, true)
        .await
        .context("Holder snapshot pass failed")?;

    let combined = asset_stats::combine(tvl_data, emission_data, virtual_tvl_map, &holder_data);
    let serialized = serde_json::to_string_pretty(&combined)
        .context("Failed to serialize combined asset stats")?;
    let output_path = config.stats_output_path();
    let backup = persist::write_with_backup(&output_path, &serialized)
        .context("Failed to persist combined asset stats")?;
    info!("Combined data written to {}", output_path.display());
    info!("Snapshot saved to {}", backup.display());

    run_health_check(config, &reader, &store, RUN_ONCE_HEALTH_BATCH_SIZE, 0.0).await?;

    // Publication is best effort, a push failure never fails the run.
    match GitPublisher::from_env() {
        Ok(publisher) => {
            if let Err(e) = publisher.push(&config.data_dir) {
                error!("Git push failed: {:#}", e);
            }
        }
        Err(e) => warn!("Git publishing disabled: {:#}", e),
    }

    Ok(())
}

/// Standalone health review over the persisted snapshots.
pub async fn check_health(config: &LocalConfig, batch_size: usize, min_usd: f64) -> Result<()> {
    let provider = build_provider(&config.rpc_url)?;
    let reader = RpcChainReader::new(provider, config.rewards_controller);
    let store = JsonFileStore::new(config.holders_dir())?;

    run_health_check(config, &reader, &store, batch_size, min_usd).await
}

async fn run_health_check<C: ChainReader, S: SnapshotStore>(
    config: &LocalConfig,
    reader: &C,
    store: &S,
    batch_size: usize,
    min_usd: f64,
) -> Result<()> {
    let alerts = TelegramNotifier::from_config(config);
    let check = HealthCheck::new(reader, store, config.pool_address, batch_size, min_usd);
    check.run(&alerts, &config.health_output_path()).await?;
    Ok(())
}
