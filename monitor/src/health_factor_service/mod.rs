use std::collections::BTreeMap;
use std::path::Path;

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chain_client::{contracts::ILendingPool, AggregateCall, ChainReader};
use snapshot_store::{persist, SnapshotStore, TokenRole};
use tracing::{debug, error, info, instrument, warn};

use crate::utils::{
    constants::{
        ALERT_MIN_DEBT_USD, HEALTH_FACTOR_DECIMALS, LIQUIDATION_THRESHOLD, USD_VALUE_DECIMALS,
    },
    math_helper,
};

pub mod models;

pub use models::{AccountHealth, RiskStatus};

/// Receiver for at-risk position alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, text: &str) -> Result<()>;
}

/// Account data decoded from one pool response.
#[derive(Debug, Clone)]
struct DecodedAccount {
    address: String,
    health_factor: f64,
    collateral_usd: f64,
    debt_usd: f64,
}

/// Evaluates lending-pool health factors for every account that holds
/// enough deposits across the tracked snapshots, raising alerts for
/// liquidatable positions and persisting the full report.
pub struct HealthCheck<'a, C, S> {
    reader: &'a C,
    store: &'a S,
    pool_address: Address,
    batch_size: usize,
    min_deposit_usd: f64,
}

impl<'a, C: ChainReader, S: SnapshotStore> HealthCheck<'a, C, S> {
    pub fn new(
        reader: &'a C,
        store: &'a S,
        pool_address: Address,
        batch_size: usize,
        min_deposit_usd: f64,
    ) -> Self {
        Self {
            reader,
            store,
            pool_address,
            batch_size: batch_size.max(1),
            min_deposit_usd,
        }
    }

    /// Runs one full evaluation pass and writes the report to
    /// `output_path`. Failed batches are logged and skipped; the report
    /// covers whatever decoded successfully.
    #[instrument("HEALTH_CHECK", skip_all)]
    pub async fn run(
        &self,
        alerts: &dyn AlertSink,
        output_path: &Path,
    ) -> Result<BTreeMap<String, AccountHealth>> {
        let accounts = eligible_accounts(self.store, self.min_deposit_usd)?;
        let batch_count = accounts.len().div_ceil(self.batch_size);
        info!(
            "Checking {} accounts in {} batches of up to {}",
            accounts.len(),
            batch_count,
            self.batch_size
        );

        let mut report = BTreeMap::new();
        let mut at_risk = 0usize;

        for (index, batch) in accounts.chunks(self.batch_size).enumerate() {
            let decoded = match self.evaluate_batch(batch).await {
                Ok(decoded) => decoded,
                Err(e) => {
                    error!(
                        "Batch {}/{} failed, skipping {} accounts: {:#}",
                        index + 1,
                        batch_count,
                        batch.len(),
                        e
                    );
                    continue;
                }
            };

            for account in decoded {
                if should_alert(&account) {
                    at_risk += 1;
                    warn!(
                        "Account {} is liquidatable: health factor {:.4}, debt ${:.2}",
                        account.address, account.health_factor, account.debt_usd
                    );
                    if let Err(e) = alerts.notify(&alert_text(&account)).await {
                        error!("Failed to send alert for {}: {:#}", account.address, e);
                    }
                }
                report.insert(account.address.clone(), classify(&account));
            }
        }

        let serialized =
            serde_json::to_string_pretty(&report).context("Failed to serialize health report")?;
        persist::write_with_backup(output_path, &serialized)
            .context("Failed to persist health report")?;
        info!(
            "Health report written: {} accounts, {} at risk",
            report.len(),
            at_risk
        );

        Ok(report)
    }

    /// Bundles one `getUserAccountData` call per address into a single
    /// aggregated read. Addresses whose response fails to decode are
    /// dropped without affecting the rest of the batch.
    async fn evaluate_batch(&self, addresses: &[String]) -> Result<Vec<DecodedAccount>> {
        let mut users = Vec::with_capacity(addresses.len());
        let mut calls = Vec::with_capacity(addresses.len());

        for addr in addresses {
            let user: Address = addr
                .parse()
                .with_context(|| format!("Invalid account address {addr}"))?;
            users.push(addr.clone());
            calls.push(AggregateCall {
                target: self.pool_address,
                call_data: ILendingPool::getUserAccountDataCall { user }
                    .abi_encode()
                    .into(),
            });
        }

        let returns = self.reader.aggregate(calls).await?;

        let mut decoded = Vec::with_capacity(returns.len());
        for (address, bytes) in users.into_iter().zip(returns) {
            match decode_account_data(&bytes) {
                Ok((health_factor, collateral_usd, debt_usd)) => decoded.push(DecodedAccount {
                    address,
                    health_factor,
                    collateral_usd,
                    debt_usd,
                }),
                Err(e) => debug!("Dropping {}: undecodable account data: {:#}", address, e),
            }
        }

        Ok(decoded)
    }
}

/// Collects every account whose summed deposit value across the primary
/// snapshots meets `min_deposit_usd`. Only canonical snapshot files are
/// read, never their timestamped backups.
fn eligible_accounts<S: SnapshotStore>(store: &S, min_deposit_usd: f64) -> Result<Vec<String>> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();

    for label in store.list_labels(TokenRole::Primary.label_prefix())? {
        let Some(snapshot) = store.load(&label)? else {
            continue;
        };
        for (address, record) in &snapshot.holders {
            *totals.entry(address.to_lowercase()).or_insert(0.0) += record.usd();
        }
    }

    Ok(totals
        .into_iter()
        .filter(|(_, usd)| *usd >= min_deposit_usd)
        .map(|(address, _)| address)
        .collect())
}

/// Decodes the six-field `getUserAccountData` return into
/// (health factor, collateral USD, debt USD) floats.
fn decode_account_data(bytes: &Bytes) -> Result<(f64, f64, f64)> {
    let data = ILendingPool::getUserAccountDataCall::abi_decode_returns(bytes, false)
        .context("Failed to decode getUserAccountData returns")?;

    Ok((
        math_helper::divide_by_precision_f64(data.healthFactor, HEALTH_FACTOR_DECIMALS),
        math_helper::divide_by_precision_f64(data.totalCollateralBase, USD_VALUE_DECIMALS),
        math_helper::divide_by_precision_f64(data.totalDebtBase, USD_VALUE_DECIMALS),
    ))
}

/// An account alerts only when it is both liquidatable and carries enough
/// debt to be worth acting on.
fn should_alert(account: &DecodedAccount) -> bool {
    account.health_factor < LIQUIDATION_THRESHOLD && account.debt_usd >= ALERT_MIN_DEBT_USD
}

fn classify(account: &DecodedAccount) -> AccountHealth {
    let status = if account.health_factor < LIQUIDATION_THRESHOLD {
        RiskStatus::AtRisk
    } else {
        RiskStatus::Safe
    };

    AccountHealth {
        health_factor: format!("{:.4}", account.health_factor),
        collateral_usd: format!("{:.2}", account.collateral_usd),
        debt_usd: format!("{:.2}", account.debt_usd),
        status,
    }
}

fn alert_text(account: &DecodedAccount) -> String {
    format!(
        "⚠️ *Health Alert*: User [{address}](https://coredao.xyz/address/{address}) has health factor `{hf:.4}`",
        address = account.address,
        hf = account.health_factor,
    )
}
