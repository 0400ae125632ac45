use std::collections::{BTreeMap, HashMap};

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use chain_client::{ChainReader, TransferEvent};
use futures::{stream, StreamExt};
use snapshot_store::{HolderRecord, Snapshot, SnapshotStore, TokenRole};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    config::Asset,
    utils::{
        constants::{BALANCE_FETCH_CONCURRENCY, DUST_THRESHOLD_USD, LOG_CHUNK_SIZE},
        math_helper,
    },
};

/// Outcome of one snapshot build for a single token role.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub holder_count: usize,
    /// Log-range chunks that failed to fetch and were dropped for this run.
    /// Their events are lost; a non-zero count means the holder set may be
    /// drifting behind the chain.
    pub skipped_ranges: usize,
    pub holders: BTreeMap<String, HolderRecord>,
}

/// Holder results for one asset: primary token plus optional reward token.
#[derive(Debug, Clone, Default)]
pub struct AssetHolders {
    pub primary: Option<BuildOutcome>,
    pub reward: Option<BuildOutcome>,
}

/// Incrementally rebuilds per-token holder snapshots from transfer logs.
///
/// Each build resumes from the persisted cursor, merges newly seen
/// addresses, reconciles every tracked balance against the chain and prunes
/// holders that no longer qualify.
pub struct HolderSnapshotBuilder<'a, C, S> {
    reader: &'a C,
    store: &'a S,
    chunk_size: u64,
    balance_concurrency: usize,
}

impl<'a, C: ChainReader, S: SnapshotStore> HolderSnapshotBuilder<'a, C, S> {
    pub fn new(reader: &'a C, store: &'a S) -> Self {
        Self {
            reader,
            store,
            chunk_size: LOG_CHUNK_SIZE,
            balance_concurrency: BALANCE_FETCH_CONCURRENCY,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Builds and persists the snapshot for one (asset, role) pair.
    ///
    /// Individual chunk and balance failures are logged and tolerated; the
    /// only hard error besides persistence is an unreadable existing
    /// snapshot file, which aborts this pair.
    #[instrument("HOLDERS_INDEXER", skip_all, fields(label = %role.label(&asset.symbol)))]
    pub async fn build_token(
        &self,
        asset: &Asset,
        role: TokenRole,
        token: Address,
        latest_block: u64,
        price_map: &HashMap<String, f64>,
        with_usd: bool,
    ) -> Result<BuildOutcome> {
        let label = role.label(&asset.symbol);

        let mut snapshot = match self.store.load(&label)? {
            Some(snapshot) => {
                debug!(
                    "{}: loaded {} holders from cache",
                    label,
                    snapshot.holders.len()
                );
                snapshot
            }
            None => Snapshot::seeded_at(asset.origin_block),
        };

        let (events, skipped_ranges) = self
            .scan_transfers(token, snapshot.last_checked_block + 1, latest_block)
            .await;

        merge_participants(&mut snapshot, &events);

        let price = price_map.get(&asset.symbol).copied().unwrap_or(0.0);
        if with_usd && price <= 0.0 {
            warn!(
                "{}: no usable price for {}, every holder will fail the dust check",
                label, asset.symbol
            );
        }

        self.reconcile_balances(&mut snapshot, token, asset.decimals, price, with_usd)
            .await;

        // The cursor advances even past failed chunks, trading completeness
        // for forward progress. `skipped_ranges` makes the loss visible.
        snapshot.last_checked_block = latest_block;

        let backup = self
            .store
            .save(&label, &snapshot)
            .with_context(|| format!("Failed to persist snapshot {}", label))?;
        debug!("Snapshot saved to {}", backup.display());
        info!("{}: holder count = {}", label, snapshot.holders.len());

        Ok(BuildOutcome {
            holder_count: snapshot.holders.len(),
            skipped_ranges,
            holders: snapshot.holders,
        })
    }

    /// Fetches transfer events in fixed-width chunks, strictly ascending.
    /// Failed chunks are logged and counted, never retried.
    async fn scan_transfers(
        &self,
        token: Address,
        from_block: u64,
        to_block: u64,
    ) -> (Vec<TransferEvent>, usize) {
        let mut events = Vec::new();
        let mut skipped = 0;

        for (start, end) in chunk_ranges(from_block, to_block, self.chunk_size) {
            match self.reader.transfer_logs(token, start, end).await {
                Ok(chunk) => {
                    debug!(
                        "Fetched {} transfer logs from blocks {}-{}",
                        chunk.len(),
                        start,
                        end
                    );
                    events.extend(chunk);
                }
                Err(e) => {
                    error!("Failed to fetch logs for blocks {}-{}: {:#}", start, end, e);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!("{} log ranges skipped this run, their events are lost", skipped);
        }

        (events, skipped)
    }

    /// Refreshes every tracked balance with bounded concurrency, then keeps
    /// a holder only while its balance is positive and, in USD mode, worth
    /// at least the dust threshold. Failed reads count as a zero balance.
    async fn reconcile_balances(
        &self,
        snapshot: &mut Snapshot,
        token: Address,
        decimals: u8,
        price: f64,
        with_usd: bool,
    ) {
        let addresses: Vec<String> = snapshot.holders.keys().cloned().collect();
        debug!("Checking balances for {} addresses", addresses.len());

        let balances = stream::iter(addresses)
            .map(|addr| async move {
                let balance = match addr.parse::<Address>() {
                    Ok(parsed) => match self.reader.balance_of(token, parsed).await {
                        Ok(balance) => balance,
                        Err(e) => {
                            debug!("Balance fetch failed for {}, treating as zero: {:#}", addr, e);
                            U256::ZERO
                        }
                    },
                    Err(_) => U256::ZERO,
                };
                (addr, balance)
            })
            .buffered(self.balance_concurrency)
            .collect::<Vec<_>>()
            .await;

        for (addr, balance) in balances {
            let usd = if with_usd && price > 0.0 {
                Some(math_helper::divide_by_precision_f64(balance, decimals) * price)
            } else {
                None
            };

            let qualifies = balance > U256::ZERO
                && (!with_usd || usd.is_some_and(|usd| usd >= DUST_THRESHOLD_USD));

            if qualifies {
                let raw = balance.to_string();
                let record = match usd {
                    Some(usd) => HolderRecord::Valued { raw, usd },
                    None => HolderRecord::Raw(raw),
                };
                snapshot.holders.insert(addr, record);
            } else {
                snapshot.holders.remove(&addr);
            }
        }
    }
}

/// Rebuilds snapshots for every configured asset against one resolved
/// block height. Per-asset failures are logged and do not stop the
/// remaining assets.
pub async fn build_all<C: ChainReader, S: SnapshotStore>(
    reader: &C,
    store: &S,
    assets: &[Asset],
    price_map: &HashMap<String, f64>,
    with_usd: bool,
) -> Result<HashMap<String, AssetHolders>> {
    let latest_block = reader
        .latest_block_number()
        .await
        .context("Failed to resolve the latest block")?;

    let builder = HolderSnapshotBuilder::new(reader, store);
    let mut results = HashMap::new();

    for asset in assets {
        let mut holders = AssetHolders::default();

        match builder
            .build_token(
                asset,
                TokenRole::Primary,
                asset.a_token,
                latest_block,
                price_map,
                with_usd,
            )
            .await
        {
            Ok(outcome) => holders.primary = Some(outcome),
            Err(e) => {
                error!("Failed to process holders for {}: {:#}", asset.symbol, e);
                results.insert(asset.symbol.clone(), holders);
                continue;
            }
        }

        if let Some(reward_token) = asset.virtual_reward_token {
            match builder
                .build_token(
                    asset,
                    TokenRole::Reward,
                    reward_token,
                    latest_block,
                    price_map,
                    with_usd,
                )
                .await
            {
                Ok(outcome) => holders.reward = Some(outcome),
                Err(e) => error!(
                    "Failed to process reward holders for {}: {:#}",
                    asset.symbol, e
                ),
            }
        }

        results.insert(asset.symbol.clone(), holders);
    }

    Ok(results)
}

/// Adds every non-burn participant of `events` to the holder set with a
/// placeholder balance pending reconciliation.
fn merge_participants(snapshot: &mut Snapshot, events: &[TransferEvent]) {
    for event in events {
        for addr in [event.from, event.to] {
            if addr != Address::ZERO {
                snapshot
                    .holders
                    .entry(addr_key(&addr))
                    .or_insert_with(|| HolderRecord::Valued {
                        raw: "0".to_string(),
                        usd: 0.0,
                    });
            }
        }
    }
}

/// Lowercase hex key used for holder maps and file contents.
fn addr_key(addr: &Address) -> String {
    format!("{addr:#x}")
}

/// Splits the inclusive range `[from, to]` into consecutive sub-ranges of at
/// most `width` blocks. Empty when `from > to`.
fn chunk_ranges(from: u64, to: u64, width: u64) -> Vec<(u64, u64)> {
    let width = width.max(1);
    let mut ranges = Vec::new();
    let mut start = from;

    while start <= to {
        let end = to.min(start.saturating_add(width - 1));
        ranges.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }

    ranges
}
