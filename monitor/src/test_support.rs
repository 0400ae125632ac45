use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use anyhow::{bail, Result};
use async_trait::async_trait;
use chain_client::{
    contracts::ILendingPool, AggregateCall, ChainReader, EmissionSchedule, TransferEvent,
};
use snapshot_store::JsonFileStore;

use crate::config::Asset;
use crate::health_factor_service::AlertSink;

/// Scripted `getUserAccountData` response for one account.
#[derive(Debug, Clone)]
pub struct AccountDataFixture {
    pub collateral_base: U256,
    pub debt_base: U256,
    pub health_factor: U256,
}

/// Scripted [`ChainReader`] for tests. Every read resolves against the
/// maps below; anything without a fixture fails, which exercises the
/// error-containment paths.
#[derive(Default)]
pub struct MockChainReader {
    pub latest_block: u64,
    pub transfers: HashMap<(u64, u64), Vec<TransferEvent>>,
    pub failing_ranges: HashSet<(u64, u64)>,
    pub balances: HashMap<Address, U256>,
    pub supplies: HashMap<Address, U256>,
    pub account_data: HashMap<Address, AccountDataFixture>,
    /// Accounts whose aggregate slot returns garbage bytes.
    pub undecodable: HashSet<Address>,
    /// Zero-based indices of aggregate calls that fail outright.
    pub failing_batches: HashSet<usize>,
    pub reward_tokens: HashMap<Address, Vec<Address>>,
    pub schedules: HashMap<(Address, Address), EmissionSchedule>,
    pub log_requests: Mutex<Vec<(u64, u64)>>,
    pub aggregate_sizes: Mutex<Vec<usize>>,
    batch_counter: AtomicUsize,
}

impl MockChainReader {
    pub fn new(latest_block: u64) -> Self {
        Self {
            latest_block,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn latest_block_number(&self) -> Result<u64> {
        Ok(self.latest_block)
    }

    async fn transfer_logs(
        &self,
        _token: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TransferEvent>> {
        self.log_requests
            .lock()
            .unwrap()
            .push((from_block, to_block));

        if self.failing_ranges.contains(&(from_block, to_block)) {
            bail!("scripted failure for range {from_block}-{to_block}");
        }

        Ok(self
            .transfers
            .get(&(from_block, to_block))
            .cloned()
            .unwrap_or_default())
    }

    async fn balance_of(&self, _token: Address, holder: Address) -> Result<U256> {
        match self.balances.get(&holder) {
            Some(balance) => Ok(*balance),
            None => bail!("no scripted balance for {holder}"),
        }
    }

    async fn total_supply(&self, token: Address) -> Result<U256> {
        match self.supplies.get(&token) {
            Some(supply) => Ok(*supply),
            None => bail!("no scripted supply for {token}"),
        }
    }

    async fn aggregate(&self, calls: Vec<AggregateCall>) -> Result<Vec<Bytes>> {
        let batch_index = self.batch_counter.fetch_add(1, Ordering::SeqCst);
        self.aggregate_sizes.lock().unwrap().push(calls.len());

        if self.failing_batches.contains(&batch_index) {
            bail!("scripted failure for batch {batch_index}");
        }

        let mut returns = Vec::with_capacity(calls.len());
        for call in &calls {
            let user = ILendingPool::getUserAccountDataCall::abi_decode(&call.call_data, false)?
                .user;

            let bytes = match self.account_data.get(&user) {
                Some(fixture) if !self.undecodable.contains(&user) => {
                    ILendingPool::getUserAccountDataCall::abi_encode_returns(&(
                        fixture.collateral_base,
                        fixture.debt_base,
                        U256::ZERO,
                        U256::ZERO,
                        U256::ZERO,
                        fixture.health_factor,
                    ))
                    .into()
                }
                _ => Bytes::from(vec![0xde, 0xad]),
            };
            returns.push(bytes);
        }

        Ok(returns)
    }

    async fn reward_tokens(&self, asset: Address) -> Result<Vec<Address>> {
        Ok(self.reward_tokens.get(&asset).cloned().unwrap_or_default())
    }

    async fn emission_schedule(
        &self,
        asset: Address,
        reward: Address,
    ) -> Result<EmissionSchedule> {
        match self.schedules.get(&(asset, reward)) {
            Some(schedule) => Ok(schedule.clone()),
            None => bail!("no scripted schedule for {asset}/{reward}"),
        }
    }
}

/// Alert sink that records every message, optionally failing each send.
#[derive(Default)]
pub struct MockAlertSink {
    pub sent: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl AlertSink for MockAlertSink {
    async fn notify(&self, text: &str) -> Result<()> {
        if self.fail {
            bail!("scripted alert delivery failure");
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Fresh file store under the system temp directory, namespaced per
/// process and test.
pub fn temp_store(tag: &str) -> (JsonFileStore, PathBuf) {
    let dir = std::env::temp_dir().join(format!("monitor_{}_{}", tag, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    (JsonFileStore::new(dir.clone()).unwrap(), dir)
}

pub fn test_asset(symbol: &str, decimals: u8, a_token: Address, origin_block: u64) -> Asset {
    Asset {
        symbol: symbol.to_string(),
        decimals,
        a_token,
        virtual_reward_token: None,
        coingecko_id: symbol.to_lowercase(),
        origin_block,
    }
}
