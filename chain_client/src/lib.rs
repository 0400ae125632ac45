pub mod contracts;
pub mod multicall;

use alloy::{
    network::Ethereum,
    primitives::{Address, Bytes, U256},
    providers::{Provider, ProviderBuilder},
    rpc::{client::RpcClient, types::Filter},
    sol_types::SolEvent,
    transports::{http::reqwest::Url, layers::RetryBackoffLayer},
};
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::contracts::{IERC20, IRewardsController};

/// One decoded ERC-20 `Transfer` event.
#[derive(Debug, Clone)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

/// A single pre-encoded read bundled into a multicall round trip.
#[derive(Debug, Clone)]
pub struct AggregateCall {
    pub target: Address,
    pub call_data: Bytes,
}

/// Reward emission parameters for one (asset, reward) pair.
#[derive(Debug, Clone)]
pub struct EmissionSchedule {
    pub emission_per_second: U256,
    /// Unix timestamp at which the emission program ends.
    pub end_time: u64,
}

/// Read-only chain access consumed by the indexer and the health evaluator.
///
/// Every method maps to one network round trip; callers decide how failures
/// are contained. Implemented over a live RPC provider in production and
/// mocked in tests.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn latest_block_number(&self) -> Result<u64>;

    /// Fetches `Transfer` events for `token` in the inclusive block range.
    /// May fail for the whole range.
    async fn transfer_logs(
        &self,
        token: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TransferEvent>>;

    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256>;

    async fn total_supply(&self, token: Address) -> Result<U256>;

    /// Bundles `calls` into one round trip; results come back in input
    /// order. A failure here fails every call in the bundle.
    async fn aggregate(&self, calls: Vec<AggregateCall>) -> Result<Vec<Bytes>>;

    /// Reward tokens currently configured for `asset` on the rewards
    /// controller.
    async fn reward_tokens(&self, asset: Address) -> Result<Vec<Address>>;

    async fn emission_schedule(&self, asset: Address, reward: Address)
        -> Result<EmissionSchedule>;
}

/// Creates an HTTP provider with retry backoff for RPC interactions.
///
/// # Arguments
/// * `rpc_url` - HTTP endpoint of the remote node
///
/// # Returns
/// * `Result<impl Provider<Ethereum>>` - The provider instance or an error
pub fn build_provider(rpc_url: &str) -> Result<impl Provider<Ethereum>> {
    let retry_layer = RetryBackoffLayer::new(10, 1000, 10000);

    let client = RpcClient::builder()
        .layer(retry_layer)
        .http(Url::parse(rpc_url)?);

    Ok(ProviderBuilder::new().on_client(client))
}

/// [`ChainReader`] backed by a live RPC provider.
pub struct RpcChainReader<P> {
    provider: P,
    rewards_controller: Address,
}

impl<P: Provider<Ethereum>> RpcChainReader<P> {
    pub fn new(provider: P, rewards_controller: Address) -> Self {
        Self {
            provider,
            rewards_controller,
        }
    }
}

#[async_trait]
impl<P: Provider<Ethereum>> ChainReader for RpcChainReader<P> {
    async fn latest_block_number(&self) -> Result<u64> {
        self.provider.get_block_number().await.map_err(Into::into)
    }

    async fn transfer_logs(
        &self,
        token: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TransferEvent>> {
        let filter = Filter::new()
            .address(token)
            .event_signature(IERC20::Transfer::SIGNATURE_HASH)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self.provider.get_logs(&filter).await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            match IERC20::Transfer::decode_log(&log.inner, false) {
                Ok(transfer) => events.push(TransferEvent {
                    from: transfer.data.from,
                    to: transfer.data.to,
                    value: transfer.data.value,
                }),
                Err(e) => debug!("Skipping undecodable transfer log: {}", e),
            }
        }

        Ok(events)
    }

    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256> {
        let contract = IERC20::new(token, &self.provider);
        Ok(contract.balanceOf(holder).call().await?._0)
    }

    async fn total_supply(&self, token: Address) -> Result<U256> {
        let contract = IERC20::new(token, &self.provider);
        Ok(contract.totalSupply().call().await?._0)
    }

    async fn aggregate(&self, calls: Vec<AggregateCall>) -> Result<Vec<Bytes>> {
        multicall::aggregate_reads(&self.provider, &calls).await
    }

    async fn reward_tokens(&self, asset: Address) -> Result<Vec<Address>> {
        let controller = IRewardsController::new(self.rewards_controller, &self.provider);
        Ok(controller.getRewardsByAsset(asset).call().await?._0)
    }

    async fn emission_schedule(
        &self,
        asset: Address,
        reward: Address,
    ) -> Result<EmissionSchedule> {
        let controller = IRewardsController::new(self.rewards_controller, &self.provider);
        let data = controller.getRewardsData(asset, reward).call().await?;

        Ok(EmissionSchedule {
            emission_per_second: data.emissionPerSecond,
            end_time: u64::try_from(data.endTime).unwrap_or(u64::MAX),
        })
    }
}
