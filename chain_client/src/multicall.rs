use alloy::{
    network::Ethereum,
    primitives::{Address, Bytes},
    providers::Provider,
};
use anyhow::Result;

use crate::{contracts::IMulticall3, AggregateCall};

/// Canonical Multicall3 deployment, same address on every supported chain.
pub const MULTICALL_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

/// Executes a set of independent read calls as one `aggregate` round trip.
///
/// The strict `aggregate` variant is used: a revert in any bundled call
/// fails the whole trip, which callers treat as a skipped batch.
pub async fn aggregate_reads<P: Provider<Ethereum>>(
    provider: P,
    calls: &[AggregateCall],
) -> Result<Vec<Bytes>> {
    let multicall = IMulticall3::new(MULTICALL_ADDRESS.parse::<Address>()?, provider);

    let bundled = calls
        .iter()
        .map(|call| IMulticall3::Call {
            target: call.target,
            callData: call.call_data.clone(),
        })
        .collect::<Vec<_>>();

    let result = multicall.aggregate(bundled).call().await?;
    Ok(result.returnData)
}
