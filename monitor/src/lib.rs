pub mod asset_stats;
pub mod config;
pub mod health_factor_service;
pub mod holders_indexer;
pub mod price_oracle;
pub mod publisher;
pub mod runner;
pub mod telegram;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;
