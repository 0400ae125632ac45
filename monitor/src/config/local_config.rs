use std::path::PathBuf;

use alloy::primitives::Address;
use anyhow::Result;

use super::env_helper::{load_env_var_opt, load_env_var_or};

/// Core chain public RPC endpoint, used when `RPC_URL` is not set.
const DEFAULT_RPC_URL: &str = "https://rpc.coredao.org";
/// Deployed lending pool exposing `getUserAccountData`.
const DEFAULT_POOL_ADDRESS: &str = "0x0CEa9F0F49F30d376390e480ba32f903B43B19C5";
/// Rewards controller tracking virtual-token emission schedules.
const DEFAULT_REWARDS_CONTROLLER: &str = "0xB80Fe8ECA48F4725009136f3AdA7e6a92935ba80";

/// Process-wide configuration, resolved once at startup and passed by
/// reference into each component.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub rpc_url: String,
    pub pool_address: Address,
    pub rewards_controller: Address,
    pub data_dir: PathBuf,
    pub assets_file: PathBuf,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl LocalConfig {
    pub fn load_from_env() -> Result<Self> {
        Ok(Self {
            rpc_url: load_env_var_or("RPC_URL", DEFAULT_RPC_URL)?,
            pool_address: load_env_var_or("POOL_ADDRESS", DEFAULT_POOL_ADDRESS)?,
            rewards_controller: load_env_var_or(
                "REWARDS_CONTROLLER",
                DEFAULT_REWARDS_CONTROLLER,
            )?,
            data_dir: load_env_var_or("DATA_DIR", "data")?,
            assets_file: load_env_var_or("ASSETS_FILE", "config/assets.json")?,
            telegram_bot_token: load_env_var_opt("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: load_env_var_opt("TELEGRAM_CHAT_ID"),
        })
    }

    /// Directory holding the per-token holder snapshots.
    pub fn holders_dir(&self) -> PathBuf {
        self.data_dir.join("holders")
    }

    pub fn health_output_path(&self) -> PathBuf {
        self.data_dir.join("user_health.json")
    }

    pub fn stats_output_path(&self) -> PathBuf {
        self.data_dir.join("asset_stats.json")
    }
}
