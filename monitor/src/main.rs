use anyhow::{Context, Result};
use monitor::{config::LocalConfig, runner, telegram::TelegramBot, utils};
use tracing::{error, info};

/// Batch size for the `check-health` subcommand when none is given.
const DEFAULT_HEALTH_BATCH_SIZE: usize = 100;
/// Deposit floor for the `check-health` subcommand when none is given.
const DEFAULT_HEALTH_MIN_USD: f64 = 10.0;

/// Main entry point for the holder and health monitor
///
/// Subcommands:
/// * `run-once` (default) - one full aggregation and health pass
/// * `check-health [batch_size] [min_usd]` - standalone health review
/// * `bot` - long-running Telegram command listener
#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    init_pre_run()?;

    let config = LocalConfig::load_from_env()?;
    let args = std::env::args().collect::<Vec<String>>();

    let result = match args.get(1).map(String::as_str) {
        None | Some("run-once") => {
            info!("Starting a single aggregation run");
            runner::run_once(&config).await
        }
        Some("check-health") => {
            let batch_size = args
                .get(2)
                .and_then(|arg| arg.parse().ok())
                .unwrap_or(DEFAULT_HEALTH_BATCH_SIZE);
            let min_usd = args
                .get(3)
                .and_then(|arg| arg.parse().ok())
                .unwrap_or(DEFAULT_HEALTH_MIN_USD);
            info!(
                "Starting a health review: batch size {}, deposit floor ${}",
                batch_size, min_usd
            );
            runner::check_health(&config, batch_size, min_usd).await
        }
        Some("bot") => {
            info!("Starting the Telegram bot");
            TelegramBot::new(config).run().await
        }
        Some(other) => {
            eprintln!("Unknown command: {other}");
            eprintln!("Usage: monitor [run-once | check-health [batch_size] [min_usd] | bot]");
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        let error_message = e
            .chain()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        error!("Monitor failed with error: {}", error_message);
        return Err(e);
    }

    Ok(())
}

/// Loads environment variables and sets up the logger. A missing `.env`
/// file is fine, the environment may already be populated.
fn init_pre_run() -> Result<()> {
    let _ = dotenvy::dotenv();
    utils::logger::setup_logger().context("Failed to setup logger")?;
    Ok(())
}
