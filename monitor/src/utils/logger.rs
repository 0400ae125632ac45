use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::Layer as FmtLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::load_env_var_opt;

/// Setup logger configuration for the monitor
///
/// Console output honors `RUST_LOG` and defaults to INFO. With
/// `LOG_INSIDE_FILE=true`, three daily-rotated streams are also written
/// under the log directory (`LOG_DIR`, default `.logs`):
/// - `monitor.*` for all levels
/// - `monitor.warn.*` for warnings and above
/// - `monitor.error.*` for errors only
pub fn setup_logger() -> Result<()> {
    let log_inside_file: bool = std::env::var("LOG_INSIDE_FILE")
        .unwrap_or("false".to_string())
        .parse()
        .unwrap_or(false);

    // Default to INFO when RUST_LOG is not set
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = FmtLayer::new()
        .with_line_number(false)
        .with_target(false)
        .with_thread_ids(false);

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if log_inside_file {
        let dir = log_dir();

        let file_layer = FmtLayer::new()
            .with_writer(rolling(&dir, "monitor")?)
            .with_ansi(false)
            .with_thread_ids(false);

        let warn_layer = FmtLayer::new()
            .with_writer(rolling(&dir, "monitor.warn")?)
            .with_ansi(false)
            .with_thread_ids(false)
            .with_filter(EnvFilter::new("warn"));

        let error_layer = FmtLayer::new()
            .with_writer(rolling(&dir, "monitor.error")?)
            .with_ansi(false)
            .with_thread_ids(false)
            .with_filter(EnvFilter::new("error"));

        registry
            .with(file_layer)
            .with(warn_layer)
            .with(error_layer)
            .init();
    } else {
        registry.init();
    }

    Ok(())
}

/// Log directory, `.logs` unless overridden with `LOG_DIR`.
fn log_dir() -> PathBuf {
    load_env_var_opt("LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".logs"))
}

fn rolling(dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(dir)
        .with_context(|| format!("Failed to create {prefix} log appender"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_dir_prefers_the_environment() {
        std::env::remove_var("LOG_DIR");
        assert_eq!(log_dir(), PathBuf::from(".logs"));

        std::env::set_var("LOG_DIR", "/var/log/monitor");
        assert_eq!(log_dir(), PathBuf::from("/var/log/monitor"));
        std::env::remove_var("LOG_DIR");
    }
}
