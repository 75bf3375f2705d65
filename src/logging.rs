/*!
 * Logging and tracing initialization
 */

use std::fs::File;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::config::SyncConfig;
use crate::error::{Result, ShardError};

/// Initialize structured logging based on configuration
///
/// Logs go to stderr in a compact format, or to `config.log_file` as JSON
/// lines when set. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &SyncConfig) -> Result<()> {
    let log_level = if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("shard={}", log_level)))
        .map_err(|e| ShardError::Config(format!("Failed to create log filter: {}", e)))?;

    match config.log_file {
        Some(ref log_path) => {
            let file = File::create(log_path)
                .map_err(|e| ShardError::Config(format!("Failed to create log file: {}", e)))?;
            let fmt_layer = fmt::layer()
                .with_writer(Arc::new(file))
                .with_target(true)
                .with_ansi(false)
                .json();
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
        }
        None => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact();
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
        }
    }

    Ok(())
}

#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shard=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    });
}
