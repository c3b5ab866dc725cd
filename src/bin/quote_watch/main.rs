//! Quote watcher for Ekubo swaps.
//!
//! This binary polls a swap quote and logs the calls that would execute
//! it, until interrupted.

mod config;
mod error;
mod watcher;

use clap::Parser;
use std::process::exit;
use tracing::error;

use config::{CliConfig, EnvConfig};
use watcher::QuoteWatcher;

#[tokio::main]
async fn main() {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    // Parse environment configuration
    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to parse environment configuration: {}", e);
            exit(1);
        }
    };

    // Parse CLI arguments
    let cli_config = CliConfig::parse();

    let mut watch_config = match cli_config.to_watch_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            exit(1);
        }
    };

    watch_config.chain = match env_config.apply(watch_config.chain) {
        Ok(chain) => chain,
        Err(e) => {
            eprintln!("Invalid environment configuration: {}", e);
            exit(1);
        }
    };

    // Set up logging
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let watcher = match QuoteWatcher::try_new(watch_config, env_config.request_timeout()) {
        Ok(watcher) => watcher,
        Err(e) => {
            eprintln!("Failed to create quote watcher: {}", e);
            exit(1);
        }
    };

    if let Err(e) = watcher.run().await {
        error!(%e, "Quote watcher encountered an error, shutting down");
        exit(1);
    }
}
