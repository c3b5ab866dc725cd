//! Configuration for the quote watcher.
//!
//! Configuration comes from two sources:
//! - Environment variables (via .env file or shell): endpoint overrides
//! - CLI arguments: what to quote and how often

use std::time::Duration;

use clap::Parser;
use ekubo_quoter_sdk::{Chain, address::ContractAddress, error::DexError, poller::PollerConfig};
use fastnum::{UD256, decimal::Context};

/// Environment configuration, every value overrides a chain default.
#[derive(Debug, Default, serde::Deserialize)]
pub struct EnvConfig {
    /// Quoter API base URL
    pub quoter_api_url: Option<String>,

    /// Router contract address
    pub router_address: Option<String>,

    /// Per-attempt request timeout (default: 10s)
    pub request_timeout_ms: Option<u64>,
}

impl EnvConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Applies the overrides to `chain`.
    pub fn apply(&self, mut chain: Chain) -> Result<Chain, ConfigError> {
        if let Some(api_url) = &self.quoter_api_url {
            url::Url::parse(api_url).map_err(|_| ConfigError::InvalidApiUrl(api_url.clone()))?;
            chain = chain.with_api_url(api_url.as_str());
        }
        if let Some(router) = &self.router_address {
            let address: ContractAddress = router
                .parse()
                .map_err(|_| ConfigError::InvalidRouter(router.clone()))?;
            chain = chain.with_router(address);
        }
        Ok(chain)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// CLI arguments of the quote watcher.
#[derive(Debug, Parser)]
#[command(name = "quote-watch")]
#[command(about = "Polls Ekubo swap quotes and prints the calls executing them")]
pub struct CliConfig {
    /// Chain name or id (mainnet, sepolia, 0x534e5f4d41494e)
    #[arg(long, default_value = "mainnet")]
    pub chain: String,

    /// Token to sell, symbol or address
    #[arg(long)]
    pub sell: String,

    /// Token to buy, symbol or address
    #[arg(long)]
    pub buy: String,

    /// Human-readable amount (e.g., 1.5) of the sell token, or of the buy
    /// token with --exact-output
    #[arg(long)]
    pub amount: String,

    /// Slippage tolerance in percent
    #[arg(long, default_value_t = 1)]
    pub slippage: u32,

    /// Delay between quote refreshes in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub interval_ms: u64,

    /// Consecutive failures after which polling stops
    #[arg(long, default_value_t = 5)]
    pub max_errors: u32,

    /// Treat the amount as the desired received amount
    #[arg(long)]
    pub exact_output: bool,

    /// Decimals of the amount token, required for tokens unknown to the
    /// built-in registry
    #[arg(long)]
    pub decimals: Option<u8>,
}

/// Validated watcher configuration.
#[derive(Clone, Debug)]
pub struct WatchConfig {
    pub chain: Chain,
    pub sell: String,
    pub buy: String,
    pub amount: UD256,
    pub decimals: Option<u8>,
    pub slippage_percent: u32,
    pub exact_output: bool,
    pub poller: PollerConfig,
}

impl CliConfig {
    /// Convert CLI arguments to the validated watcher config.
    pub fn to_watch_config(&self) -> Result<WatchConfig, ConfigError> {
        let chain = Chain::from_selector(&self.chain)?;

        let amount = UD256::from_str(self.amount.trim(), Context::default())
            .map_err(|_| ConfigError::InvalidAmount(self.amount.clone()))?;
        if amount == UD256::ZERO {
            return Err(ConfigError::InvalidAmount(self.amount.clone()));
        }

        if self.slippage > 100 {
            return Err(ConfigError::InvalidSlippage(self.slippage));
        }

        if self.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        if self.sell.trim().eq_ignore_ascii_case(self.buy.trim()) {
            return Err(ConfigError::SameToken);
        }

        Ok(WatchConfig {
            chain,
            sell: self.sell.trim().to_string(),
            buy: self.buy.trim().to_string(),
            amount,
            decimals: self.decimals,
            slippage_percent: self.slippage,
            exact_output: self.exact_output,
            poller: PollerConfig::new(Duration::from_millis(self.interval_ms), self.max_errors),
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid chain: {0}")]
    Chain(#[from] DexError),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Slippage must be at most 100 percent, got {0}")]
    InvalidSlippage(u32),

    #[error("interval_ms cannot be zero")]
    ZeroInterval,

    #[error("Sell and buy token must differ")]
    SameToken,

    #[error("Invalid quoter API URL: {0}")]
    InvalidApiUrl(String),

    #[error("Invalid router address: {0}")]
    InvalidRouter(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli() -> CliConfig {
        CliConfig {
            chain: "mainnet".to_string(),
            sell: "ETH".to_string(),
            buy: "USDC".to_string(),
            amount: "1.5".to_string(),
            slippage: 1,
            interval_ms: 5000,
            max_errors: 3,
            exact_output: false,
            decimals: None,
        }
    }

    #[test]
    fn test_cli_config_to_watch_config() {
        let config = cli().to_watch_config().unwrap();
        assert_eq!(config.chain, Chain::mainnet());
        assert_eq!(config.amount, UD256::from_str("1.5", Context::default()).unwrap());
        assert_eq!(config.poller.interval, Duration::from_secs(5));
        assert_eq!(config.poller.error_threshold, 3);
        assert!(!config.exact_output);
    }

    #[test]
    fn test_invalid_values() {
        let mut cli = cli();
        cli.chain = "goerli".to_string();
        assert!(matches!(cli.to_watch_config(), Err(ConfigError::Chain(_))));

        let mut cli = self::cli();
        cli.amount = "0".to_string();
        assert!(matches!(cli.to_watch_config(), Err(ConfigError::InvalidAmount(_))));

        let mut cli = self::cli();
        cli.amount = "-1".to_string();
        assert!(matches!(cli.to_watch_config(), Err(ConfigError::InvalidAmount(_))));

        let mut cli = self::cli();
        cli.slippage = 101;
        assert!(matches!(cli.to_watch_config(), Err(ConfigError::InvalidSlippage(101))));

        let mut cli = self::cli();
        cli.interval_ms = 0;
        assert!(matches!(cli.to_watch_config(), Err(ConfigError::ZeroInterval)));

        let mut cli = self::cli();
        cli.buy = "eth".to_string();
        assert!(matches!(cli.to_watch_config(), Err(ConfigError::SameToken)));
    }

    #[test]
    fn test_env_overrides() {
        let env = EnvConfig {
            quoter_api_url: Some("http://localhost:4000".to_string()),
            router_address: Some("0x0123".to_string()),
            request_timeout_ms: Some(2500),
        };
        let chain = env.apply(Chain::sepolia()).unwrap();
        assert_eq!(chain.api_url(), "http://localhost:4000");
        assert_eq!(chain.router().to_string(), "0x123");
        assert_eq!(env.request_timeout(), Some(Duration::from_millis(2500)));

        let unchanged = EnvConfig::default().apply(Chain::sepolia()).unwrap();
        assert_eq!(unchanged, Chain::sepolia());

        let bad = EnvConfig {
            router_address: Some("router".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.apply(Chain::mainnet()), Err(ConfigError::InvalidRouter(_))));
    }
}
