//! Quote watcher orchestration and event loop.
//!
//! Resolves the configured tokens, keeps the quote fresh with a
//! [`QuotePoller`] and logs the calls executing every refreshed quote.

use std::{sync::Arc, time::Duration};

use alloy::primitives::{I256, Sign, U256};
use ekubo_quoter_sdk::{
    client::QuoteClient,
    encode::{self, SwapParams},
    num::Converter,
    poller::{PollEvent, QuotePoller, StopReason},
    registry::{TokenInfo, TokenRegistry},
    types::{Quote, QuoteRequest},
};
use tracing::{debug, info, warn};

use crate::{
    config::WatchConfig,
    error::{Error, Result},
};

/// Quote watcher.
#[derive(Debug)]
pub struct QuoteWatcher {
    client: Arc<QuoteClient>,
    config: WatchConfig,
    request: QuoteRequest,
    sell: Option<TokenInfo>,
    buy: Option<TokenInfo>,
}

impl QuoteWatcher {
    /// Create a new quote watcher.
    pub fn try_new(config: WatchConfig, timeout: Option<Duration>) -> Result<Self> {
        let registry = TokenRegistry::for_chain(&config.chain);
        let sell_token = registry.resolve(&config.sell)?;
        let buy_token = registry.resolve(&config.buy)?;
        let sell = registry.by_address(sell_token);
        let buy = registry.by_address(buy_token);

        let (amount_token, amount_symbol) = if config.exact_output {
            (&buy, &config.buy)
        } else {
            (&sell, &config.sell)
        };
        let decimals = config
            .decimals
            .or(amount_token.as_ref().map(|t| t.decimals))
            .ok_or_else(|| Error::UnknownDecimals(amount_symbol.clone()))?;
        let raw = Converter::new(decimals).to_amount(config.amount)?;
        let sign = if config.exact_output {
            Sign::Negative
        } else {
            Sign::Positive
        };
        let amount = I256::checked_from_sign_and_abs(sign, raw)
            .ok_or_else(|| Error::AmountOverflow(config.amount.to_string()))?;

        info!(
            chain = config.chain.name(),
            %sell_token,
            %buy_token,
            %amount,
            slippage_percent = config.slippage_percent,
            interval_ms = config.poller.interval.as_millis() as u64,
            "Initializing quote watcher"
        );

        let mut client = QuoteClient::new(config.chain.clone());
        if let Some(timeout) = timeout {
            client = client.with_timeout(timeout);
        }

        Ok(Self {
            client: Arc::new(client),
            request: QuoteRequest::new(amount, sell_token, buy_token),
            config,
            sell,
            buy,
        })
    }

    /// Run the watcher until interrupted or the poller gives up.
    pub async fn run(&self) -> Result<()> {
        let (mut poller, mut events) =
            QuotePoller::new(self.client.clone(), self.request.clone(), self.config.poller);
        poller.start();

        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    info!("Interrupted, stopping");
                    poller.stop().await;
                }
                event = events.recv() => match event {
                    Some(PollEvent::Quote(quote)) => self.report(&quote),
                    Some(PollEvent::Error(err)) => warn!(%err, kind = ?err.kind(), "Quote refresh failed"),
                    Some(PollEvent::Stopped(StopReason::Manual)) => return Ok(()),
                    Some(PollEvent::Stopped(StopReason::Errors)) => {
                        return Err(Error::TooManyErrors(self.config.poller.error_threshold));
                    }
                    None => return Err(Error::PollerClosed),
                },
            }
        }
    }

    /// Minimum amount of the buy token the swap has to deliver.
    fn minimum_received(&self, quote: &Quote) -> U256 {
        if self.request.is_exact_output() {
            self.request.amount.unsigned_abs()
        } else {
            quote.minimum_received(self.config.slippage_percent)
        }
    }

    fn report(&self, quote: &Quote) {
        let total_token = if self.request.is_exact_output() {
            &self.sell
        } else {
            &self.buy
        };
        let total = match total_token {
            Some(token) => token
                .converter()
                .to_decimal(quote.total)
                .map(|d| format!("{d} {}", token.symbol))
                .unwrap_or_else(|_| quote.total.to_string()),
            None => quote.total.to_string(),
        };
        info!(
            %total,
            price_impact = quote.price_impact,
            splits = quote.splits.len(),
            "Quote refreshed"
        );

        let params = SwapParams {
            sell_token: self.request.sell_token,
            buy_token: self.request.buy_token,
            quote,
            minimum_received: self.minimum_received(quote),
            router: self.config.chain.router(),
            slippage_percent: self.config.slippage_percent,
        };
        match encode::encode_swap_with_approval(params) {
            Ok(calls) if calls.is_executable() => {
                for (idx, call) in calls.all_calls().into_iter().enumerate() {
                    info!(idx, %call, "Swap call");
                }
            }
            Ok(_) => warn!("Quote has no executable route"),
            Err(err) => warn!(%err, "Failed to encode swap"),
        }
        debug!(?quote, "Full quote");
    }
}
