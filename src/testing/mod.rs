//! Test utilities.
//!
//! [`MockTransport`] replaces the HTTP stack of [`crate::client::QuoteClient`]
//! with a scripted queue of responses and records every requested URL.
//!
//! Fixtures build well-known mainnet addresses, quotes, splits and route hops,
//! and quoter API response bodies, e.g.
//!
//! ```
//! use ekubo_quoter_sdk::{
//!     Chain,
//!     client::{HttpResponse, QuoteClient},
//!     testing::{self, MockTransport},
//! };
//!
//! let transport = MockTransport::new();
//! transport.push(HttpResponse::ok(testing::quote_json("-1000", 1)));
//! let client = QuoteClient::with_transport(Chain::mainnet(), transport);
//! ```

use std::{
    collections::VecDeque,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use alloy::primitives::{I256, U256, uint};
use serde_json::json;
use url::Url;

use crate::{
    address::ContractAddress,
    client::{HttpResponse, Transport},
    error::DexError,
    types::{PoolKey, Quote, RouteHop, Split},
};

pub const ETH: ContractAddress = ContractAddress::new(uint!(
    0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7_U256
));
pub const STRK: ContractAddress = ContractAddress::new(uint!(
    0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d_U256
));
pub const USDC: ContractAddress = ContractAddress::new(uint!(
    0x053c91253bc9682c04929ca02ed00b3e423f6710d2ee7e0d5ebb06f3ecf368a8_U256
));
pub const ROUTER: ContractAddress = ContractAddress::new(uint!(
    0x0199741822c2dc722f6f605204f35e56dbc23bceed54818168c4c49e4fb8737e_U256
));

/// 0.05% fee in the 0.128 fixed point format pools use.
pub const FEE: U256 = uint!(0x20c49ba5e353f80000000000000000_U256);
pub const TICK_SPACING: u64 = 1000;
pub const SKIP_AHEAD: u64 = 2;
pub const SQRT_RATIO_LIMIT: U256 = uint!(0x1000003f7f1380b75_U256);

pub fn pow10(exp: u64) -> U256 {
    U256::from(10).pow(U256::from(exp))
}

/// `n` whole units of an 18 decimals token.
pub fn eth_amount(n: u64) -> I256 {
    I256::from_raw(U256::from(n) * pow10(18))
}

pub fn hop(token0: ContractAddress, token1: ContractAddress) -> RouteHop {
    RouteHop {
        pool_key: PoolKey {
            token0,
            token1,
            fee: FEE,
            tick_spacing: U256::from(TICK_SPACING),
            extension: ContractAddress::ZERO,
        },
        sqrt_ratio_limit: SQRT_RATIO_LIMIT,
        skip_ahead: U256::from(SKIP_AHEAD),
    }
}

pub fn split(amount_specified: i64, route: Vec<RouteHop>) -> Split {
    Split {
        amount_specified: I256::try_from(amount_specified).unwrap(),
        amount_calculated: None,
        route,
    }
}

pub fn quote(total: U256, splits: Vec<Split>) -> Quote {
    Quote {
        price_impact: 0.0,
        total,
        splits,
    }
}

/// Quoter API body with `total_calculated = total` and `n_splits` single
/// hop splits through the STRK/ETH pool.
pub fn quote_json(total: &str, n_splits: usize) -> String {
    let splits: Vec<_> = (0..n_splits)
        .map(|i| {
            json!({
                "amount_specified": format!("-{}", 1000 + i),
                "amount_calculated": format!("{}", 2000 + i),
                "route": [{
                    "pool_key": {
                        "token0": STRK.to_string(),
                        "token1": ETH.to_string(),
                        "fee": format!("0x{FEE:x}"),
                        "tick_spacing": TICK_SPACING,
                        "extension": "0x0",
                    },
                    "sqrt_ratio_limit": format!("0x{SQRT_RATIO_LIMIT:x}"),
                    "skip_ahead": SKIP_AHEAD,
                }],
            })
        })
        .collect();
    json!({
        "price_impact": 0.0012,
        "total_calculated": total,
        "splits": splits,
    })
    .to_string()
}

/// Scripted [`Transport`].
///
/// Queued responses are returned in order, then the fallback. Clones share
/// the queue and the request log.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct MockState {
    queue: VecDeque<Result<HttpResponse, DexError>>,
    fallback: Option<HttpResponse>,
    requests: Vec<Url>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: HttpResponse) -> &Self {
        self.state.lock().unwrap().queue.push_back(Ok(response));
        self
    }

    pub fn push_error(&self, err: DexError) -> &Self {
        self.state.lock().unwrap().queue.push_back(Err(err));
        self
    }

    /// Response returned once the queue is drained.
    pub fn with_fallback(self, response: HttpResponse) -> Self {
        self.state.lock().unwrap().fallback = Some(response);
        self
    }

    /// Delays every response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn requests(&self) -> Vec<Url> {
        self.state.lock().unwrap().requests.clone()
    }
}

impl Transport for MockTransport {
    fn fetch(&self, url: Url) -> impl Future<Output = Result<HttpResponse, DexError>> + Send {
        let next = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(url);
            state
                .queue
                .pop_front()
                .or_else(|| state.fallback.clone().map(Ok))
                .unwrap_or_else(|| Err(DexError::Transport("no scripted response".to_string())))
        };
        let delay = self.delay;
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            next
        }
    }
}
