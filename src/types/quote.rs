use alloy::primitives::{I256, U256};
use serde::Deserialize;

use crate::{address::ContractAddress, num};

/// Routed answer to a swap request.
#[derive(Clone, Debug, PartialEq)]
pub struct Quote {
    /// Price impact as a signed fraction, 0 means no impact.
    pub price_impact: f64,
    /// Amount received (exact input) or paid (exact output), in smallest
    /// units. Never negative, the upstream direction sign is stripped.
    pub total: U256,
    /// Parallel paths the liquidity is sourced from. Empty means there is
    /// no executable route.
    pub splits: Vec<Split>,
}

/// One parallel path contributing to a quote.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Split {
    /// Sign encodes exact input (positive) or exact output (negative).
    #[serde(deserialize_with = "num::serde_int::signed")]
    pub amount_specified: I256,
    #[serde(default, deserialize_with = "optional_signed")]
    pub amount_calculated: Option<I256>,
    pub route: Vec<RouteHop>,
}

/// One pool traversal.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RouteHop {
    pub pool_key: PoolKey,
    #[serde(deserialize_with = "num::serde_int::unsigned")]
    pub sqrt_ratio_limit: U256,
    #[serde(deserialize_with = "num::serde_int::unsigned")]
    pub skip_ahead: U256,
}

/// Identifies a pool, `token0 < token1` by convention.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PoolKey {
    pub token0: ContractAddress,
    pub token1: ContractAddress,
    #[serde(deserialize_with = "num::serde_int::unsigned")]
    pub fee: U256,
    #[serde(deserialize_with = "num::serde_int::unsigned")]
    pub tick_spacing: U256,
    /// Zero for the default pool implementation.
    pub extension: ContractAddress,
}

impl Quote {
    /// Whether the quote carries at least one route to execute.
    pub fn is_executable(&self) -> bool {
        !self.splits.is_empty()
    }

    /// Floor of the received amount for the given slippage tolerance.
    pub fn minimum_received(&self, slippage_percent: u32) -> U256 {
        num::subtract_slippage(self.total, slippage_percent)
    }
}

impl PoolKey {
    /// Token on the other side of the pool, `None` if `token` is not
    /// part of this pool.
    pub fn other(&self, token: ContractAddress) -> Option<ContractAddress> {
        if token == self.token1 {
            Some(self.token0)
        } else if token == self.token0 {
            Some(self.token1)
        } else {
            None
        }
    }
}

fn optional_signed<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<I256>, D::Error> {
    num::serde_int::signed(deserializer).map(Some)
}
