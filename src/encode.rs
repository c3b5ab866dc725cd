//! Swap calldata encoding.
//!
//! Turns a [`Quote`] into the calls executing it through the router:
//!
//! 1. `approve` of the sell token (only [`encode_swap_with_approval`])
//! 2. `transfer` of the sell token amount plus slippage to the router
//! 3. `multihop_swap` for a single split or `multi_multihop_swap` for several
//! 4. `clear_minimum` of the buy token, enforcing the minimum received
//! 5. `clear` of the sell token, returning whatever was not spent
//!
//! Quotes without splits produce only the transfer and the final clear.
//!
//! The router is always asked for an exact output of the buy token, so each
//! split is encoded with the buy token, the magnitude of the specified amount
//! and the "negative" flag of the router's signed amount type.

use alloy::primitives::U256;
use tracing::debug;

use crate::{
    address::ContractAddress,
    error::DexError,
    num,
    types::{Call, Quote, RouteHop, Split, SwapCallSet},
};

pub const TRANSFER: &str = "transfer";
pub const APPROVE: &str = "approve";
pub const MULTIHOP_SWAP: &str = "multihop_swap";
pub const MULTI_MULTIHOP_SWAP: &str = "multi_multihop_swap";
pub const CLEAR_MINIMUM: &str = "clear_minimum";
pub const CLEAR: &str = "clear";

/// Sign flag of the router's `i129` amount: the amount is the
/// desired received amount.
const EXACT_OUTPUT_FLAG: U256 = U256::from_limbs([1, 0, 0, 0]);

/// Words per encoded route node.
const ROUTE_NODE_WORDS: usize = 8;

/// Swap to encode.
#[derive(Clone, Copy, Debug)]
pub struct SwapParams<'a> {
    pub sell_token: ContractAddress,
    pub buy_token: ContractAddress,
    pub quote: &'a Quote,
    pub minimum_received: U256,
    pub router: ContractAddress,
    pub slippage_percent: u32,
}

/// Encodes the swap calls.
///
/// Fails with [`DexError::InvalidChain`] when the router address is missing,
/// with [`DexError::InvalidAmount`] when the transfer amount overflows and
/// with [`DexError::InvalidAddress`] when a route does not connect.
pub fn encode_swap(params: SwapParams<'_>) -> Result<SwapCallSet, DexError> {
    if params.router.is_zero() {
        return Err(DexError::InvalidChain("missing router address".to_string()));
    }

    let transfer_amount = transfer_amount(&params)?;
    let (amount_low, amount_high) = num::split_u256(transfer_amount);
    let transfer_call = Call::new(
        params.sell_token,
        TRANSFER,
        vec![
            params.router.value(),
            U256::from(amount_low),
            U256::from(amount_high),
        ],
    );
    let clear_call = Call::new(params.router, CLEAR, vec![params.sell_token.value()]);

    let (swap_calls, clear_minimum_call) = match params.quote.splits.as_slice() {
        [] => (Vec::new(), None),
        [split] => {
            let mut calldata = vec![U256::from(split.route.len())];
            encode_split_into(&mut calldata, split, &params)?;
            (
                vec![Call::new(params.router, MULTIHOP_SWAP, calldata)],
                Some(clear_minimum(&params)),
            )
        }
        splits => {
            let mut calldata = vec![U256::from(splits.len())];
            for split in splits {
                calldata.push(U256::from(split.route.len()));
                encode_split_into(&mut calldata, split, &params)?;
            }
            (
                vec![Call::new(params.router, MULTI_MULTIHOP_SWAP, calldata)],
                Some(clear_minimum(&params)),
            )
        }
    };

    debug!(
        sell_token = %params.sell_token,
        buy_token = %params.buy_token,
        splits = params.quote.splits.len(),
        %transfer_amount,
        "encoded swap"
    );

    Ok(SwapCallSet {
        approve_call: None,
        transfer_call,
        swap_calls,
        clear_minimum_call,
        clear_call,
    })
}

/// Same as [`encode_swap`], preceded by an `approve` of the transferred
/// amount to the router.
pub fn encode_swap_with_approval(params: SwapParams<'_>) -> Result<SwapCallSet, DexError> {
    let mut calls = encode_swap(params)?;
    // Same word layout as the transfer: recipient, low, high.
    calls.approve_call = Some(Call::new(
        params.sell_token,
        APPROVE,
        calls.transfer_call.calldata.clone(),
    ));
    Ok(calls)
}

/// Encodes one route node entered with `current` token.
///
/// Returns the token the hop leaves with, `token0` if `current` is
/// `token1` of the pool and `token1` otherwise, and the node words.
pub fn encode_route_node(
    current: ContractAddress,
    hop: &RouteHop,
) -> (ContractAddress, [U256; ROUTE_NODE_WORDS]) {
    let key = &hop.pool_key;
    let next = if current == key.token1 {
        key.token0
    } else {
        key.token1
    };
    let (limit_low, limit_high) = num::split_u256(hop.sqrt_ratio_limit);
    (
        next,
        [
            key.token0.value(),
            key.token1.value(),
            key.fee,
            key.tick_spacing,
            key.extension.value(),
            U256::from(limit_low),
            U256::from(limit_high),
            hop.skip_ahead,
        ],
    )
}

/// Appends route nodes, the specified token and the signed amount of a
/// split. Routes run from the sell token to the buy token, the nodes are
/// emitted in route order.
fn encode_split_into(
    calldata: &mut Vec<U256>,
    split: &Split,
    params: &SwapParams<'_>,
) -> Result<(), DexError> {
    let mut current = params.sell_token;
    for hop in &split.route {
        if hop.pool_key.other(current).is_none() {
            return Err(DexError::InvalidAddress(format!(
                "route hop {}/{} does not contain {current}",
                hop.pool_key.token0, hop.pool_key.token1
            )));
        }
        let (next, words) = encode_route_node(current, hop);
        calldata.extend(words);
        current = next;
    }
    if !split.route.is_empty() && current != params.buy_token {
        return Err(DexError::InvalidAddress(format!(
            "route ends at {current} instead of {}",
            params.buy_token
        )));
    }
    calldata.push(params.buy_token.value());
    calldata.push(split.amount_specified.unsigned_abs());
    calldata.push(EXACT_OUTPUT_FLAG);
    Ok(())
}

fn transfer_amount(params: &SwapParams<'_>) -> Result<U256, DexError> {
    num::add_slippage(params.quote.total, params.slippage_percent).ok_or_else(|| {
        DexError::InvalidAmount(format!(
            "{} plus {}% does not fit into 256 bits",
            params.quote.total, params.slippage_percent
        ))
    })
}

fn clear_minimum(params: &SwapParams<'_>) -> Call {
    let (low, high) = num::split_u256(params.minimum_received);
    Call::new(
        params.router,
        CLEAR_MINIMUM,
        vec![params.buy_token.value(), U256::from(low), U256::from(high)],
    )
}
