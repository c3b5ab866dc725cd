mod call;
mod quote;

use alloy::primitives::I256;

pub use call::*;
pub use quote::*;

use crate::address::ContractAddress;

/// Parameters of a quote request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuoteRequest {
    /// Non-negative: exact input of `sell_token`.
    /// Negative: exact output, `|amount|` of `buy_token` wanted.
    pub amount: I256,
    pub sell_token: ContractAddress,
    pub buy_token: ContractAddress,
}

impl QuoteRequest {
    pub fn new(amount: I256, sell_token: ContractAddress, buy_token: ContractAddress) -> Self {
        Self {
            amount,
            sell_token,
            buy_token,
        }
    }

    pub fn is_exact_output(&self) -> bool {
        self.amount.is_negative()
    }

    /// Tokens in the order the quoter API expects them: the token whose
    /// amount is specified goes first.
    pub fn wire_tokens(&self) -> (ContractAddress, ContractAddress) {
        if self.is_exact_output() {
            (self.buy_token, self.sell_token)
        } else {
            (self.sell_token, self.buy_token)
        }
    }
}
