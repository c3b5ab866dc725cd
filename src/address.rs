//! Contract addresses.
//!
//! Token and contract addresses arrive from several sources with different
//! casing, zero padding and even radix. [`ContractAddress`] keeps the integer
//! value only, so equality is integer equality and the canonical text form
//! is lowercase `0x`-prefixed hex without leading zeros.

use std::{fmt, str::FromStr};

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer};

use crate::{error::DexError, num};

/// Address of a contract on the chain.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Debug)]
#[debug("0x{_0:x}")]
pub struct ContractAddress(U256);

impl ContractAddress {
    pub const ZERO: Self = Self(U256::ZERO);

    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    /// Integer value of the address.
    pub fn value(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<U256> for ContractAddress {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<ContractAddress> for U256 {
    fn from(value: ContractAddress) -> Self {
        value.0
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl FromStr for ContractAddress {
    type Err = DexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_address(s)
    }
}

impl<'de> Deserialize<'de> for ContractAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        num::serde_int::unsigned(deserializer).map(Self)
    }
}

/// Parses hex (`0x`-prefixed, any case, any padding) or decimal address text.
pub fn normalize_address(input: &str) -> Result<ContractAddress, DexError> {
    num::parse_unsigned(input)
        .map(ContractAddress)
        .ok_or_else(|| DexError::InvalidAddress(input.to_string()))
}

/// Returns true for `0x`-prefixed hex numbers, used to tell addresses
/// from token symbols.
pub fn is_address_like(input: &str) -> bool {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()))
}
