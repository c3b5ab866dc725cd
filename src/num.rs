use alloy::primitives::{I256, Sign, U256};
use fastnum::{
    UD256, bint,
    decimal::{Context, RoundingMode},
};

use crate::error::DexError;

const PERCENT: U256 = U256::from_limbs([100, 0, 0, 0]);

/// Splits a 256-bit value into `(low, high)` 128-bit halves, the way
/// `u256` values are laid out in calldata.
pub fn split_u256(value: U256) -> (u128, u128) {
    let limbs = value.as_limbs();
    (
        u128::from(limbs[0]) | (u128::from(limbs[1]) << 64),
        u128::from(limbs[2]) | (u128::from(limbs[3]) << 64),
    )
}

/// `amount + amount * percent / 100`, the product truncated toward zero.
///
/// Returns `None` if the result does not fit into 256 bits.
pub fn add_slippage(amount: U256, percent: u32) -> Option<U256> {
    amount.checked_add(percent_of(amount, percent))
}

/// `amount - amount * percent / 100`, the product truncated toward zero,
/// floored at zero.
pub fn subtract_slippage(amount: U256, percent: u32) -> U256 {
    amount.saturating_sub(percent_of(amount, percent))
}

/// `floor(amount * percent / 100)` without the intermediate product
/// overflowing for amounts close to the 256-bit range.
fn percent_of(amount: U256, percent: u32) -> U256 {
    let p = U256::from(percent);
    (amount / PERCENT)
        .saturating_mul(p)
        .saturating_add((amount % PERCENT) * p / PERCENT)
}

/// Parses an unsigned integer from `0x`-prefixed hex or decimal text.
pub fn parse_unsigned(text: &str) -> Option<U256> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()) => {
            U256::from_str_radix(digits, 16).ok()
        }
        Some(_) => None,
        None if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) => {
            U256::from_str_radix(text, 10).ok()
        }
        None => None,
    }
}

/// Parses a signed integer, an optional leading `-` followed by
/// anything [`parse_unsigned`] accepts.
pub fn parse_signed(text: &str) -> Option<I256> {
    let text = text.trim();
    let (sign, magnitude) = match text.strip_prefix('-') {
        Some(rest) => (Sign::Negative, rest),
        None => (Sign::Positive, text.strip_prefix('+').unwrap_or(text)),
    };
    I256::checked_from_sign_and_abs(sign, parse_unsigned(magnitude)?)
}

/// Deserializers for integers the API sends either as strings (hex or
/// decimal) or as JSON numbers.
///
/// Numbers are read from their exact source text (serde_json's
/// `arbitrary_precision`), anything but an integer literal is rejected.
pub(crate) mod serde_int {
    use alloy::primitives::{I256, U256};
    use serde::{Deserialize, Deserializer, de};
    use serde_json::Value;

    pub(crate) fn unsigned<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let text = integer_text(deserializer)?;
        super::parse_unsigned(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid unsigned: {text}")))
    }

    pub(crate) fn signed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<I256, D::Error> {
        let text = integer_text(deserializer)?;
        super::parse_signed(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid signed: {text}")))
    }

    fn integer_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(text) => Ok(text),
            Value::Number(number) => Ok(number.to_string()),
            other => Err(de::Error::custom(format!(
                "expected an integer as a number or string, got {other}"
            ))),
        }
    }
}

/// Converts raw token amounts (smallest units) to decimals and back.
#[derive(Clone, Copy, Debug, Default)]
pub struct Converter {
    decimals: u8,
}

impl Converter {
    pub fn new(decimals: u8) -> Self {
        Self { decimals }
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn to_decimal(&self, amount: U256) -> Result<UD256, DexError> {
        let unscaled = bint::UInt::<4>::from_le_slice(amount.as_le_slice())
            .ok_or_else(|| DexError::InvalidAmount(amount.to_string()))?;
        Ok(UD256::from_parts(
            unscaled,
            -(self.decimals as i32),
            Context::default().with_rounding_mode(RoundingMode::Floor),
        ))
    }

    /// Raw units of `value`. Fails when `value` has more fractional digits
    /// than the token has decimals.
    pub fn to_amount(&self, value: UD256) -> Result<U256, DexError> {
        let rescaled = value.rescale(self.decimals as i16);
        if rescaled != value {
            return Err(DexError::InvalidAmount(format!(
                "{value} has more than {} decimals",
                self.decimals
            )));
        }
        Ok(U256::from_le_slice(
            rescaled.digits().to_radix_le(256).as_slice(),
        ))
    }

    /// Parses human-readable decimal text (`"1.5"`) into raw units.
    pub fn parse_amount(&self, text: &str) -> Result<U256, DexError> {
        let value = UD256::from_str(text.trim(), Context::default())
            .map_err(|_| DexError::InvalidAmount(text.to_string()))?;
        self.to_amount(value)
    }
}
