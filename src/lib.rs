//! Ekubo quoter SDK.
//!
//! # Overview
//!
//! Client for the Ekubo routing API on Starknet: fetches swap quotes and
//! encodes them into the contract calls executing the swap through the
//! router.
//!
//! Use [`client::QuoteClient`] to fetch a [`types::Quote`] for a
//! [`types::QuoteRequest`], then [`encode::encode_swap`] to turn it into a
//! [`types::SwapCallSet`] ready to be submitted by a wallet.
//!
//! [`poller::QuotePoller`] keeps a quote fresh by refetching it on an
//! interval, and [`registry::TokenRegistry`] resolves token symbols to
//! addresses.
//!
//! Requests are retried with exponential backoff (see [`retry`]) and
//! can be aborted at any point with a
//! [`tokio_util::sync::CancellationToken`].
//!
//! See `./tests` for examples.
//!
//! # Limitations/follow-ups
//!
//! * Encoded calls are not simulated, acceptance by the router is not
//!   checked.
//!
//! * Only the router's exact output convention is encoded, every split
//!   specifies the buy token amount.
//!
//! # Testing
//!
//! [`testing`] module provides a scripted HTTP transport and quote fixtures.

pub mod address;
pub mod client;
pub mod encode;
pub mod error;
pub mod num;
pub mod poller;
pub mod registry;
pub mod retry;
pub mod testing;
pub mod types;

use alloy::primitives::{U256, uint};

use crate::{address::ContractAddress, error::DexError};

const EKUBO_API_URL: &str = "https://prod-api-quoter.ekubo.org";

#[derive(Clone, Debug, PartialEq, Eq)]
/// Chain the router is deployed on.
pub struct Chain {
    name: String,
    chain_id: U256,
    api_url: String,
    router: ContractAddress,
    usd_token: ContractAddress,
}

impl Chain {
    /// `SN_MAIN`
    pub const MAINNET_ID: U256 = uint!(0x534e5f4d41494e_U256);
    /// `SN_SEPOLIA`
    pub const SEPOLIA_ID: U256 = uint!(0x534e5f5345504f4c4941_U256);

    pub fn mainnet() -> Self {
        Self {
            name: "mainnet".to_string(),
            chain_id: Self::MAINNET_ID,
            api_url: EKUBO_API_URL.to_string(),
            router: ContractAddress::new(uint!(
                0x0199741822c2dc722f6f605204f35e56dbc23bceed54818168c4c49e4fb8737e_U256
            )),
            usd_token: ContractAddress::new(uint!(
                0x053c91253bc9682c04929ca02ed00b3e423f6710d2ee7e0d5ebb06f3ecf368a8_U256
            )),
        }
    }

    pub fn sepolia() -> Self {
        Self {
            name: "sepolia".to_string(),
            chain_id: Self::SEPOLIA_ID,
            api_url: EKUBO_API_URL.to_string(),
            router: ContractAddress::new(uint!(
                0x0045f933adf0607292468ad1c1dedaa74d5ad166392590e72676a34d01d7b763_U256
            )),
            usd_token: ContractAddress::new(uint!(
                0x053b40a647cedfca6ca84f542a0fe36736031905a9639a7f19a3c1e66bfd5080_U256
            )),
        }
    }

    pub fn custom(
        name: impl Into<String>,
        chain_id: U256,
        api_url: impl Into<String>,
        router: ContractAddress,
        usd_token: ContractAddress,
    ) -> Self {
        Self {
            name: name.into(),
            chain_id,
            api_url: api_url.into(),
            router,
            usd_token,
        }
    }

    /// Known chain by name (`mainnet`, `sepolia`, case-insensitive, with or
    /// without `sn_` prefix) or by decimal/hex chain id.
    pub fn from_selector(selector: &str) -> Result<Self, DexError> {
        let selector = selector.trim();
        let by_id = num::parse_unsigned(selector);
        match selector.to_ascii_lowercase().as_str() {
            "mainnet" | "sn_main" => Ok(Self::mainnet()),
            "sepolia" | "sn_sepolia" => Ok(Self::sepolia()),
            _ if by_id == Some(Self::MAINNET_ID) => Ok(Self::mainnet()),
            _ if by_id == Some(Self::SEPOLIA_ID) => Ok(Self::sepolia()),
            _ => Err(DexError::InvalidChain(selector.to_string())),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_router(mut self, router: ContractAddress) -> Self {
        self.router = router;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chain_id(&self) -> U256 {
        self.chain_id
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn router(&self) -> ContractAddress {
        self.router
    }

    /// Canonical USD stablecoin, the quote token of
    /// [`client::QuoteClient::fetch_quote_in_usdc`].
    pub fn usd_token(&self) -> ContractAddress {
        self.usd_token
    }
}
