//! Token symbol lookup.

use alloy::primitives::{U256, uint};
use dashmap::DashMap;
use tracing::debug;

use crate::{
    Chain,
    address::{self, ContractAddress},
    error::DexError,
    num,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: String,
    pub name: String,
    pub address: ContractAddress,
    pub decimals: u8,
}

impl TokenInfo {
    pub fn new(symbol: &str, name: &str, address: ContractAddress, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            address,
            decimals,
        }
    }

    /// Converter between raw amounts of this token and decimals.
    pub fn converter(&self) -> num::Converter {
        num::Converter::new(self.decimals)
    }
}

const ETH: U256 = uint!(0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7_U256);
const STRK: U256 = uint!(0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d_U256);

const MAINNET_TOKENS: &[(&str, &str, U256, u8)] = &[
    ("ETH", "Ether", ETH, 18),
    ("STRK", "Starknet Token", STRK, 18),
    (
        "USDC",
        "USD Coin",
        uint!(0x053c91253bc9682c04929ca02ed00b3e423f6710d2ee7e0d5ebb06f3ecf368a8_U256),
        6,
    ),
    (
        "USDT",
        "Tether USD",
        uint!(0x068f5c6a61780768455de69077e07e89787839bf8166decfbf92b645209c0fb8_U256),
        6,
    ),
    (
        "DAI",
        "Dai Stablecoin",
        uint!(0x05574eb6b8789a91466f902c380d978e472db68170ff82a5b650b95a58ddf4ad_U256),
        18,
    ),
    (
        "WBTC",
        "Wrapped BTC",
        uint!(0x03fe2b97c1fd336e750087d68b9b867997fd64a2661ff3ca5a7c771641e8e7ac_U256),
        8,
    ),
    (
        "LORDS",
        "LORDS",
        uint!(0x0124aeb495b947201f5fac96fd1138e326ad86195b98df6dec9009158a533b49_U256),
        18,
    ),
];

const SEPOLIA_TOKENS: &[(&str, &str, U256, u8)] = &[
    ("ETH", "Ether", ETH, 18),
    ("STRK", "Starknet Token", STRK, 18),
    (
        "USDC",
        "USD Coin",
        uint!(0x053b40a647cedfca6ca84f542a0fe36736031905a9639a7f19a3c1e66bfd5080_U256),
        6,
    ),
];

/// Symbol and address index of known tokens.
///
/// Safe to share between tasks, registration takes `&self`.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    by_symbol: DashMap<String, ContractAddress>,
    by_address: DashMap<ContractAddress, TokenInfo>,
}

impl TokenRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the well-known tokens of `chain`, empty for
    /// custom chains.
    pub fn for_chain(chain: &Chain) -> Self {
        let registry = Self::new();
        let tokens: &[(&str, &str, U256, u8)] = match chain.chain_id() {
            id if id == Chain::MAINNET_ID => MAINNET_TOKENS,
            id if id == Chain::SEPOLIA_ID => SEPOLIA_TOKENS,
            _ => &[],
        };
        for &(symbol, name, address, decimals) in tokens {
            registry.register(TokenInfo::new(
                symbol,
                name,
                ContractAddress::new(address),
                decimals,
            ));
        }
        debug!(chain = chain.name(), tokens = registry.len(), "token registry loaded");
        registry
    }

    /// Adds or replaces a token. A symbol registered again points to the
    /// latest address, an address registered again under another symbol is
    /// no longer found by the old one.
    pub fn register(&self, token: TokenInfo) {
        let symbol = token.symbol.to_ascii_uppercase();
        let address = token.address;
        if let Some(previous) = self
            .by_symbol
            .insert(symbol.clone(), address)
            .filter(|previous| *previous != address)
        {
            self.by_address.remove(&previous);
        }
        if let Some(replaced) = self
            .by_address
            .insert(address, token)
            .map(|t| t.symbol.to_ascii_uppercase())
            .filter(|replaced| *replaced != symbol)
        {
            self.by_symbol.remove_if(&replaced, |_, a| *a == address);
        }
    }

    /// Case-insensitive symbol lookup.
    pub fn by_symbol(&self, symbol: &str) -> Option<TokenInfo> {
        let address = *self.by_symbol.get(&symbol.trim().to_ascii_uppercase())?;
        self.by_address(address)
    }

    pub fn by_address(&self, address: ContractAddress) -> Option<TokenInfo> {
        self.by_address.get(&address).map(|t| t.clone())
    }

    /// Resolves a symbol or an address to an address.
    ///
    /// Address-like input is normalized and returned as is, whether the token
    /// is registered or not.
    pub fn resolve(&self, identifier: &str) -> Result<ContractAddress, DexError> {
        let identifier = identifier.trim();
        if address::is_address_like(identifier) {
            return address::normalize_address(identifier);
        }
        self.by_symbol(identifier)
            .map(|t| t.address)
            .ok_or_else(|| DexError::TokenNotFound(identifier.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}
