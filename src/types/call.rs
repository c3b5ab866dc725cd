use alloy::primitives::U256;
use itertools::Itertools;

use crate::address::ContractAddress;

/// Contract invocation descriptor, ready to be submitted by a wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub contract_address: ContractAddress,
    pub entrypoint: &'static str,
    pub calldata: Vec<U256>,
}

impl Call {
    pub(crate) fn new(
        contract_address: ContractAddress,
        entrypoint: &'static str,
        calldata: Vec<U256>,
    ) -> Self {
        Self {
            contract_address,
            entrypoint,
            calldata,
        }
    }

    /// Calldata words as `0x`-prefixed lowercase hex without padding.
    pub fn calldata_hex(&self) -> Vec<String> {
        self.calldata.iter().map(|w| format!("0x{w:x}")).collect()
    }
}

impl std::fmt::Display for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}::{}([{}])",
            self.contract_address,
            self.entrypoint,
            self.calldata_hex().iter().join(", ")
        )
    }
}

/// Calls executing a swap, in the order they have to be submitted.
///
/// A set without swap calls is well-formed but does not swap anything,
/// see [`SwapCallSet::is_executable`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapCallSet {
    pub approve_call: Option<Call>,
    pub transfer_call: Call,
    pub swap_calls: Vec<Call>,
    pub clear_minimum_call: Option<Call>,
    pub clear_call: Call,
}

impl SwapCallSet {
    /// Execution order: approve (if any), transfer, swap(s),
    /// clear minimum (if swapping), clear.
    pub fn all_calls(&self) -> Vec<&Call> {
        self.approve_call
            .iter()
            .chain(std::iter::once(&self.transfer_call))
            .chain(self.swap_calls.iter())
            .chain(self.clear_minimum_call.iter())
            .chain(std::iter::once(&self.clear_call))
            .collect()
    }

    pub fn is_executable(&self) -> bool {
        !self.swap_calls.is_empty()
    }
}
