//! Addresses the aggregation treats specially.

use alloy::primitives::{address, Address};

/// First-generation settlement contract.
pub const ALPHA_SETTLEMENT_CONTRACT: Address = address!("3328f5f2cecaf00a2443082b657cedeaf70bfaef");

/// Production settlement contract.
pub const BETA_SETTLEMENT_CONTRACT: Address = address!("9008d19f58aabd9ed0d60971565aa8510560ab41");

/// Sentinel identifier for the chain's native currency.
pub const NATIVE_TOKEN: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

/// Canonical wrapped-native token, used to price the native sentinel.
pub const WRAPPED_NATIVE_TOKEN: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");

/// Counterparty of both unwrap legs: "became native currency".
pub const BURN_ADDRESS: Address = Address::ZERO;

pub const NATIVE_SYMBOL: &str = "ETH";
pub const NATIVE_DECIMALS: u8 = 18;

/// Address configuration shared by the SQL template and the in-memory ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementConfig {
    /// Transfers into these addresses count positive, out of them negative.
    pub settlement_contracts: Vec<Address>,
    pub native_token: Address,
    pub wrapped_native_token: Address,
    pub burn_address: Address,
}

impl SettlementConfig {
    /// Check whether `address` is one of the configured settlement contracts.
    pub fn is_settlement_contract(&self, address: &Address) -> bool {
        self.settlement_contracts.contains(address)
    }

    /// Token whose price quote is used for `token`.
    pub fn price_token(&self, token: Address) -> Address {
        if token == self.native_token {
            self.wrapped_native_token
        } else {
            token
        }
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            settlement_contracts: vec![ALPHA_SETTLEMENT_CONTRACT, BETA_SETTLEMENT_CONTRACT],
            native_token: NATIVE_TOKEN,
            wrapped_native_token: WRAPPED_NATIVE_TOKEN,
            burn_address: BURN_ADDRESS,
        }
    }
}
