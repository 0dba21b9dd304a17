//! Decoded on-chain events consumed by the in-memory ledger.

use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};

/// A settlement batch: one on-chain transaction executed by a solver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub block_time: DateTime<Utc>,
    pub tx_hash: B256,
    pub solver_address: Address,
    pub solver_name: String,
    /// Number of swaps routed through external DEX liquidity.
    pub dex_swaps: u32,
}

/// ERC20 `Transfer` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc20Transfer {
    pub tx_hash: B256,
    pub from: Address,
    pub to: Address,
    /// Contract address of the transferred token.
    pub token: Address,
    pub value: U256,
}

/// `Withdrawal` event emitted when wrapped native currency is unwrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub tx_hash: B256,
    /// Address whose wrapped balance was burned.
    pub src: Address,
    /// Wrapped-native token contract that emitted the event.
    pub token: Address,
    pub wad: U256,
}

/// Settlement contract `Trade` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub tx_hash: B256,
    /// Settlement contract that emitted the event.
    pub settlement_contract: Address,
    pub owner: Address,
    pub sell_token: Address,
    pub buy_token: Address,
    pub sell_amount: U256,
    pub buy_amount: U256,
    pub fee_amount: U256,
}
