//! Ledger, delta and observation types.

use alloy::primitives::{Address, B256, I256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Solver label used when the execution service returns a row without one.
pub const UNKNOWN_SOLVER: &str = "unknown";

/// A token movement within a settlement transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub block_time: DateTime<Utc>,
    pub tx_hash: B256,
    pub solver_address: Address,
    pub solver_name: String,
    pub sender: Address,
    pub receiver: Address,
    pub token: Address,
    /// Raw amount in the token's native precision.
    pub amount: U256,
}

/// A per-trade fee deduction. `amount` is never positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fee {
    pub block_time: DateTime<Utc>,
    pub tx_hash: B256,
    pub solver_address: Address,
    pub solver_name: String,
    pub token: Address,
    pub amount: I256,
}

/// One signed row of the combined ledger (transfer contribution or fee).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub block_time: DateTime<Utc>,
    pub tx_hash: B256,
    pub solver_address: Address,
    pub solver_name: String,
    pub token: Address,
    pub amount: I256,
}

impl From<Fee> for LedgerEntry {
    fn from(fee: Fee) -> Self {
        Self {
            block_time: fee.block_time,
            tx_hash: fee.tx_hash,
            solver_address: fee.solver_address,
            solver_name: fee.solver_name,
            token: fee.token,
            amount: fee.amount,
        }
    }
}

/// Net raw movement of one token within one settlement, never zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDelta {
    pub block_time: DateTime<Utc>,
    pub tx_hash: B256,
    pub solver_address: Address,
    pub solver_name: String,
    pub token: Address,
    pub delta: I256,
}

/// A batch delta converted to USD.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedDelta {
    pub delta: BatchDelta,
    /// Token symbol, or the hex address when the token is unknown.
    pub symbol: String,
    /// `None` when the price or the token's decimals are missing.
    pub usd_value: Option<f64>,
}

impl PricedDelta {
    pub fn is_positive(&self) -> bool {
        self.delta.delta.is_positive()
    }
}

/// Token metadata needed to scale raw amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u8,
}

/// Per-settlement aggregate across every token the solver touched.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionSlippage {
    pub block_time: DateTime<Utc>,
    pub tx_hash: B256,
    pub solver_address: Address,
    pub solver_name: String,
    /// Symbols of the tokens involved, sorted and comma separated.
    pub tokens_involved: String,
    /// Sum of known USD legs; `None` only when every leg is unpriced.
    pub usd_delta: Option<f64>,
    pub num_missing_prices: usize,
    pub num_positive: usize,
    pub num_negative: usize,
}

/// Record shape returned by the query execution service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlippageRow {
    pub time: String,
    pub solver: Option<String>,
    pub slippage: f64,
}

impl SlippageRow {
    pub fn observation(&self) -> SlippageObservation {
        SlippageObservation {
            solver: self
                .solver
                .clone()
                .unwrap_or_else(|| UNKNOWN_SOLVER.to_string()),
            slippage: self.slippage,
        }
    }
}

/// A single (solver, slippage) value fed to the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlippageObservation {
    pub solver: String,
    pub slippage: f64,
}

impl SlippageObservation {
    pub fn new(solver: impl Into<String>, slippage: f64) -> Self {
        Self {
            solver: solver.into(),
            slippage,
        }
    }
}
