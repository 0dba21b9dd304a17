//! Data model shared by the slippage query, execution and analysis crates.
//!
//! Every value here is derived from on-chain data for a single run and is
//! never mutated after creation.

pub mod events;
pub mod models;

pub use events::{Batch, Erc20Transfer, Trade, Withdrawal};
pub use models::{
    BatchDelta, Fee, LedgerEntry, PricedDelta, SlippageObservation, SlippageRow, TokenInfo,
    TransactionSlippage, Transfer,
};
