//! Slippage aggregation: the SQL template sent to the analytics backend and
//! an in-memory ledger that evaluates the same aggregation over decoded events.

pub mod builder;
pub mod contracts;
pub mod ledger;

pub use builder::{build_query, QueryText, SlippageQuery};
pub use contracts::SettlementConfig;
