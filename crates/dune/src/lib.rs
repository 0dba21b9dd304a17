//! Query execution against the Dune analytics API.

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod types;

pub use client::DuneClient;
pub use config::DuneConfig;
pub use error::{DuneError, DuneResult};
pub use executor::{get_slippage, QueryExecutor};
pub use types::{DuneQuery, ExecutionState, Network};
