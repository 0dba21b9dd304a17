//! Observability for the slippage checker: logging, call tracing, metrics
//! and report files.

pub mod logging;
pub mod metrics;
pub mod report;
pub mod traced;

pub use logging::init_logging;
pub use metrics::Metrics;
pub use traced::{traced, TracedScope};
