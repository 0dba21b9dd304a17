//! Per-solver slippage distribution analysis.

pub mod analyzer;
pub mod kde;

pub use analyzer::{AnalysisError, AnalyzerConfig, SlippageAnalyzer, SolverModeResult, Verdict};
pub use kde::{CurvePoint, DensityCurve, GaussianKde, ScanRange};
