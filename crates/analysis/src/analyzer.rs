//! Slippage analyzer for pennying detection.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use slippage_models::SlippageObservation;
use tracing::{debug, warn};

use crate::kde::{DensityCurve, GaussianKde, ScanRange};

/// Error type for analysis configuration and density fitting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Bandwidth must be finite and positive, got {0}")]
    InvalidBandwidth(f64),
    #[error("Invalid scan range [{start}, {end}) with step {step}")]
    InvalidScanRange { start: f64, end: f64, step: f64 },
    #[error("Threshold must be finite, got {0}")]
    InvalidThreshold(f64),
    #[error("Cannot fit a density to an empty sample")]
    EmptySample,
    #[error("Sample contains a non-finite value: {0}")]
    NonFiniteSample(f64),
}

/// Tunable constants of the analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// Gaussian kernel bandwidth in USD.
    pub bandwidth: f64,
    pub scan: ScanRange,
    /// Solvers whose mode is at or below this value are pennying.
    pub threshold: f64,
    /// Solvers with fewer observations are not classified.
    pub min_observations: usize,
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.bandwidth.is_finite() || self.bandwidth <= 0.0 {
            return Err(AnalysisError::InvalidBandwidth(self.bandwidth));
        }
        if !self.threshold.is_finite() {
            return Err(AnalysisError::InvalidThreshold(self.threshold));
        }
        self.scan.validate()
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            bandwidth: 1.0,
            scan: ScanRange::default(),
            threshold: -0.2,
            min_observations: 2,
        }
    }
}

/// Classification of a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Typical slippage at or below the threshold.
    Pennying,
    Clean,
    /// Too few observations to estimate a density.
    InsufficientData,
    /// Every observation lies too far outside the scan range to locate a mode.
    OutOfRange,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pennying => "pennying",
            Verdict::Clean => "clean",
            Verdict::InsufficientData => "insufficient_data",
            Verdict::OutOfRange => "out_of_range",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analysis result for one solver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverModeResult {
    pub solver: String,
    /// Number of finite observations used.
    pub observations: usize,
    /// Most likely slippage; `None` when the solver was not classified.
    pub mode: Option<f64>,
    pub verdict: Verdict,
}

impl SolverModeResult {
    pub fn is_pennying(&self) -> bool {
        self.verdict == Verdict::Pennying
    }
}

/// Fits a density per solver and flags solvers whose mode is too negative.
pub struct SlippageAnalyzer {
    config: AnalyzerConfig,
}

impl SlippageAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Classify every solver present in `observations`.
    ///
    /// # Returns
    /// One result per solver, keyed and ordered by solver name
    pub fn analyze(&self, observations: &[SlippageObservation]) -> BTreeMap<String, SolverModeResult> {
        self.fit_solvers(observations)
            .into_iter()
            .map(|(solver, (count, kde))| {
                let result = match kde.map(|kde| kde.mode(&self.config.scan)) {
                    Some(Some(mode)) => {
                        let verdict = if mode <= self.config.threshold {
                            Verdict::Pennying
                        } else {
                            Verdict::Clean
                        };
                        debug!("Solver {} mode {:.2} over {} observations", solver, mode, count);
                        SolverModeResult {
                            solver: solver.clone(),
                            observations: count,
                            mode: Some(mode),
                            verdict,
                        }
                    }
                    Some(None) => {
                        warn!(
                            "Solver {} has no density mass inside [{}, {})",
                            solver, self.config.scan.start, self.config.scan.end
                        );
                        SolverModeResult {
                            solver: solver.clone(),
                            observations: count,
                            mode: None,
                            verdict: Verdict::OutOfRange,
                        }
                    }
                    None => SolverModeResult {
                        solver: solver.clone(),
                        observations: count,
                        mode: None,
                        verdict: Verdict::InsufficientData,
                    },
                };
                (solver, result)
            })
            .collect()
    }

    /// Density curves of every classifiable solver, ordered by solver name.
    pub fn density_curves(&self, observations: &[SlippageObservation]) -> Vec<DensityCurve> {
        self.fit_solvers(observations)
            .into_iter()
            .filter_map(|(solver, (_, kde))| kde?.curve(&solver, &self.config.scan))
            .collect()
    }

    fn fit_solvers(
        &self,
        observations: &[SlippageObservation],
    ) -> BTreeMap<String, (usize, Option<GaussianKde>)> {
        partition(observations)
            .into_iter()
            .map(|(solver, values)| {
                let count = values.len();
                let kde = if count < self.config.min_observations.max(1) {
                    warn!(
                        "Solver {} has {} observations, at least {} required",
                        solver, count, self.config.min_observations
                    );
                    None
                } else {
                    GaussianKde::fit(&values, self.config.bandwidth).ok()
                };
                (solver, (count, kde))
            })
            .collect()
    }
}

/// Group finite slippage values by solver. Non-finite values are skipped.
fn partition(observations: &[SlippageObservation]) -> BTreeMap<String, Vec<f64>> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for observation in observations {
        let values = groups.entry(observation.solver.clone()).or_default();
        if observation.slippage.is_finite() {
            values.push(observation.slippage);
        } else {
            warn!(
                "Skipping non-finite slippage {} for solver {}",
                observation.slippage, observation.solver
            );
        }
    }
    groups
}
