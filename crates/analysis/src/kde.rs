//! Gaussian kernel density estimation and grid mode search.

use serde::Serialize;

use crate::analyzer::AnalysisError;

/// Regularly spaced evaluation grid `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl ScanRange {
    pub fn new(start: f64, end: f64, step: f64) -> Result<Self, AnalysisError> {
        let range = Self { start, end, step };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let finite = self.start.is_finite() && self.end.is_finite() && self.step.is_finite();
        if !finite || self.start >= self.end || self.step <= 0.0 {
            return Err(AnalysisError::InvalidScanRange {
                start: self.start,
                end: self.end,
                step: self.step,
            });
        }
        Ok(())
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        ((self.end - self.start) / self.step).ceil() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid points, computed as `start + i * step` to avoid drift.
    pub fn points(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(move |i| self.start + i as f64 * self.step)
    }
}

impl Default for ScanRange {
    fn default() -> Self {
        Self {
            start: -15.0,
            end: 15.0,
            step: 0.01,
        }
    }
}

/// One-dimensional kernel density estimate with a Gaussian kernel.
#[derive(Debug, Clone)]
pub struct GaussianKde {
    samples: Vec<f64>,
    bandwidth: f64,
    norm: f64,
}

impl GaussianKde {
    /// Fit over `samples` with a fixed `bandwidth`.
    pub fn fit(samples: &[f64], bandwidth: f64) -> Result<Self, AnalysisError> {
        if !bandwidth.is_finite() || bandwidth <= 0.0 {
            return Err(AnalysisError::InvalidBandwidth(bandwidth));
        }
        if samples.is_empty() {
            return Err(AnalysisError::EmptySample);
        }
        if let Some(&value) = samples.iter().find(|v| !v.is_finite()) {
            return Err(AnalysisError::NonFiniteSample(value));
        }

        let norm = 1.0 / (samples.len() as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
        Ok(Self {
            samples: samples.to_vec(),
            bandwidth,
            norm,
        })
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Estimated probability density at `x`.
    pub fn density(&self, x: f64) -> f64 {
        let sum: f64 = self
            .samples
            .iter()
            .map(|sample| {
                let z = (x - sample) / self.bandwidth;
                (-0.5 * z * z).exp()
            })
            .sum();
        sum * self.norm
    }

    /// First grid point with the highest density.
    ///
    /// `None` when the density underflows to zero on every grid point, which
    /// happens once all samples sit far outside the scan range.
    pub fn mode(&self, scan: &ScanRange) -> Option<f64> {
        let mut best: Option<(f64, f64)> = None;
        for x in scan.points() {
            let density = self.density(x);
            if density > best.map_or(0.0, |(_, peak)| peak) {
                best = Some((x, density));
            }
        }
        best.map(|(x, _)| x)
    }

    /// Density over the whole grid, for plotting. `None` under the same
    /// condition as [`GaussianKde::mode`].
    pub fn curve(&self, solver: &str, scan: &ScanRange) -> Option<DensityCurve> {
        let points: Vec<(f64, f64)> = scan.points().map(|x| (x, self.density(x))).collect();
        let mode = points
            .iter()
            .fold(None, |best: Option<(f64, f64)>, &(x, density)| match best {
                Some((_, peak)) if peak >= density => best,
                _ if density > 0.0 => Some((x, density)),
                _ => best,
            })
            .map(|(x, _)| x)?;

        Some(DensityCurve {
            solver: solver.to_string(),
            mode,
            points,
        })
    }
}

/// Estimated density of one solver over the scan grid.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityCurve {
    pub solver: String,
    pub mode: f64,
    /// `(x, density)` pairs in grid order.
    pub points: Vec<(f64, f64)>,
}

/// Flat row of a density curve, one per grid point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurvePoint {
    pub solver: String,
    pub x: f64,
    pub density: f64,
    pub is_mode: bool,
}

impl DensityCurve {
    pub fn peak_density(&self) -> f64 {
        self.points
            .iter()
            .map(|&(_, density)| density)
            .fold(0.0, f64::max)
    }

    pub fn to_rows(&self) -> Vec<CurvePoint> {
        self.points
            .iter()
            .map(|&(x, density)| CurvePoint {
                solver: self.solver.clone(),
                x,
                density,
                is_mode: x == self.mode,
            })
            .collect()
    }
}
