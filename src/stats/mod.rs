//! Surface statistics.
//!
//! Roughness parameters are computed relative to the least-squares mean
//! plane (the same fit [`PlaneLevel`](crate::ops::PlaneLevel) subtracts),
//! so they are meaningful on raw, tilted scans. NaN samples are excluded
//! throughout.
//!
//! - [`gaussian`]: multi-Gaussian peak model and fitting

pub mod gaussian;

pub use gaussian::{fit_multi_gaussian, multi_gaussian, multi_gaussian_residual, FitReport};

use thiserror::Error;

use crate::grid::Grid2;
use crate::image::Channel;
use crate::linalg::LinalgError;
use crate::ops::{level, OpsError};

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("no finite samples to analyze")]
    EmptyInput,

    #[error("parameter count {0} is not a multiple of 3")]
    BadParameterCount(usize),

    #[error("sigma must be greater than 0: {0}")]
    InvalidSigma(f64),

    #[error("input lengths differ: x has {x}, y has {y}")]
    LengthMismatch { x: usize, y: usize },

    #[error("fit did not converge within {iterations} iterations")]
    DidNotConverge { iterations: usize },

    #[error("normal equations could not be solved: {0}")]
    Solve(#[from] LinalgError),

    #[error("plane fit failed: {0}")]
    Level(#[from] OpsError),
}

/// Root mean square of the finite values. NaN if there are none.
pub fn rms(values: &[f64]) -> f64 {
    let mut n = 0usize;
    let mut sum_sq = 0.0;
    for &v in values {
        if v.is_finite() {
            n += 1;
            sum_sq += v * v;
        }
    }
    if n == 0 {
        f64::NAN
    } else {
        (sum_sq / n as f64).sqrt()
    }
}

/// Deviations of a channel's samples from its least-squares mean plane.
fn plane_deviations(channel: &Channel) -> Result<Grid2, StatsError> {
    let plane = level::fit_plane(channel.x(), channel.y(), channel.data())?;
    let x = channel.x();
    let y = channel.y();
    let data = channel.data();
    Ok(Grid2::from_fn(data.rows(), data.cols(), |i, j| {
        data.get(i, j) - plane.eval(x.get(i), y.get(j))
    }))
}

/// Average roughness Ra: mean absolute deviation from the mean plane.
pub fn roughness_avg(channel: &Channel) -> Result<f64, StatsError> {
    let dev = plane_deviations(channel)?;
    let mut n = 0usize;
    let mut sum_abs = 0.0;
    for &v in dev.values() {
        if v.is_finite() {
            n += 1;
            sum_abs += v.abs();
        }
    }
    if n == 0 {
        return Err(StatsError::EmptyInput);
    }
    Ok(sum_abs / n as f64)
}

/// RMS roughness Rq: root mean square deviation from the mean plane.
pub fn roughness_rms(channel: &Channel) -> Result<f64, StatsError> {
    let dev = plane_deviations(channel)?;
    let rq = rms(dev.values());
    if rq.is_nan() {
        return Err(StatsError::EmptyInput);
    }
    Ok(rq)
}

/// Histogram counts and bin edges; `edges.len() == counts.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub counts: Vec<u64>,
    pub edges: Vec<f64>,
}

impl Histogram {
    pub fn bins(&self) -> usize {
        self.counts.len()
    }
}

/// Histogram of a channel's samples with Freedman-Diaconis bin widths
/// (`2 * IQR * n^(-1/3)`). A zero IQR or a degenerate width falls back to a
/// single bin spanning the data. NaN samples are excluded; all-NaN data is
/// an error.
pub fn histogram(channel: &Channel) -> Result<Histogram, StatsError> {
    let mut values: Vec<f64> = channel
        .data()
        .values()
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return Err(StatsError::EmptyInput);
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = values.len();
    let min = values[0];
    let max = values[n - 1];
    if min == max {
        // All samples identical: one unit-wide bin centered on the value.
        return Ok(Histogram {
            counts: vec![n as u64],
            edges: vec![min - 0.5, min + 0.5],
        });
    }

    let iqr = quantile(&values, 0.75) - quantile(&values, 0.25);
    let width = 2.0 * iqr / (n as f64).cbrt();
    let bins = if width > 0.0 && width.is_finite() {
        (((max - min) / width).ceil() as usize).max(1)
    } else {
        1
    };

    let mut counts = vec![0u64; bins];
    let span = max - min;
    for &v in &values {
        // The last edge is inclusive.
        let idx = (((v - min) / span) * bins as f64).floor() as usize;
        counts[idx.min(bins - 1)] += 1;
    }
    let edges = (0..=bins)
        .map(|k| min + span * k as f64 / bins as f64)
        .collect();
    Ok(Histogram { counts, edges })
}

/// Linearly interpolated quantile of sorted values, `q` in `[0, 1]`.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
