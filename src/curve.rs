//! Monotone piecewise interpolation of turbine performance tables.
//!
//! A [`CurveInterpolator`] wraps one discretized table `x → y` with strictly
//! increasing `x`. Two schemes are supported:
//!
//! - **Linear**: straight segments between samples (the default).
//! - **Pchip**: shape-preserving piecewise cubic Hermite (Fritsch–Carlson
//!   slopes), which never overshoots the neighbouring samples.
//!
//! Evaluation outside the sample domain follows the configured
//! [`Extrapolation`] policy. The interpolator also caches the knots of its
//! rising branch (samples up to the peak) so that power can be mapped back to
//! wind speed below rated power by inverting the curve itself.

use serde::{Deserialize, Serialize};

use crate::constants::PEAK_TOLERANCE;
use crate::error::{FarmError, FarmResult};

/// Interpolation scheme between samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Straight segments between samples
    #[default]
    Linear,
    /// Shape-preserving piecewise cubic Hermite
    Pchip,
}

/// Policy for points outside `[x_min, x_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Extrapolation {
    /// Fail with a domain error.
    #[default]
    Error,
    /// Hold the end sample value.
    Clamp,
    /// Return a fixed value.
    Fill(f64),
}

/// Interpolator over one sorted `(x, y)` table.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveInterpolator {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Hermite slopes at the knots, empty for linear interpolation
    slopes: Vec<f64>,
    method: Interpolation,
    extrapolation: Extrapolation,
    peak: usize,
    /// Knot indices `0..=peak` where the running maximum strictly grows
    rising: Vec<usize>,
}

impl CurveInterpolator {
    /// Build an interpolator from parallel sample slices.
    ///
    /// Requires at least two samples, equal lengths, finite values and
    /// strictly increasing `x`.
    pub fn new(x: &[f64], y: &[f64], method: Interpolation) -> FarmResult<Self> {
        Self::forward(x, y, method)
    }

    /// Build from `[x, y]` rows.
    pub fn from_rows(rows: &[[f64; 2]], method: Interpolation) -> FarmResult<Self> {
        let x: Vec<f64> = rows.iter().map(|r| r[0]).collect();
        let y: Vec<f64> = rows.iter().map(|r| r[1]).collect();
        Self::new(&x, &y, method)
    }

    fn forward(x: &[f64], y: &[f64], method: Interpolation) -> FarmResult<Self> {
        if x.len() != y.len() {
            return Err(FarmError::Domain(format!(
                "sample lengths differ: {} x values, {} y values",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(FarmError::Domain(format!(
                "at least 2 samples are required, got {}",
                x.len()
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(FarmError::Domain("samples must be finite".to_string()));
        }
        if let Some(k) = x.windows(2).position(|w| w[1] <= w[0]) {
            return Err(FarmError::Domain(format!(
                "x must be strictly increasing (x[{}] = {}, x[{}] = {})",
                k,
                x[k],
                k + 1,
                x[k + 1]
            )));
        }

        let peak = peak_index(y);
        let slopes = match method {
            Interpolation::Linear => Vec::new(),
            Interpolation::Pchip => pchip_slopes(x, y),
        };

        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            slopes,
            method,
            extrapolation: Extrapolation::Error,
            peak,
            rising: rising_knots(y, peak),
        })
    }

    /// Replace the extrapolation policy.
    pub fn with_extrapolation(mut self, extrapolation: Extrapolation) -> Self {
        self.extrapolation = extrapolation;
        self
    }

    /// Interpolated value at `x`, honouring the extrapolation policy.
    pub fn evaluate(&self, x: f64) -> FarmResult<f64> {
        let (lo, hi) = self.domain();
        if x.is_nan() {
            return Err(FarmError::Domain("cannot interpolate at NaN".to_string()));
        }
        if x < lo || x > hi {
            return match self.extrapolation {
                Extrapolation::Error => Err(FarmError::Domain(format!(
                    "{} is outside the interpolation domain [{}, {}]",
                    x, lo, hi
                ))),
                Extrapolation::Clamp => Ok(if x < lo { self.y[0] } else { self.y[self.y.len() - 1] }),
                Extrapolation::Fill(value) => Ok(value),
            };
        }
        Ok(self.interpolate(x))
    }

    /// Value at `x` clamped into the sample domain. Used where the caller has
    /// already restricted `x` to a validated envelope.
    pub(crate) fn evaluate_clamped(&self, x: f64) -> f64 {
        let (lo, hi) = self.domain();
        self.interpolate(x.clamp(lo, hi))
    }

    /// Inverse of the rising branch: the smallest `x <= x[peak]` with
    /// `evaluate(x) ≈ y`. Plateaus map to their first sample.
    pub fn invert_up_to_peak(&self, y: f64) -> FarmResult<f64> {
        let (lo, hi) = (self.y[0], self.y[self.peak]);
        if !(lo..=hi).contains(&y) {
            return Err(FarmError::Domain(format!(
                "{} is outside the invertible range [{}, {}]",
                y, lo, hi
            )));
        }

        // First rising knot at or above y.
        let j = self.rising.partition_point(|&k| self.y[k] < y);
        let knot = self.rising[j];
        if self.y[knot] == y || j == 0 {
            return Ok(self.x[knot]);
        }
        // Everything before `knot - 1` stays at or below the previous rising
        // knot, so the first crossing lies in the segment ending at `knot`.
        let k = knot - 1;
        let (y0, y1) = (self.y[k], self.y[k + 1]);
        let t = match self.method {
            Interpolation::Linear => (y - y0) / (y1 - y0),
            Interpolation::Pchip => self.solve_segment(k, y),
        };
        Ok(self.x[k] + t * (self.x[k + 1] - self.x[k]))
    }

    /// Bisection for `t` in `[0, 1]` on segment `k`, which is monotone
    /// non-decreasing between `y[k] < target < y[k + 1]`.
    fn solve_segment(&self, k: usize, target: f64) -> f64 {
        let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
        for _ in 0..MAX_BISECTIONS {
            let mid = 0.5 * (lo + hi);
            if self.segment_value(k, mid) < target {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo <= f64::EPSILON {
                break;
            }
        }
        0.5 * (lo + hi)
    }

    #[inline(always)]
    fn interpolate(&self, x: f64) -> f64 {
        let k = self.segment(x);
        let t = (x - self.x[k]) / (self.x[k + 1] - self.x[k]);
        self.segment_value(k, t)
    }

    /// Value on segment `k` at local coordinate `t` in `[0, 1]`.
    #[inline(always)]
    fn segment_value(&self, k: usize, t: f64) -> f64 {
        let (y0, y1) = (self.y[k], self.y[k + 1]);
        match self.method {
            Interpolation::Linear => y0 + t * (y1 - y0),
            Interpolation::Pchip => {
                let h = self.x[k + 1] - self.x[k];
                let t2 = t * t;
                let t3 = t2 * t;
                let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
                let h10 = t3 - 2.0 * t2 + t;
                let h01 = -2.0 * t3 + 3.0 * t2;
                let h11 = t3 - t2;
                h00 * y0 + h10 * h * self.slopes[k] + h01 * y1 + h11 * h * self.slopes[k + 1]
            }
        }
    }

    /// Index of the segment `[x[k], x[k+1]]` containing `x`.
    #[inline(always)]
    fn segment(&self, x: f64) -> usize {
        let upper = self.x.partition_point(|&xi| xi <= x);
        upper.saturating_sub(1).min(self.x.len() - 2)
    }

    /// `(x_min, x_max)`
    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    /// First index whose value reaches the table maximum.
    pub fn peak_index(&self) -> usize {
        self.peak
    }

    /// Value at the peak index.
    pub fn peak_value(&self) -> f64 {
        self.y[self.peak]
    }

    /// Sample abscissae and ordinates.
    pub fn samples(&self) -> (&[f64], &[f64]) {
        (&self.x, &self.y)
    }

    /// Interpolation scheme
    pub fn method(&self) -> Interpolation {
        self.method
    }
}

const MAX_BISECTIONS: usize = 64;

/// Indices in `0..=peak` whose value exceeds every earlier sample.
fn rising_knots(y: &[f64], peak: usize) -> Vec<usize> {
    let mut knots: Vec<usize> = Vec::with_capacity(peak + 1);
    for k in 0..=peak {
        if knots.last().is_none_or(|&last| y[k] > y[last]) {
            knots.push(k);
        }
    }
    knots
}

/// First index reaching the maximum within [`PEAK_TOLERANCE`].
fn peak_index(y: &[f64]) -> usize {
    let max = y.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let tol = PEAK_TOLERANCE * max.abs().max(1.0);
    y.iter().position(|&v| v >= max - tol).unwrap_or(y.len() - 1)
}

/// Fritsch–Carlson slopes with the three-point end conditions.
fn pchip_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let delta: Vec<f64> = (0..n - 1).map(|k| (y[k + 1] - y[k]) / h[k]).collect();

    if n == 2 {
        return vec![delta[0], delta[0]];
    }

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        if delta[k - 1] * delta[k] <= 0.0 {
            d[k] = 0.0;
        } else {
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            d[k] = (w1 + w2) / (w1 / delta[k - 1] + w2 / delta[k]);
        }
    }
    d[0] = edge_slope(h[0], h[1], delta[0], delta[1]);
    d[n - 1] = edge_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    d
}

fn edge_slope(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if d.signum() != m0.signum() || m0 == 0.0 {
        0.0
    } else if m0.signum() != m1.signum() && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}
