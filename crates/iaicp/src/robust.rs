//! Robust weighting and median/MAD scale estimation.
//!
//! Residuals are weighted with a Geman-McClure style kernel
//! `100 * 6 / (5 + ((r - median) / scale)^2)`, maximal at the median and decaying with
//! the normalized distance to it.

use serde::{Deserialize, Serialize};

use crate::error::IaIcpError;

/// Factor turning a median absolute deviation into a standard deviation estimate for
/// Gaussian residuals.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Added to every scale estimate so that it is strictly positive.
pub const SCALE_EPSILON: f64 = 1e-11;

/// Robust inlier weight of a residual.
///
/// # Arguments
///
/// * `residual` - The residual to weight.
/// * `median` - Center of the residual distribution.
/// * `scale` - Spread of the residual distribution, must be positive.
#[inline]
pub fn geman_mcclure_weight(residual: f64, median: f64, scale: f64) -> f64 {
    let u = (residual - median) / scale;
    100.0 * 6.0 / (5.0 + u * u)
}

/// Confidence of a depth measurement, the inverse of the axial noise model
/// `0.0012 + 0.0019 * (z - 0.4)^2` of structured-light range sensors.
#[inline]
pub fn depth_confidence(z: f64) -> f64 {
    1.0 / (0.0012 + 0.0019 * (z - 0.4) * (z - 0.4))
}

/// Sorts `values` in place and returns the element at index `n / 2`.
///
/// This is the median for odd lengths and the upper median for even lengths.
/// Returns `None` for an empty slice.
pub fn upper_median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    Some(values[values.len() / 2])
}

/// Location and scale of a residual population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobustStats {
    /// Median of the residuals.
    pub median: f64,
    /// Scaled median absolute deviation, always strictly positive.
    pub scale: f64,
}

impl RobustStats {
    /// Creates a new pair.
    pub fn new(median: f64, scale: f64) -> Self {
        Self { median, scale }
    }

    /// Estimates median and scale of a residual population.
    ///
    /// `scale = 1.4826 * median(|r - median|) + ε`.
    ///
    /// # Errors
    ///
    /// Returns [`IaIcpError::EmptyCorrespondenceSet`] when `residuals` is empty.
    pub fn estimate(residuals: &[f64]) -> Result<Self, IaIcpError> {
        let mut sorted = residuals.to_vec();
        let median = upper_median(&mut sorted).ok_or(IaIcpError::EmptyCorrespondenceSet)?;

        let mut deviations = sorted.iter().map(|r| (r - median).abs()).collect::<Vec<_>>();
        let mad = upper_median(&mut deviations).ok_or(IaIcpError::EmptyCorrespondenceSet)?;

        Ok(Self {
            median,
            scale: MAD_TO_SIGMA * mad + SCALE_EPSILON,
        })
    }

    /// Weight of a residual around the median.
    #[inline]
    pub fn weight(&self, residual: f64) -> f64 {
        geman_mcclure_weight(residual, self.median, self.scale)
    }

    /// Weight of a residual around zero, ignoring the median.
    #[inline]
    pub fn weight_from_zero(&self, residual: f64) -> f64 {
        geman_mcclure_weight(residual, 0.0, self.scale)
    }
}

/// The pair of statistics carried from one iteration to the next.
///
/// Geometric residuals are distances, so their weight is always centered at zero; the
/// geometric median is only kept for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationStats {
    /// Statistics of the 3D distances between matched points.
    pub geometric: RobustStats,
    /// Statistics of the intensity residuals between matched points.
    pub intensity: RobustStats,
}

impl Default for IterationStats {
    fn default() -> Self {
        Self {
            geometric: RobustStats::new(0.0, 0.02),
            intensity: RobustStats::new(0.0, 45.0),
        }
    }
}

impl IterationStats {
    /// Estimates both statistics from the residuals of the accepted correspondences.
    pub fn estimate(geometric: &[f64], intensity: &[f64]) -> Result<Self, IaIcpError> {
        Ok(Self {
            geometric: RobustStats::estimate(geometric)?,
            intensity: RobustStats::estimate(intensity)?,
        })
    }

    /// Combined inlier weight of a geometric and an intensity residual.
    #[inline]
    pub fn weight(&self, geometric_residual: f64, intensity_residual: f64) -> f64 {
        self.geometric.weight_from_zero(geometric_residual)
            * self.intensity.weight(intensity_residual)
    }
}
