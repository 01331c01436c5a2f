//! Z-score normalization over the feature schema

use ndarray::{Array1, Array2, Axis};

use crate::error::SegmentError;
use crate::features::{FeatureVector, FEATURE_COUNT};

/// Standard deviations at or below this are treated as zero variance.
const MIN_STD: f64 = 1e-12;

/// Per-feature mean and population standard deviation.
///
/// Read-only after [`StandardScaler::fit`]; a retrain builds a new scaler.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl StandardScaler {
    /// Fit on a raw feature matrix with one row per sample.
    pub fn fit(features: &Array2<f64>) -> crate::Result<Self> {
        if features.ncols() != FEATURE_COUNT {
            return Err(SegmentError::DimensionMismatch {
                expected: FEATURE_COUNT,
                found: features.ncols(),
            });
        }
        if features.nrows() == 0 {
            return Err(SegmentError::InvalidCorpus("cannot fit scaler on zero rows".to_string()));
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(SegmentError::NonFinite("training corpus"));
        }

        let mean = features
            .mean_axis(Axis(0))
            .ok_or_else(|| SegmentError::InvalidCorpus("empty corpus".to_string()))?;
        let std = features.std_axis(Axis(0), 0.0);
        Ok(Self { mean, std })
    }

    /// Rebuild from persisted statistics.
    pub fn from_parts(mean: Vec<f64>, std: Vec<f64>) -> crate::Result<Self> {
        for stats in [&mean, &std] {
            if stats.len() != FEATURE_COUNT {
                return Err(SegmentError::DimensionMismatch {
                    expected: FEATURE_COUNT,
                    found: stats.len(),
                });
            }
        }
        if mean.iter().chain(std.iter()).any(|v| !v.is_finite()) || std.iter().any(|&s| s < 0.0) {
            return Err(SegmentError::NonFinite("scaler statistics"));
        }
        Ok(Self {
            mean: Array1::from(mean),
            std: Array1::from(std),
        })
    }

    fn is_constant(&self, col: usize) -> bool {
        self.std[col] <= MIN_STD
    }

    fn scale(&self, col: usize, x: f64) -> f64 {
        if self.is_constant(col) {
            x
        } else {
            (x - self.mean[col]) / self.std[col]
        }
    }

    fn unscale(&self, col: usize, z: f64) -> f64 {
        if self.is_constant(col) {
            z
        } else {
            z * self.std[col] + self.mean[col]
        }
    }

    pub fn transform_vector(&self, vector: &FeatureVector) -> Array1<f64> {
        Array1::from_iter(vector.values.iter().enumerate().map(|(col, &x)| self.scale(col, x)))
    }

    pub fn transform(&self, features: &Array2<f64>) -> crate::Result<Array2<f64>> {
        self.check_width(features.ncols())?;
        let mut scaled = features.clone();
        for (col, mut column) in scaled.axis_iter_mut(Axis(1)).enumerate() {
            column.mapv_inplace(|x| self.scale(col, x));
        }
        Ok(scaled)
    }

    pub fn inverse_transform(&self, scaled: &Array2<f64>) -> crate::Result<Array2<f64>> {
        self.check_width(scaled.ncols())?;
        let mut raw = scaled.clone();
        for (col, mut column) in raw.axis_iter_mut(Axis(1)).enumerate() {
            column.mapv_inplace(|z| self.unscale(col, z));
        }
        Ok(raw)
    }

    fn check_width(&self, found: usize) -> crate::Result<()> {
        if found == FEATURE_COUNT {
            Ok(())
        } else {
            Err(SegmentError::DimensionMismatch {
                expected: FEATURE_COUNT,
                found,
            })
        }
    }
}
