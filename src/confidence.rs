//! Distance-based confidence for a cluster assignment
//!
//! Confidence is a bounded proxy, not a calibrated probability: it compares the
//! distance to the assigned centroid against the spread of distances to all
//! centroids and maps the result onto [`MIN_CONFIDENCE`, `MAX_CONFIDENCE`].

use ndarray::ArrayView1;

use crate::error::SegmentError;
use crate::model::ClusterModel;

pub const MIN_CONFIDENCE: f64 = 0.70;
pub const MAX_CONFIDENCE: f64 = 0.97;
/// Width of the band the relative distance is scaled onto.
pub const CONFIDENCE_SPAN: f64 = 0.27;
/// Used when every centroid is equally far away.
pub const EQUIDISTANT_CONFIDENCE: f64 = 0.85;

/// Confidence from precomputed centroid distances.
pub fn score_distances(distances: &[f64], assigned: usize) -> crate::Result<f64> {
    let d_assigned = *distances.get(assigned).ok_or(SegmentError::UnknownCluster {
        index: assigned,
        k: distances.len(),
    })?;
    let d_min = distances.iter().copied().fold(f64::INFINITY, f64::min);
    let d_max = distances.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let confidence = if d_max > d_min {
        let raw = 1.0 - (d_assigned - d_min) / (d_max - d_min);
        MIN_CONFIDENCE + raw * CONFIDENCE_SPAN
    } else {
        EQUIDISTANT_CONFIDENCE
    };

    if !confidence.is_finite() {
        return Err(SegmentError::NonFinite("confidence"));
    }
    Ok(confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE))
}

/// Confidence that `point` belongs to `assigned`.
pub fn score(point: ArrayView1<f64>, assigned: usize, model: &ClusterModel) -> crate::Result<f64> {
    let distances = model.distances(point)?;
    score_distances(&distances, assigned)
}
