//! Error types for the segmentation engine

use thiserror::Error;

/// Errors raised while training, persisting or applying the segmentation model.
///
/// Survey mapping never fails (unknown values fall back to defaults), so there
/// is no variant for it. Prediction errors are caught by the engine and turned
/// into the fallback result; only training and persistence errors reach callers.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("invalid training corpus: {0}")]
    InvalidCorpus(String),

    #[error("invalid sampling distribution for {feature}: {reason}")]
    Distribution { feature: &'static str, reason: String },

    #[error("k-means fitting failed: {0}")]
    KMeans(#[from] linfa_clustering::KMeansError),

    #[error("invalid cluster configuration: {0}")]
    InvalidClusters(String),

    #[error("feature dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("cluster index {index} out of range for {k} clusters")]
    UnknownCluster { index: usize, k: usize },

    #[error("persisted state is corrupt: {0}")]
    StateCorrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
