//! SegmentForge: survey-driven customer segmentation using K-Means clustering
//!
//! A respondent's survey answers are mapped onto a 7-feature vector, z-score
//! normalized and assigned to the nearest of five segment centroids, together
//! with a bounded confidence score. The model is bootstrapped from a synthetic
//! corpus because no labeled customer data is available.

pub mod cli;
pub mod config;
pub mod confidence;
pub mod data;
pub mod engine;
pub mod error;
pub mod features;
pub mod model;
pub mod persist;
pub mod profiles;
pub mod scaler;
pub mod survey;

// Re-export public items for easier access
pub use cli::Args;
pub use config::EngineConfig;
pub use data::{generate, CorpusConfig, SyntheticCorpus};
pub use engine::{train, PredictionResult, SegmentationEngine, TrainedState, TrainingDiagnostics};
pub use error::SegmentError;
pub use features::{map, Feature, FeatureVector, FEATURE_COUNT};
pub use model::{fit_kmeans, ClusterModel, KMeansSettings};
pub use profiles::{SegmentProfile, PROFILES, SEGMENT_COUNT};
pub use scaler::StandardScaler;
pub use survey::SurveyAnswers;

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, SegmentError>;
