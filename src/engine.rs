//! Segmentation engine: training, atomic state replacement and prediction
//!
//! Trained state is an immutable value behind an `Arc`. Requests clone the
//! `Arc` and compute against that snapshot without holding any lock, so a
//! retrain that publishes a new state never mixes the old scaler with the new
//! centroids for an in-flight request.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::confidence;
use crate::data;
use crate::error::SegmentError;
use crate::features::{self, FeatureVector};
use crate::model::{fit_kmeans, silhouette_sample, ClusterModel};
use crate::persist;
use crate::profiles::{
    self, Recommendations, SegmentProfile, PROFILES, SEGMENT_COUNT, UNDETERMINED_DESCRIPTION,
    UNDETERMINED_MARKETING, UNDETERMINED_NAME,
};
use crate::scaler::StandardScaler;
use crate::survey::SurveyAnswers;

pub use crate::config::EngineConfig;

/// Confidence reported with the fallback result.
pub const FALLBACK_CONFIDENCE: f64 = 0.75;

/// Training-time quality figures, logged and persisted with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDiagnostics {
    pub seed: u64,
    pub n_samples: usize,
    pub silhouette: f64,
    pub inertia: f64,
    pub cluster_sizes: Vec<usize>,
    pub trained_at: DateTime<Utc>,
}

/// Normalizer and centroids fitted together on one corpus.
#[derive(Debug, Clone)]
pub struct TrainedState {
    pub scaler: StandardScaler,
    pub model: ClusterModel,
    pub diagnostics: TrainingDiagnostics,
}

impl TrainedState {
    /// Cluster index and confidence for an already mapped vector.
    pub fn classify(&self, vector: &FeatureVector) -> crate::Result<(usize, f64)> {
        vector.ensure_finite()?;
        let normalized = self.scaler.transform_vector(vector);
        let cluster = self.model.predict(normalized.view())?;
        let confidence = confidence::score(normalized.view(), cluster, &self.model)?;
        Ok((cluster, confidence))
    }

    /// Full prediction without the fallback safety net.
    pub fn predict(&self, answers: &SurveyAnswers) -> crate::Result<PredictionResult> {
        let vector = features::map(answers);
        let (cluster, confidence) = self.classify(&vector)?;
        let profile = profiles::profile(cluster).ok_or(SegmentError::UnknownCluster {
            index: cluster,
            k: SEGMENT_COUNT,
        })?;
        Ok(PredictionResult::from_profile(profile, confidence))
    }
}

/// Segment assigned to one survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub cluster_id: usize,
    pub cluster_name: String,
    pub description: String,
    pub confidence: f64,
    pub marketing_strategy: String,
}

impl PredictionResult {
    pub fn from_profile(profile: &SegmentProfile, confidence: f64) -> Self {
        Self {
            cluster_id: profile.id,
            cluster_name: profile.name.to_string(),
            description: profile.description.to_string(),
            confidence,
            marketing_strategy: profile.marketing.to_string(),
        }
    }

    /// Result returned when a survey could not be classified.
    pub fn undetermined() -> Self {
        Self {
            cluster_id: 0,
            cluster_name: UNDETERMINED_NAME.to_string(),
            description: UNDETERMINED_DESCRIPTION.to_string(),
            confidence: FALLBACK_CONFIDENCE,
            marketing_strategy: UNDETERMINED_MARKETING.to_string(),
        }
    }

    pub fn is_undetermined(&self) -> bool {
        self.cluster_name == UNDETERMINED_NAME
    }
}

/// Generate the corpus, fit the scaler and the clusters, align cluster
/// indices with the segment profiles and collect diagnostics
///
/// # Arguments
/// * `config` - Corpus, k-means and diagnostic settings
///
/// # Returns
/// * `TrainedState` ready to serve predictions and to be persisted
pub fn train(config: &EngineConfig) -> crate::Result<TrainedState> {
    if config.kmeans.n_clusters != SEGMENT_COUNT {
        return Err(SegmentError::InvalidClusters(format!(
            "the engine serves {SEGMENT_COUNT} segments, got k={}",
            config.kmeans.n_clusters
        )));
    }

    let corpus = data::generate(&config.corpus)?;
    debug!(rows = corpus.n_samples(), seed = config.corpus.seed, "generated synthetic corpus");

    let scaler = StandardScaler::fit(&corpus.features)?;
    let normalized = scaler.transform(&corpus.features)?;

    let model = fit_kmeans(&normalized, &config.kmeans, config.corpus.seed)?
        .align_to_blocks(&normalized, &corpus.block_labels)?;

    let labels = model.predict_batch(&normalized)?;
    let inertia = model.inertia(&normalized, &labels);
    let cluster_sizes = model.cluster_sizes(&labels);
    let silhouette = silhouette_sample(&normalized, &labels, model.n_clusters(), config.silhouette_sample);
    info!(silhouette, inertia, ?cluster_sizes, "model trained");

    Ok(TrainedState {
        scaler,
        model,
        diagnostics: TrainingDiagnostics {
            seed: config.corpus.seed,
            n_samples: corpus.n_samples(),
            silhouette,
            inertia,
            cluster_sizes,
            trained_at: Utc::now(),
        },
    })
}

/// Save after a successful training run. A write failure keeps the new model
/// in memory; the next startup will simply train again.
fn persist_to(config: &EngineConfig, state: &TrainedState) {
    if let Some(path) = config.state_path.as_deref() {
        if let Err(e) = persist::save(path, state) {
            warn!(path = %path.display(), error = %e, "failed to persist trained state");
        }
    }
}

/// Shared entry point for the service layer.
pub struct SegmentationEngine {
    state: RwLock<Arc<TrainedState>>,
    config: RwLock<EngineConfig>,
    /// Held for the whole of a retrain, so there is only ever one writer.
    retrain_lock: Mutex<()>,
}

impl SegmentationEngine {
    /// Load persisted state, or train a fresh model when there is none or it
    /// cannot be used. A training failure here is fatal: there is no previous
    /// model to fall back to.
    pub fn open(config: EngineConfig) -> crate::Result<Self> {
        if let Some(path) = config.state_path.as_deref() {
            match persist::load(path) {
                Ok(Some(state)) => {
                    info!(
                        path = %path.display(),
                        trained_at = %state.diagnostics.trained_at,
                        "loaded trained state"
                    );
                    return Ok(Self::with_state(config, state));
                }
                Ok(None) => info!(path = %path.display(), "no trained state on disk, training"),
                Err(e) => warn!(path = %path.display(), error = %e, "persisted state unusable, retraining"),
            }
        }

        let state = train(&config)?;
        persist_to(&config, &state);
        Ok(Self::with_state(config, state))
    }

    /// Serve an already trained state without touching disk.
    pub fn with_state(config: EngineConfig, state: TrainedState) -> Self {
        Self {
            state: RwLock::new(Arc::new(state)),
            config: RwLock::new(config),
            retrain_lock: Mutex::new(()),
        }
    }

    /// The state requests are currently served from.
    pub fn snapshot(&self) -> Arc<TrainedState> {
        Arc::clone(&self.state.read())
    }

    /// Config of the last successful (re)train. Does not wait for a retrain
    /// in progress.
    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    /// Classify a survey. Never fails: any error (or panic) while mapping or
    /// predicting is logged and answered with [`PredictionResult::undetermined`].
    pub fn predict_segment(&self, answers: &SurveyAnswers) -> PredictionResult {
        let state = self.snapshot();
        match panic::catch_unwind(AssertUnwindSafe(|| state.predict(answers))) {
            Ok(Ok(result)) => {
                debug!(
                    cluster = result.cluster_id,
                    confidence = result.confidence,
                    "survey classified"
                );
                result
            }
            Ok(Err(e)) => {
                warn!(error = %e, "prediction failed, returning fallback segment");
                PredictionResult::undetermined()
            }
            Err(_) => {
                error!("prediction panicked, returning fallback segment");
                PredictionResult::undetermined()
            }
        }
    }

    /// Regenerate the corpus and replace the model with the current config.
    pub fn retrain(&self) -> crate::Result<()> {
        let _writer = self.retrain_lock.lock();
        let config = self.config();
        self.retrain_locked(&config)
    }

    /// Retrain with a new config, which is kept for later retrains only if
    /// training succeeds.
    pub fn retrain_with(&self, new_config: EngineConfig) -> crate::Result<()> {
        let _writer = self.retrain_lock.lock();
        self.retrain_locked(&new_config)?;
        *self.config.write() = new_config;
        Ok(())
    }

    fn retrain_locked(&self, config: &EngineConfig) -> crate::Result<()> {
        info!(seed = config.corpus.seed, samples = config.corpus.n_samples, "retraining");
        let state = Arc::new(train(config)?);
        *self.state.write() = Arc::clone(&state);
        persist_to(config, &state);
        Ok(())
    }

    pub fn profiles(&self) -> &'static [SegmentProfile] {
        &PROFILES
    }

    pub fn recommendations(&self, cluster_id: usize) -> Option<&'static Recommendations> {
        profiles::profile(cluster_id).map(|p| &p.recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CorpusConfig;

    fn small_config(seed: u64) -> EngineConfig {
        EngineConfig {
            corpus: CorpusConfig { seed, n_samples: 500 },
            ..Default::default()
        }
    }

    #[test]
    fn test_train_reports_diagnostics() {
        let state = train(&small_config(42)).unwrap();
        assert_eq!(state.model.n_clusters(), SEGMENT_COUNT);
        assert_eq!(state.diagnostics.n_samples, 500);
        assert_eq!(state.diagnostics.cluster_sizes.iter().sum::<usize>(), 500);
        assert!(state.diagnostics.silhouette > 0.0 && state.diagnostics.silhouette <= 1.0);
        assert!(state.diagnostics.inertia.is_finite());
    }

    #[test]
    fn test_train_rejects_wrong_k() {
        let mut config = small_config(42);
        config.kmeans.n_clusters = 4;
        assert!(matches!(train(&config), Err(SegmentError::InvalidClusters(_))));
    }

    #[test]
    fn test_non_finite_answers_fall_back() {
        let engine = SegmentationEngine::with_state(small_config(1), train(&small_config(1)).unwrap());
        let answers = SurveyAnswers {
            price_sensitivity: Some(f64::INFINITY),
            ..Default::default()
        };
        let result = engine.predict_segment(&answers);
        assert!(result.is_undetermined());
        assert_eq!(result.cluster_id, 0);
        assert_eq!(result.confidence, FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_empty_answers_are_classified() {
        let engine = SegmentationEngine::with_state(small_config(1), train(&small_config(1)).unwrap());
        let result = engine.predict_segment(&SurveyAnswers::default());
        assert!(!result.is_undetermined());
        assert!(result.cluster_id < SEGMENT_COUNT);
        assert!((0.70..=0.97).contains(&result.confidence));
    }

    #[test]
    fn test_retrain_with_failing_config_keeps_old_state() {
        let engine = SegmentationEngine::with_state(small_config(1), train(&small_config(1)).unwrap());
        let before = engine.snapshot();

        let broken = EngineConfig {
            corpus: CorpusConfig { seed: 1, n_samples: 3 },
            ..Default::default()
        };
        assert!(engine.retrain_with(broken).is_err());
        assert!(Arc::ptr_eq(&before, &engine.snapshot()));
        assert_eq!(engine.config().corpus.n_samples, 500);
    }

    #[test]
    fn test_config_readable_during_retrain() {
        let engine = SegmentationEngine::with_state(small_config(1), train(&small_config(1)).unwrap());
        let _writer = engine.retrain_lock.lock();
        assert_eq!(engine.config().corpus.seed, 1);
        assert_eq!(engine.config().corpus.n_samples, 500);
    }

    #[test]
    fn test_recommendations_lookup() {
        let engine = SegmentationEngine::with_state(small_config(1), train(&small_config(1)).unwrap());
        assert_eq!(engine.profiles().len(), SEGMENT_COUNT);
        assert!(engine.recommendations(2).is_some());
        assert!(engine.recommendations(9).is_none());
    }
}
