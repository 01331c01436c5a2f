//! Engine configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data::CorpusConfig;
use crate::model::KMeansSettings;

/// Points used for the training-time silhouette diagnostic.
pub const DEFAULT_SILHOUETTE_SAMPLE: usize = 500;

/// Everything needed to build (or reload) the segmentation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Where trained state is persisted. `None` keeps it in memory only.
    pub state_path: Option<PathBuf>,
    pub corpus: CorpusConfig,
    pub kmeans: KMeansSettings,
    pub silhouette_sample: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_path: None,
            corpus: CorpusConfig::default(),
            kmeans: KMeansSettings::default(),
            silhouette_sample: DEFAULT_SILHOUETTE_SAMPLE,
        }
    }
}

impl EngineConfig {
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.corpus.seed = seed;
        self
    }

    pub fn with_samples(mut self, n_samples: usize) -> Self {
        self.corpus.n_samples = n_samples;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_training() {
        let config = EngineConfig::default();
        assert_eq!(config.corpus.seed, 42);
        assert_eq!(config.corpus.n_samples, 2240);
        assert_eq!(config.kmeans.n_clusters, 5);
        assert_eq!(config.kmeans.n_runs, 20);
        assert_eq!(config.kmeans.max_iters, 300);
        assert!(config.state_path.is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"state_path": "/tmp/model.json", "corpus": {"seed": 7, "n_samples": 500}}"#)
                .unwrap();
        assert_eq!(config.state_path, Some(PathBuf::from("/tmp/model.json")));
        assert_eq!(config.corpus.seed, 7);
        assert_eq!(config.kmeans, KMeansSettings::default());
    }
}
