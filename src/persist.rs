//! Versioned on-disk format for trained state
//!
//! The file is plain JSON so other implementations can read or validate it:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "schema_version": 1,
//!   "feature_names": ["income", "age", ...],
//!   "dimensionality": 7,
//!   "k": 5,
//!   "mean": [...], "std": [...],
//!   "centroids": [[...], ...],
//!   "diagnostics": { ... }
//! }
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::{TrainedState, TrainingDiagnostics};
use crate::error::SegmentError;
use crate::features::{feature_names, FEATURE_COUNT, SCHEMA_VERSION};
use crate::model::ClusterModel;
use crate::profiles::SEGMENT_COUNT;
use crate::scaler::StandardScaler;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub format_version: u32,
    pub schema_version: u32,
    pub feature_names: Vec<String>,
    pub dimensionality: usize,
    pub k: usize,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
    pub centroids: Vec<Vec<f64>>,
    pub diagnostics: TrainingDiagnostics,
}

impl PersistedState {
    pub fn from_trained(state: &TrainedState) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            schema_version: SCHEMA_VERSION,
            feature_names: feature_names(),
            dimensionality: FEATURE_COUNT,
            k: state.model.n_clusters(),
            mean: state.scaler.mean.to_vec(),
            std: state.scaler.std.to_vec(),
            centroids: state.model.centroids().outer_iter().map(|row| row.to_vec()).collect(),
            diagnostics: state.diagnostics.clone(),
        }
    }

    /// Validate against the compiled-in schema and rebuild the trained state.
    pub fn into_trained(self) -> crate::Result<TrainedState> {
        let corrupt = |msg: String| Err(SegmentError::StateCorrupt(msg));
        if self.format_version != FORMAT_VERSION {
            return corrupt(format!("unsupported format version {}", self.format_version));
        }
        if self.schema_version != SCHEMA_VERSION || self.feature_names != feature_names() {
            return corrupt(format!(
                "feature schema v{} {:?} does not match v{SCHEMA_VERSION}",
                self.schema_version, self.feature_names
            ));
        }
        if self.dimensionality != FEATURE_COUNT {
            return corrupt(format!("dimensionality {} != {FEATURE_COUNT}", self.dimensionality));
        }
        if self.k != SEGMENT_COUNT || self.centroids.len() != self.k {
            return corrupt(format!("expected {SEGMENT_COUNT} centroids, k={} rows={}", self.k, self.centroids.len()));
        }
        if let Some(row) = self.centroids.iter().find(|row| row.len() != FEATURE_COUNT) {
            return corrupt(format!("centroid of width {} in a {FEATURE_COUNT}-feature model", row.len()));
        }

        let flat: Vec<f64> = self.centroids.into_iter().flatten().collect();
        let centroids = Array2::from_shape_vec((self.k, FEATURE_COUNT), flat)
            .map_err(|e| SegmentError::StateCorrupt(e.to_string()))?;
        let scaler = StandardScaler::from_parts(self.mean, self.std)
            .map_err(|e| SegmentError::StateCorrupt(e.to_string()))?;
        let model =
            ClusterModel::from_centroids(centroids).map_err(|e| SegmentError::StateCorrupt(e.to_string()))?;

        Ok(TrainedState {
            scaler,
            model,
            diagnostics: self.diagnostics,
        })
    }
}

/// Write state next to `path` and rename it into place, so a crash never
/// leaves a half-written file behind.
pub fn save(path: &Path, state: &TrainedState) -> crate::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(&PersistedState::from_trained(state))?;

    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    info!(path = %path.display(), bytes = json.len(), "saved trained state");
    Ok(())
}

/// Load state from `path`. `Ok(None)` means there is no file yet.
pub fn load(path: &Path) -> crate::Result<Option<TrainedState>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no persisted state");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let persisted: PersistedState =
        serde_json::from_slice(&bytes).map_err(|e| SegmentError::StateCorrupt(e.to_string()))?;
    persisted.into_trained().map(Some)
}
