//! Synthetic bootstrap corpus
//!
//! No labeled customer data exists at startup, so the model is trained on a
//! corpus sampled from per-segment distributions over the feature schema.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Binomial, Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::SegmentError;
use crate::features::{Feature, FEATURE_COUNT};
use crate::profiles::SEGMENT_COUNT;

/// Default corpus size, split evenly across the segments.
pub const DEFAULT_SAMPLES: usize = 2240;

/// Default sampling seed.
pub const DEFAULT_SEED: u64 = 42;

/// Sampling distribution of one feature within one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureDistribution {
    Gaussian { mean: f64, std_dev: f64 },
    /// Count of successes in `trials` draws; `mean` is the expected count.
    Binomial { trials: u64, mean: f64 },
}

/// Distribution parameters for one synthetic segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentParams {
    pub income: (f64, f64),
    pub age: (f64, f64),
    pub spending: (f64, f64),
    pub purchases: (f64, f64),
    pub web_visits: (f64, f64),
    pub kids_mean: f64,
    pub recency: (f64, f64),
}

impl SegmentParams {
    pub fn distribution(&self, feature: Feature) -> FeatureDistribution {
        let gaussian = |(mean, std_dev): (f64, f64)| FeatureDistribution::Gaussian { mean, std_dev };
        match feature {
            Feature::Income => gaussian(self.income),
            Feature::Age => gaussian(self.age),
            Feature::TotalSpend => gaussian(self.spending),
            Feature::TotalPurchases => gaussian(self.purchases),
            Feature::WebVisits => gaussian(self.web_visits),
            Feature::HasChildren => FeatureDistribution::Binomial { trials: 2, mean: self.kids_mean },
            Feature::Recency => gaussian(self.recency),
        }
    }

    /// Expected raw feature vector of the segment.
    pub fn mean_vector(&self) -> [f64; FEATURE_COUNT] {
        Feature::ALL.map(|f| match self.distribution(f) {
            FeatureDistribution::Gaussian { mean, .. } => mean,
            FeatureDistribution::Binomial { mean, .. } => mean,
        })
    }
}

/// Reference parameters, indexed like the segment profiles.
pub const SEGMENT_PARAMS: [SegmentParams; SEGMENT_COUNT] = [
    // premium
    SegmentParams {
        income: (120_000.0, 20_000.0),
        age: (45.0, 5.0),
        spending: (2500.0, 300.0),
        purchases: (15.0, 2.0),
        web_visits: (4.0, 1.0),
        kids_mean: 0.2,
        recency: (10.0, 2.0),
    },
    // economical
    SegmentParams {
        income: (45_000.0, 8000.0),
        age: (50.0, 7.0),
        spending: (600.0, 150.0),
        purchases: (8.0, 1.5),
        web_visits: (5.0, 1.5),
        kids_mean: 1.5,
        recency: (30.0, 7.0),
    },
    // young professionals
    SegmentParams {
        income: (75_000.0, 12_000.0),
        age: (35.0, 4.0),
        spending: (1500.0, 250.0),
        purchases: (12.0, 2.0),
        web_visits: (8.0, 1.5),
        kids_mean: 0.5,
        recency: (20.0, 4.0),
    },
    // family
    SegmentParams {
        income: (60_000.0, 10_000.0),
        age: (40.0, 5.0),
        spending: (1200.0, 200.0),
        purchases: (10.0, 1.5),
        web_visits: (5.0, 1.0),
        kids_mean: 2.0,
        recency: (25.0, 5.0),
    },
    // occasional
    SegmentParams {
        income: (50_000.0, 20_000.0),
        age: (35.0, 10.0),
        spending: (500.0, 300.0),
        purchases: (4.0, 2.0),
        web_visits: (3.0, 1.5),
        kids_mean: 0.8,
        recency: (50.0, 15.0),
    },
];

/// Corpus generation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub seed: u64,
    pub n_samples: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            n_samples: DEFAULT_SAMPLES,
        }
    }
}

/// Generated training data.
#[derive(Debug, Clone)]
pub struct SyntheticCorpus {
    /// Raw (unnormalized) features, one row per sample, [`Feature::ALL`] columns
    pub features: Array2<f64>,
    /// Segment block each row was drawn from. Not used for fitting.
    pub block_labels: Array1<usize>,
}

impl SyntheticCorpus {
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }
}

/// One sampler per feature for a single segment.
enum Sampler {
    Gaussian(Normal<f64>),
    Binomial(Binomial),
}

impl Sampler {
    fn new(feature: Feature, distribution: FeatureDistribution) -> crate::Result<Self> {
        let invalid = |reason: String| SegmentError::Distribution {
            feature: feature.name(),
            reason,
        };
        match distribution {
            FeatureDistribution::Gaussian { mean, std_dev } => Normal::new(mean, std_dev)
                .map(Sampler::Gaussian)
                .map_err(|e| invalid(e.to_string())),
            FeatureDistribution::Binomial { trials, mean } => {
                if trials == 0 {
                    return Err(invalid("binomial needs at least one trial".to_string()));
                }
                Binomial::new(trials, mean / trials as f64)
                    .map(Sampler::Binomial)
                    .map_err(|e| invalid(e.to_string()))
            }
        }
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            Sampler::Gaussian(normal) => normal.sample(rng),
            Sampler::Binomial(binomial) => binomial.sample(rng) as f64,
        }
    }
}

/// Sample the reference corpus
///
/// # Arguments
/// * `config` - Seed and total number of rows
///
/// # Returns
/// * `SyntheticCorpus` with raw features and the generation block of every row
pub fn generate(config: &CorpusConfig) -> crate::Result<SyntheticCorpus> {
    generate_with(&SEGMENT_PARAMS, config)
}

/// Sample a corpus from arbitrary segment parameters
///
/// # Arguments
/// * `params` - One parameter set per segment, in block order
/// * `config` - Seed and total number of rows
///
/// # Returns
/// * `SyntheticCorpus` with `n_samples / params.len()` rows per segment
///
/// Each segment contributes `n_samples / segments` rows in segment order; the
/// remainder is dropped. Every value is folded to its absolute value so no
/// income, age or count comes out negative.
pub fn generate_with(params: &[SegmentParams], config: &CorpusConfig) -> crate::Result<SyntheticCorpus> {
    if params.is_empty() {
        return Err(SegmentError::InvalidCorpus("no segments to sample".to_string()));
    }
    let per_segment = config.n_samples / params.len();
    if per_segment == 0 {
        return Err(SegmentError::InvalidCorpus(format!(
            "{} samples cannot cover {} segments",
            config.n_samples,
            params.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let n_rows = per_segment * params.len();
    let mut features = Array2::<f64>::zeros((n_rows, FEATURE_COUNT));
    let mut block_labels = Array1::<usize>::zeros(n_rows);

    for (segment, segment_params) in params.iter().enumerate() {
        let samplers = Feature::ALL
            .iter()
            .map(|&f| Sampler::new(f, segment_params.distribution(f)))
            .collect::<Result<Vec<_>, _>>()?;

        let start = segment * per_segment;
        // Column-major per block so each feature draws a contiguous stream.
        for (col, sampler) in samplers.iter().enumerate() {
            for row in start..start + per_segment {
                features[[row, col]] = sampler.sample(&mut rng).abs();
            }
        }
        block_labels
            .slice_mut(ndarray::s![start..start + per_segment])
            .fill(segment);
    }

    Ok(SyntheticCorpus { features, block_labels })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_is_bit_identical() {
        let config = CorpusConfig { seed: 42, n_samples: DEFAULT_SAMPLES };
        let a = generate(&config).unwrap();
        let b = generate(&config).unwrap();
        assert_eq!(a.features.shape(), &[2240, FEATURE_COUNT]);
        let bits = |m: &Array2<f64>| m.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a.features), bits(&b.features));
        assert_eq!(a.block_labels, b.block_labels);
    }

    #[test]
    fn test_different_seed_differs() {
        let a = generate(&CorpusConfig { seed: 1, n_samples: 100 }).unwrap();
        let b = generate(&CorpusConfig { seed: 2, n_samples: 100 }).unwrap();
        assert_ne!(a.features, b.features);
    }

    #[test]
    fn test_blocks_are_ordered_and_even() {
        let corpus = generate(&CorpusConfig { seed: 7, n_samples: 2243 }).unwrap();
        assert_eq!(corpus.n_samples(), 2240);
        for (row, &label) in corpus.block_labels.iter().enumerate() {
            assert_eq!(label, row / 448);
        }
    }

    #[test]
    fn test_values_are_non_negative() {
        let corpus = generate(&CorpusConfig::default()).unwrap();
        assert!(corpus.features.iter().all(|&v| v >= 0.0));

        let kids = corpus.features.column(Feature::HasChildren.index());
        assert!(kids.iter().all(|&v| v == 0.0 || v == 1.0 || v == 2.0));
    }

    #[test]
    fn test_block_means_track_params() {
        let corpus = generate(&CorpusConfig::default()).unwrap();
        let income = Feature::Income.index();
        for (segment, params) in SEGMENT_PARAMS.iter().enumerate() {
            let rows: Vec<f64> = corpus
                .block_labels
                .iter()
                .zip(corpus.features.column(income))
                .filter(|&(&label, _)| label == segment)
                .map(|(_, &v)| v)
                .collect();
            let mean = rows.iter().sum::<f64>() / rows.len() as f64;
            // five standard errors
            let tolerance = 5.0 * params.income.1 / (rows.len() as f64).sqrt();
            assert!((mean - params.income.0).abs() < tolerance, "segment {segment} mean {mean}");
        }
    }

    #[test]
    fn test_too_few_samples_is_an_error() {
        let result = generate(&CorpusConfig { seed: 42, n_samples: 4 });
        assert!(matches!(result, Err(SegmentError::InvalidCorpus(_))));
    }

    #[test]
    fn test_invalid_distribution_is_reported() {
        let mut params = SEGMENT_PARAMS;
        params[2].age = (35.0, -1.0);
        let result = generate_with(&params, &CorpusConfig::default());
        assert!(matches!(result, Err(SegmentError::Distribution { feature: "age", .. })));
    }
}
