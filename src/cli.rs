//! Command-line interface definitions and argument parsing

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::EngineConfig;
use crate::survey::SurveyAnswers;

/// State file used when neither `--state` nor the config file names one.
pub const DEFAULT_STATE_PATH: &str = "segmentation_state.json";

/// Customer segmentation from survey answers using K-Means
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Where the trained model state is stored [default: segmentation_state.json]
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// JSON engine configuration; the flags below override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Seed for the synthetic training corpus and k-means initialization
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Size of the synthetic training corpus
    #[arg(long, global = true)]
    pub samples: Option<usize>,

    /// Number of k-means initializations
    #[arg(long, global = true)]
    pub n_runs: Option<usize>,

    /// Maximum iterations for a k-means run
    #[arg(long, global = true)]
    pub max_iters: Option<u64>,

    /// Tolerance for k-means convergence
    #[arg(long, global = true)]
    pub tolerance: Option<f64>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train a fresh model and persist it
    Train,
    /// Assign a survey to a segment
    Predict(SurveyArgs),
    /// Print the segment profiles and recommendations
    Profiles,
    /// Print diagnostics of the current model
    Info,
}

/// Survey answers, from a JSON file and/or individual flags.
#[derive(clap::Args, Debug, Default)]
pub struct SurveyArgs {
    /// JSON file with survey answers; flags override its fields
    #[arg(short, long)]
    pub answers: Option<PathBuf>,

    /// 18-24, 25-34, 35-44, 45-54 or 55+
    #[arg(long)]
    pub age_group: Option<String>,

    /// low, medium, high or very_high
    #[arg(long)]
    pub income_level: Option<String>,

    /// secondary, higher or multiple_higher
    #[arg(long)]
    pub education: Option<String>,

    /// single, married or divorced
    #[arg(long)]
    pub marital_status: Option<String>,

    #[arg(long)]
    pub has_children: Option<bool>,

    /// Scores from 1 to 10
    #[arg(long)]
    pub price_sensitivity: Option<f64>,
    #[arg(long)]
    pub online_shopping: Option<f64>,
    #[arg(long)]
    pub brand_loyalty: Option<f64>,
    #[arg(long)]
    pub innovation: Option<f64>,
    #[arg(long)]
    pub social_influence: Option<f64>,
    #[arg(long)]
    pub quality_importance: Option<f64>,
}

impl SurveyArgs {
    /// Merge the answers file (if any) with the individual flags.
    pub fn to_answers(&self) -> anyhow::Result<SurveyAnswers> {
        let mut answers = match &self.answers {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading survey answers from {}", path.display()))?;
                serde_json::from_str(&raw).with_context(|| format!("parsing survey answers in {}", path.display()))?
            }
            None => SurveyAnswers::default(),
        };

        fn set<T: Clone>(slot: &mut Option<T>, flag: &Option<T>) {
            if flag.is_some() {
                slot.clone_from(flag);
            }
        }
        set(&mut answers.age_group, &self.age_group);
        set(&mut answers.income_level, &self.income_level);
        set(&mut answers.education, &self.education);
        set(&mut answers.marital_status, &self.marital_status);
        set(&mut answers.has_children, &self.has_children);
        set(&mut answers.price_sensitivity, &self.price_sensitivity);
        set(&mut answers.online_shopping, &self.online_shopping);
        set(&mut answers.brand_loyalty, &self.brand_loyalty);
        set(&mut answers.innovation, &self.innovation);
        set(&mut answers.social_influence, &self.social_influence);
        set(&mut answers.quality_importance, &self.quality_importance);
        Ok(answers)
    }
}

impl Args {
    /// Build the engine configuration: defaults, then the config file, then flags.
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading engine config from {}", path.display()))?;
                serde_json::from_str(&raw).with_context(|| format!("parsing engine config in {}", path.display()))?
            }
            None => EngineConfig::default(),
        };

        if let Some(state) = &self.state {
            config.state_path = Some(state.clone());
        } else if config.state_path.is_none() {
            config.state_path = Some(PathBuf::from(DEFAULT_STATE_PATH));
        }
        if let Some(seed) = self.seed {
            config.corpus.seed = seed;
        }
        if let Some(samples) = self.samples {
            config.corpus.n_samples = samples;
        }
        if let Some(n_runs) = self.n_runs {
            config.kmeans.n_runs = n_runs;
        }
        if let Some(max_iters) = self.max_iters {
            config.kmeans.max_iters = max_iters;
        }
        if let Some(tolerance) = self.tolerance {
            config.kmeans.tolerance = tolerance;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_predict_flags() {
        let args = Args::try_parse_from([
            "segmentforge",
            "predict",
            "--income-level",
            "very_high",
            "--age-group",
            "45-54",
            "--has-children",
            "false",
            "--quality-importance",
            "10",
        ])
        .unwrap();

        let Command::Predict(survey) = &args.command else {
            panic!("expected predict, got {:?}", args.command);
        };
        let answers = survey.to_answers().unwrap();
        assert_eq!(answers.income_level.as_deref(), Some("very_high"));
        assert_eq!(answers.age_group.as_deref(), Some("45-54"));
        assert_eq!(answers.has_children, Some(false));
        assert_eq!(answers.quality_importance, Some(10.0));
        assert_eq!(answers.brand_loyalty, None);
    }

    #[test]
    fn test_flags_override_answers_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"income_level": "low", "brand_loyalty": 3}}"#).unwrap();
        let path = file.path().to_str().unwrap();

        let args =
            Args::try_parse_from(["segmentforge", "predict", "--answers", path, "--income-level", "high"]).unwrap();
        let Command::Predict(survey) = &args.command else {
            panic!("expected predict");
        };
        let answers = survey.to_answers().unwrap();
        assert_eq!(answers.income_level.as_deref(), Some("high"));
        assert_eq!(answers.brand_loyalty, Some(3.0));
    }

    #[test]
    fn test_engine_config_from_flags() {
        let args = Args::try_parse_from([
            "segmentforge",
            "train",
            "--state",
            "/tmp/model.json",
            "--seed",
            "7",
            "--samples",
            "1000",
            "--n-runs",
            "5",
        ])
        .unwrap();
        let config = args.engine_config().unwrap();
        assert_eq!(config.state_path, Some(PathBuf::from("/tmp/model.json")));
        assert_eq!(config.corpus.seed, 7);
        assert_eq!(config.corpus.n_samples, 1000);
        assert_eq!(config.kmeans.n_runs, 5);
        assert_eq!(config.kmeans.max_iters, 300);
    }

    #[test]
    fn test_state_path_from_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"state_path": "/var/lib/segments.json", "corpus": {{"seed": 9}}}}"#).unwrap();
        let config_path = file.path().to_str().unwrap();

        let args = Args::try_parse_from(["segmentforge", "info", "--config", config_path]).unwrap();
        let config = args.engine_config().unwrap();
        assert_eq!(config.state_path, Some(PathBuf::from("/var/lib/segments.json")));
        assert_eq!(config.corpus.seed, 9);

        let args =
            Args::try_parse_from(["segmentforge", "info", "--config", config_path, "--state", "/tmp/override.json"])
                .unwrap();
        assert_eq!(args.engine_config().unwrap().state_path, Some(PathBuf::from("/tmp/override.json")));
    }

    #[test]
    fn test_default_state_path() {
        let args = Args::try_parse_from(["segmentforge", "profiles"]).unwrap();
        assert_eq!(args.engine_config().unwrap().state_path, Some(PathBuf::from(DEFAULT_STATE_PATH)));
    }

    #[test]
    fn test_missing_subcommand_is_an_error() {
        assert!(Args::try_parse_from(["segmentforge"]).is_err());
    }
}
