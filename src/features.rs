//! Feature schema and the survey-to-feature mapper
//!
//! [`Feature::ALL`] is the single definition of the model's input layout. The
//! mapper, the synthetic generator, the normalizer and the persisted state all
//! derive their column order and width from it, so adding a feature here forces
//! every consumer (and any persisted model) to follow.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SegmentError;
use crate::survey::{AgeGroup, Education, IncomeLevel, MaritalStatus, SurveyAnswers};

/// Bumped whenever [`Feature::ALL`] changes order or membership.
pub const SCHEMA_VERSION: u32 = 1;

/// Number of model input features.
pub const FEATURE_COUNT: usize = Feature::ALL.len();

/// Score assumed for a behavioral question that was left unanswered.
pub const DEFAULT_SCORE: f64 = 5.0;

/// One column of the model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Income,
    Age,
    TotalSpend,
    TotalPurchases,
    WebVisits,
    HasChildren,
    Recency,
}

impl Feature {
    /// Model input layout, in column order.
    pub const ALL: [Feature; 7] = [
        Feature::Income,
        Feature::Age,
        Feature::TotalSpend,
        Feature::TotalPurchases,
        Feature::WebVisits,
        Feature::HasChildren,
        Feature::Recency,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Income => "income",
            Feature::Age => "age",
            Feature::TotalSpend => "total_spend",
            Feature::TotalPurchases => "total_purchases",
            Feature::WebVisits => "web_visits",
            Feature::HasChildren => "has_children",
            Feature::Recency => "recency",
        }
    }

    /// Column index of this feature.
    pub fn index(self) -> usize {
        Feature::ALL
            .iter()
            .position(|&f| f == self)
            .unwrap_or_default()
    }
}

/// Column names in schema order.
pub fn feature_names() -> Vec<String> {
    Feature::ALL.iter().map(|f| f.name().to_string()).collect()
}

/// Model input vector in [`Feature::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reject vectors that cannot be meaningfully normalized.
    pub fn ensure_finite(&self) -> crate::Result<()> {
        if self.values.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(SegmentError::NonFinite("feature vector"))
        }
    }
}

/// Everything the mapper derives from a survey, including the auxiliary
/// education and marital codes that the model does not consume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappedSurvey {
    pub income: f64,
    pub age: f64,
    pub total_spend: f64,
    pub total_purchases: f64,
    pub web_visits: f64,
    pub has_children: f64,
    pub recency: f64,
    pub education: f64,
    pub marital_status: f64,
}

impl MappedSurvey {
    pub fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Income => self.income,
            Feature::Age => self.age,
            Feature::TotalSpend => self.total_spend,
            Feature::TotalPurchases => self.total_purchases,
            Feature::WebVisits => self.web_visits,
            Feature::HasChildren => self.has_children,
            Feature::Recency => self.recency,
        }
    }

    /// Select the model columns in schema order.
    pub fn to_feature_vector(&self) -> FeatureVector {
        FeatureVector {
            values: Feature::ALL.map(|f| self.value(f)),
        }
    }
}

fn lookup<T: Default>(field: &'static str, raw: Option<&str>, parse: fn(&str) -> Option<T>) -> T {
    match raw {
        None => T::default(),
        Some(value) => parse(value).unwrap_or_else(|| {
            debug!(field, value, "unrecognized survey answer, using default");
            T::default()
        }),
    }
}

/// Rescale a 1-10 answer to [0.1, 1.0]. Out-of-range answers are clamped;
/// non-finite ones are passed through and rejected later by the engine.
fn rescale(field: &'static str, raw: Option<f64>) -> f64 {
    let score = raw.unwrap_or(DEFAULT_SCORE);
    if score.is_finite() && !(1.0..=10.0).contains(&score) {
        debug!(field, score, "behavioral score out of range, clamping");
        return score.clamp(1.0, 10.0) / 10.0;
    }
    score / 10.0
}

/// Derive every mapped value from a survey.
pub fn map_survey(answers: &SurveyAnswers) -> MappedSurvey {
    let income = lookup("income_level", answers.income_level.as_deref(), IncomeLevel::parse).midpoint();
    let age = lookup("age_group", answers.age_group.as_deref(), AgeGroup::parse).representative_age();
    let education = lookup("education", answers.education.as_deref(), Education::parse).ordinal();
    let marital_status =
        lookup("marital_status", answers.marital_status.as_deref(), MaritalStatus::parse).code();

    let price = rescale("price_sensitivity", answers.price_sensitivity);
    let online = rescale("online_shopping", answers.online_shopping);
    let loyalty = rescale("brand_loyalty", answers.brand_loyalty);
    let innovation = rescale("innovation", answers.innovation);
    let social = rescale("social_influence", answers.social_influence);
    let quality = rescale("quality_importance", answers.quality_importance);

    MappedSurvey {
        income,
        age,
        total_spend: income * (0.5 + (1.0 - price) * quality * 0.5) * 0.01,
        total_purchases: online * 4.0 + loyalty * 3.0 + innovation * 2.0 + social,
        web_visits: online * 7.0 + social * 3.0 + innovation * 2.0,
        has_children: if answers.has_children.unwrap_or(false) { 1.0 } else { 0.0 },
        recency: 60.0 - (loyalty * 25.0 + online * 10.0 + quality * 5.0),
        education,
        marital_status,
    }
}

/// Map a survey to the model's input vector.
pub fn map(answers: &SurveyAnswers) -> FeatureVector {
    map_survey(answers).to_feature_vector()
}
