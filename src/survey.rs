//! Survey answers and the categorical brackets they are drawn from

use serde::{Deserialize, Serialize};

/// One respondent's answers to the 11-question survey.
///
/// Every field is optional: the service layer forwards whatever the client
/// submitted and the feature mapper fills the gaps with documented defaults.
/// Categorical answers are kept as the raw strings that were submitted so an
/// unknown value can be logged and defaulted instead of rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyAnswers {
    pub age_group: Option<String>,
    pub income_level: Option<String>,
    pub education: Option<String>,
    pub marital_status: Option<String>,
    pub has_children: Option<bool>,
    pub price_sensitivity: Option<f64>,
    pub online_shopping: Option<f64>,
    pub brand_loyalty: Option<f64>,
    pub innovation: Option<f64>,
    pub social_influence: Option<f64>,
    pub quality_importance: Option<f64>,
}

/// Normalize a free-form answer for table lookup.
fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase().replace(['_', ' '], "-")
}

/// Age bracket, ordered from youngest to oldest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum AgeGroup {
    From18To24,
    #[default]
    From25To34,
    From35To44,
    From45To54,
    Over55,
}

impl AgeGroup {
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_key(raw).as_str() {
            "18-24" => Some(AgeGroup::From18To24),
            "25-34" => Some(AgeGroup::From25To34),
            "35-44" => Some(AgeGroup::From35To44),
            "45-54" => Some(AgeGroup::From45To54),
            "55+" | "55-plus" | "55" => Some(AgeGroup::Over55),
            _ => None,
        }
    }

    /// Representative age in years for the bracket.
    pub fn representative_age(self) -> f64 {
        match self {
            AgeGroup::From18To24 => 21.0,
            AgeGroup::From25To34 => 30.0,
            AgeGroup::From35To44 => 40.0,
            AgeGroup::From45To54 => 50.0,
            AgeGroup::Over55 => 60.0,
        }
    }
}

/// Yearly income bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum IncomeLevel {
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl IncomeLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_key(raw).as_str() {
            "low" => Some(IncomeLevel::Low),
            "medium" => Some(IncomeLevel::Medium),
            "high" => Some(IncomeLevel::High),
            "very-high" | "veryhigh" => Some(IncomeLevel::VeryHigh),
            _ => None,
        }
    }

    /// Midpoint of the bracket in dollars per year.
    pub fn midpoint(self) -> f64 {
        match self {
            IncomeLevel::Low => 30_000.0,
            IncomeLevel::Medium => 50_000.0,
            IncomeLevel::High => 80_000.0,
            IncomeLevel::VeryHigh => 120_000.0,
        }
    }
}

/// Highest completed education.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Education {
    Secondary,
    #[default]
    Higher,
    MultipleHigher,
}

impl Education {
    /// Accepts the English keys and the labels used by the survey form.
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_key(raw).as_str() {
            "secondary" | "середня" => Some(Education::Secondary),
            "higher" | "вища" => Some(Education::Higher),
            "multiple-higher" | "кілька-вищих" => Some(Education::MultipleHigher),
            _ => None,
        }
    }

    pub fn ordinal(self) -> f64 {
        match self {
            Education::Secondary => 1.0,
            Education::Higher => 2.0,
            Education::MultipleHigher => 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaritalStatus {
    #[default]
    Single,
    Married,
    Divorced,
}

impl MaritalStatus {
    /// Accepts the English keys and the labels used by the survey form.
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_key(raw).as_str() {
            "single" | "неодружений" => Some(MaritalStatus::Single),
            "married" | "одружений" => Some(MaritalStatus::Married),
            "divorced" | "розлучений" => Some(MaritalStatus::Divorced),
            _ => None,
        }
    }

    pub fn code(self) -> f64 {
        match self {
            MaritalStatus::Single => 0.0,
            MaritalStatus::Married => 1.0,
            MaritalStatus::Divorced => 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_variants() {
        assert_eq!(IncomeLevel::parse("very_high"), Some(IncomeLevel::VeryHigh));
        assert_eq!(IncomeLevel::parse(" Very High "), Some(IncomeLevel::VeryHigh));
        assert_eq!(AgeGroup::parse("55+"), Some(AgeGroup::Over55));
        assert_eq!(Education::parse("Кілька вищих"), Some(Education::MultipleHigher));
        assert_eq!(Education::parse("multiple_higher"), Some(Education::MultipleHigher));
        assert_eq!(MaritalStatus::parse("Розлучений"), Some(MaritalStatus::Divorced));
        assert_eq!(IncomeLevel::parse("enormous"), None);
    }

    #[test]
    fn test_empty_json_deserializes() {
        let answers: SurveyAnswers = serde_json::from_str("{}").unwrap();
        assert_eq!(answers, SurveyAnswers::default());
    }

    #[test]
    fn test_json_with_integer_scores() {
        let answers: SurveyAnswers =
            serde_json::from_str(r#"{"income_level": "high", "brand_loyalty": 7, "has_children": true}"#)
                .unwrap();
        assert_eq!(answers.income_level.as_deref(), Some("high"));
        assert_eq!(answers.brand_loyalty, Some(7.0));
        assert_eq!(answers.has_children, Some(true));
    }
}
