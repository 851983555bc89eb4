//! Prediction result data structures

use serde::{Deserialize, Serialize};

/// Probability assigned to one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub class: i64,
    pub probability: f64,
}

/// Outcome of a single inference call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictionResult {
    /// Regression output
    Continuous { value: f64 },
    /// Predicted class plus the distribution over all classes, ordered by class
    Categorical {
        label: i64,
        distribution: Vec<ClassProbability>,
    },
}

impl PredictionResult {
    /// Probability of `class`, for categorical results.
    pub fn probability_of(&self, class: i64) -> Option<f64> {
        match self {
            PredictionResult::Continuous { .. } => None,
            PredictionResult::Categorical { distribution, .. } => distribution
                .iter()
                .find(|c| c.class == class)
                .map(|c| c.probability),
        }
    }

    pub fn label(&self) -> Option<i64> {
        match self {
            PredictionResult::Continuous { .. } => None,
            PredictionResult::Categorical { label, .. } => Some(*label),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            PredictionResult::Continuous { value } => Some(*value),
            PredictionResult::Categorical { .. } => None,
        }
    }
}

/// Percentage of the weighted input attributed to one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub percent: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorical_accessors() {
        let result = PredictionResult::Categorical {
            label: 1,
            distribution: vec![
                ClassProbability { class: 0, probability: 0.35 },
                ClassProbability { class: 1, probability: 0.65 },
            ],
        };

        assert_eq!(result.label(), Some(1));
        assert_eq!(result.value(), None);
        assert_eq!(result.probability_of(1), Some(0.65));
        assert_eq!(result.probability_of(2), None);
    }

    #[test]
    fn test_tagged_serialization() {
        let result = PredictionResult::Continuous { value: 73042.01 };
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["kind"], "continuous");
        assert_eq!(json["value"], 73042.01);
    }
}
