//! Linear and logistic models stored as JSON.
//!
//! A small, dependency-free artifact format for models whose parameters are just a
//! coefficient vector and an intercept:
//!
//! ```json
//! {
//!   "name": "salary",
//!   "task": "regression",
//!   "feature_names": ["experience"],
//!   "coefficients": [9449.96],
//!   "intercept": 25792.2
//! }
//! ```

use super::{ExpectedFeatures, Model};
use crate::catalog::ModelTask;
use crate::schema::FeatureRow;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the linear score is turned into an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearTask {
    /// `intercept + w·x`
    Regression,
    /// Binary logistic regression: `p(positive) = sigmoid(intercept + w·x)`
    Logistic,
}

fn default_classes() -> [i64; 2] {
    [0, 1]
}

fn default_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default)]
    pub name: String,

    pub task: LinearTask,

    /// Names in training order; when present the adapter checks them against the schema
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,

    pub coefficients: Vec<f64>,

    #[serde(default)]
    pub intercept: f64,

    /// `[negative, positive]` class labels for logistic models
    #[serde(default = "default_classes")]
    pub classes: [i64; 2],

    /// Decision threshold on the positive-class probability
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default)]
    pub feature_importances: Option<Vec<f64>>,
}

impl LinearModel {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut model: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse linear model {}", path.display()))?;

        if model.name.is_empty() {
            model.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "linear".to_string());
        }

        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<()> {
        if self.coefficients.is_empty() {
            anyhow::bail!("coefficients must not be empty");
        }
        if self.coefficients.iter().any(|c| !c.is_finite()) || !self.intercept.is_finite() {
            anyhow::bail!("coefficients and intercept must be finite");
        }
        if let Some(names) = &self.feature_names {
            if names.len() != self.coefficients.len() {
                anyhow::bail!(
                    "{} feature names for {} coefficients",
                    names.len(),
                    self.coefficients.len()
                );
            }
        }
        if let Some(importances) = &self.feature_importances {
            if importances.len() != self.coefficients.len() {
                anyhow::bail!(
                    "{} feature importances for {} coefficients",
                    importances.len(),
                    self.coefficients.len()
                );
            }
        }
        if self.task == LinearTask::Logistic {
            if self.classes[0] == self.classes[1] {
                anyhow::bail!("classes must be distinct");
            }
            if !(0.0..=1.0).contains(&self.threshold) {
                anyhow::bail!("threshold {} is outside [0, 1]", self.threshold);
            }
        }
        Ok(())
    }

    fn score(&self, row: &FeatureRow) -> Result<f64> {
        if let (Some(expected), Some(got)) = (&self.feature_names, row.names()) {
            if expected.iter().map(String::as_str).ne(got.iter().copied()) {
                anyhow::bail!("column names {:?} do not match training names {:?}", got, expected);
            }
        }

        let values = row.values();
        if values.len() != self.coefficients.len() {
            anyhow::bail!(
                "X has {} features, but model is expecting {} features as input",
                values.len(),
                self.coefficients.len()
            );
        }

        let score = self.intercept
            + self
                .coefficients
                .iter()
                .zip(&values)
                .map(|(w, x)| w * x)
                .sum::<f64>();

        if !score.is_finite() {
            anyhow::bail!("linear score overflowed");
        }
        Ok(score)
    }

    fn positive_probability(&self, row: &FeatureRow) -> Result<f64> {
        let z = self.score(row)?;
        Ok(1.0 / (1.0 + (-z).exp()))
    }
}

impl Model for LinearModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn task(&self) -> ModelTask {
        match self.task {
            LinearTask::Regression => ModelTask::Regression,
            LinearTask::Logistic => ModelTask::Classification,
        }
    }

    fn expected_features(&self) -> ExpectedFeatures {
        match &self.feature_names {
            Some(names) => ExpectedFeatures::Names(names.clone()),
            None => ExpectedFeatures::Width(self.coefficients.len()),
        }
    }

    fn predict(&self, row: &FeatureRow) -> Result<f64> {
        match self.task {
            LinearTask::Regression => self.score(row),
            LinearTask::Logistic => {
                let p = self.positive_probability(row)?;
                let [negative, positive] = self.classes;
                let label = if p >= self.threshold { positive } else { negative };
                Ok(label as f64)
            }
        }
    }

    fn predict_proba(&self, row: &FeatureRow) -> Result<Vec<(i64, f64)>> {
        if self.task != LinearTask::Logistic {
            anyhow::bail!("regression model `{}` has no class probabilities", self.name);
        }
        let p = self.positive_probability(row)?;
        let [negative, positive] = self.classes;

        let mut distribution = vec![(negative, 1.0 - p), (positive, p)];
        distribution.sort_by_key(|(class, _)| *class);
        Ok(distribution)
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        self.feature_importances.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn salary() -> LinearModel {
        LinearModel {
            name: "salary".to_string(),
            task: LinearTask::Regression,
            feature_names: None,
            coefficients: vec![9000.0],
            intercept: 25000.0,
            classes: default_classes(),
            threshold: 0.5,
            feature_importances: None,
        }
    }

    fn logistic() -> LinearModel {
        LinearModel {
            name: "diabetes".to_string(),
            task: LinearTask::Logistic,
            feature_names: None,
            coefficients: vec![0.05, 0.1],
            intercept: -8.0,
            classes: default_classes(),
            threshold: 0.5,
            feature_importances: Some(vec![0.7, 0.3]),
        }
    }

    #[test]
    fn test_regression_score() {
        let model = salary();
        let value = model.predict(&FeatureRow::Positional(vec![5.0])).unwrap();
        assert!((value - 70000.0).abs() < 1e-9);
        assert!(model.predict_proba(&FeatureRow::Positional(vec![5.0])).is_err());
    }

    #[test]
    fn test_logistic_distribution() {
        let model = logistic();
        let row = FeatureRow::Positional(vec![120.0, 25.0]);

        // z = -8 + 6 + 2.5 = 0.5
        let dist = model.predict_proba(&row).unwrap();
        assert_eq!(dist[0].0, 0);
        assert_eq!(dist[1].0, 1);
        assert!((dist[0].1 + dist[1].1 - 1.0).abs() < 1e-12);
        assert!(dist[1].1 > 0.5);
        assert_eq!(model.predict(&row).unwrap(), 1.0);
    }

    #[test]
    fn test_width_mismatch_is_an_error() {
        let model = logistic();
        let err = model
            .predict(&FeatureRow::Positional(vec![1.0]))
            .unwrap_err();
        assert!(err.to_string().contains("expecting 2 features"));
    }

    #[test]
    fn test_named_columns_must_match() {
        let mut model = salary();
        model.feature_names = Some(vec!["experience".to_string()]);

        let ok = FeatureRow::Named(vec![("experience".to_string(), 2.0)]);
        let bad = FeatureRow::Named(vec![("years".to_string(), 2.0)]);
        assert!(model.predict(&ok).is_ok());
        assert!(model.predict(&bad).is_err());
        assert_eq!(
            model.expected_features(),
            ExpectedFeatures::Names(vec!["experience".to_string()])
        );
    }

    #[test]
    fn test_validate_rejects_bad_artifacts() {
        let mut model = salary();
        model.coefficients.clear();
        assert!(model.validate().is_err());

        let mut model = logistic();
        model.classes = [1, 1];
        assert!(model.validate().is_err());

        let mut model = logistic();
        model.feature_importances = Some(vec![1.0]);
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_parse_minimal_json() {
        let model: LinearModel = serde_json::from_str(
            r#"{"task": "logistic", "coefficients": [1.0, -1.0], "intercept": 0.0}"#,
        )
        .unwrap();
        assert_eq!(model.classes, [0, 1]);
        assert_eq!(model.threshold, 0.5);
        assert_eq!(model.expected_features(), ExpectedFeatures::Width(2));
    }
}
