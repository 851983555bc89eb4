//! The three predictors served by this crate and their feature schemas.
//!
//! Field order, ranges and defaults match the forms the models were trained for.
//! Changing the order of any schema here requires retraining the model.

use crate::schema::{FeatureSchema, FeatureSpec, InputLayout};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of output a model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTask {
    Regression,
    Classification,
}

/// Predictor served by the forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorKind {
    /// Salary from years of experience (simple linear regression)
    Salary,
    /// Diabetes outcome from eight clinical measurements (XGBoost classifier)
    Diabetes,
    /// House price from eighteen listing attributes (multiple linear regression)
    HousePrice,
}

impl PredictorKind {
    pub const ALL: [PredictorKind; 3] = [
        PredictorKind::Salary,
        PredictorKind::Diabetes,
        PredictorKind::HousePrice,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PredictorKind::Salary => "salary",
            PredictorKind::Diabetes => "diabetes",
            PredictorKind::HousePrice => "house_price",
        }
    }

    pub fn task(&self) -> ModelTask {
        match self {
            PredictorKind::Salary | PredictorKind::HousePrice => ModelTask::Regression,
            PredictorKind::Diabetes => ModelTask::Classification,
        }
    }

    /// Artifact file name used when the configuration does not name one.
    pub fn default_artifact(&self) -> &'static str {
        match self {
            PredictorKind::Salary => "simple_linear_regression.onnx",
            PredictorKind::Diabetes => "xgboost.onnx",
            PredictorKind::HousePrice => "MLR_3.onnx",
        }
    }

    pub fn schema(&self) -> FeatureSchema {
        match self {
            PredictorKind::Salary => salary_schema(),
            PredictorKind::Diabetes => diabetes_schema(),
            PredictorKind::HousePrice => house_price_schema(),
        }
    }
}

impl fmt::Display for PredictorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PredictorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PredictorKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown predictor `{}`", s))
    }
}

fn build(features: Vec<FeatureSpec>, layout: InputLayout) -> FeatureSchema {
    // The catalog schemas are static; a failure here is a bug in this file
    match FeatureSchema::new(features, layout) {
        Ok(schema) => schema,
        Err(e) => unreachable!("catalog schema is invalid: {}", e),
    }
}

/// Years of experience, positional `[[experience]]`.
pub fn salary_schema() -> FeatureSchema {
    build(
        vec![FeatureSpec::float("experience", 0.0, 20.0, 0.0)],
        InputLayout::Positional,
    )
}

/// Pima diabetes measurements, positional, in training column order.
pub fn diabetes_schema() -> FeatureSchema {
    build(
        vec![
            FeatureSpec::integer("Pregnancies", 0, 20, 1),
            FeatureSpec::integer("Glucose", 0, 200, 120),
            FeatureSpec::integer("BloodPressure", 0, 140, 70),
            FeatureSpec::integer("SkinThickness", 0, 100, 20),
            FeatureSpec::integer("Insulin", 0, 900, 80),
            FeatureSpec::float("BMI", 0.0, 70.0, 25.5),
            FeatureSpec::float("DiabetesPedigreeFunction", 0.0, 3.0, 0.5),
            FeatureSpec::integer("Age", 1, 100, 30),
        ],
        InputLayout::Positional,
    )
}

/// King County listing attributes, passed as a named-column table.
pub fn house_price_schema() -> FeatureSchema {
    build(
        vec![
            FeatureSpec::integer("bedrooms", 0, 20, 3),
            FeatureSpec::float("bathrooms", 0.0, 10.0, 2.0),
            FeatureSpec::integer("sqft_living", 0, 10_000, 1_800),
            FeatureSpec::integer("sqft_lot", 0, 100_000, 5_000),
            FeatureSpec::float("floors", 0.0, 5.0, 1.0),
            FeatureSpec::integer("waterfront", 0, 1, 0),
            FeatureSpec::integer("view", 0, 4, 0),
            FeatureSpec::integer("condition", 1, 5, 3),
            FeatureSpec::integer("grade", 1, 13, 7),
            FeatureSpec::integer("sqft_above", 0, 10_000, 1_500),
            FeatureSpec::integer("sqft_basement", 0, 5_000, 300),
            FeatureSpec::integer("yr_built", 1800, 2025, 1995),
            FeatureSpec::integer("yr_renovated", 0, 2025, 0),
            FeatureSpec::integer("zipcode", 98001, 98199, 98001),
            FeatureSpec::float("lat", 47.0, 48.0, 47.5112),
            FeatureSpec::float("long", -123.0, -121.0, -122.257),
            FeatureSpec::integer("sqft_living15", 0, 10_000, 1_500),
            FeatureSpec::integer("sqft_lot15", 0, 100_000, 5_000),
        ],
        InputLayout::NamedColumns,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_shapes() {
        assert_eq!(salary_schema().len(), 1);
        assert_eq!(diabetes_schema().len(), 8);
        assert_eq!(house_price_schema().len(), 18);

        assert_eq!(salary_schema().layout(), InputLayout::Positional);
        assert_eq!(diabetes_schema().layout(), InputLayout::Positional);
        assert_eq!(house_price_schema().layout(), InputLayout::NamedColumns);
    }

    #[test]
    fn test_diabetes_order() {
        assert_eq!(
            diabetes_schema().names(),
            vec![
                "Pregnancies",
                "Glucose",
                "BloodPressure",
                "SkinThickness",
                "Insulin",
                "BMI",
                "DiabetesPedigreeFunction",
                "Age",
            ]
        );
    }

    #[test]
    fn test_diabetes_example_record_is_valid() {
        let record = diabetes_schema().record([
            ("Pregnancies", 1.0),
            ("Glucose", 120.0),
            ("BloodPressure", 70.0),
            ("SkinThickness", 20.0),
            ("Insulin", 80.0),
            ("BMI", 25.5),
            ("DiabetesPedigreeFunction", 0.5),
            ("Age", 30.0),
        ]);
        assert!(record.is_ok());
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in PredictorKind::ALL {
            assert_eq!(kind.name().parse::<PredictorKind>(), Ok(kind));
        }
        assert!("stock_price".parse::<PredictorKind>().is_err());

        let json = serde_json::to_string(&PredictorKind::HousePrice).unwrap();
        assert_eq!(json, "\"house_price\"");
    }

    #[test]
    fn test_tasks() {
        assert_eq!(PredictorKind::Salary.task(), ModelTask::Regression);
        assert_eq!(PredictorKind::Diabetes.task(), ModelTask::Classification);
        assert_eq!(PredictorKind::HousePrice.task(), ModelTask::Regression);
    }
}
