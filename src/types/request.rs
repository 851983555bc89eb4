//! Prediction request and response structures exchanged with the form surface

use crate::catalog::PredictorKind;
use crate::types::prediction::{FeatureContribution, PredictionResult};
use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One form submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Which form was submitted
    #[serde(alias = "model")]
    pub predictor: PredictorKind,

    /// Field name to value, as entered
    #[serde(default, deserialize_with = "unique_inputs")]
    pub inputs: BTreeMap<String, f64>,

    /// Fill absent fields with the form defaults
    #[serde(default)]
    pub fill_defaults: bool,
}

/// Field map that refuses repeated keys instead of keeping the last one.
fn unique_inputs<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct UniqueInputs;

    impl<'de> Visitor<'de> for UniqueInputs {
        type Value = BTreeMap<String, f64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of field names to numbers")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut inputs = BTreeMap::new();
            while let Some((name, value)) = access.next_entry::<String, f64>()? {
                if inputs.contains_key(&name) {
                    return Err(serde::de::Error::custom(format!(
                        "field `{}` given more than once",
                        name
                    )));
                }
                inputs.insert(name, value);
            }
            Ok(inputs)
        }
    }

    deserializer.deserialize_map(UniqueInputs)
}

/// Answer to one submission, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub request_id: String,
    pub predictor: PredictorKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<PredictionResult>,

    /// Text shown to the user
    pub message: String,

    /// Additional context under the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributions: Vec<FeatureContribution>,

    /// Error kind when the request failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl PredictionResponse {
    pub fn success(predictor: PredictorKind, result: PredictionResult, message: String) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            predictor,
            result: Some(result),
            message,
            note: None,
            contributions: Vec::new(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(predictor: PredictorKind, kind: &str, message: String) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            predictor,
            result: None,
            message,
            note: None,
            contributions: Vec::new(),
            error: Some(kind.to_string()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_contributions(mut self, contributions: Vec<FeatureContribution>) -> Self {
        self.contributions = contributions;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parsing() {
        let request: PredictionRequest = serde_json::from_str(
            r#"{"predictor": "salary", "inputs": {"experience": 5.0}}"#,
        )
        .unwrap();
        assert_eq!(request.predictor, PredictorKind::Salary);
        assert_eq!(request.inputs.get("experience"), Some(&5.0));
        assert!(!request.fill_defaults);

        let request: PredictionRequest =
            serde_json::from_str(r#"{"model": "house_price", "fill_defaults": true}"#).unwrap();
        assert_eq!(request.predictor, PredictorKind::HousePrice);
        assert!(request.inputs.is_empty());
    }

    #[test]
    fn test_repeated_input_is_rejected() {
        let parsed: Result<PredictionRequest, _> = serde_json::from_str(
            r#"{"predictor": "salary", "inputs": {"experience": 5.0, "experience": 15.0}}"#,
        );
        let err = parsed.unwrap_err();
        assert!(err.to_string().contains("`experience` given more than once"));
    }

    #[test]
    fn test_unknown_predictor_is_rejected() {
        let parsed: Result<PredictionRequest, _> =
            serde_json::from_str(r#"{"predictor": "stock_price", "inputs": {}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_failure_response_serialization() {
        let response = PredictionResponse::failure(
            PredictorKind::Diabetes,
            "inference_failure",
            "Prediction failed: boom".to_string(),
        );
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["error"], "inference_failure");
        assert!(json.get("result").is_none());
        assert!(json.get("contributions").is_none());
        assert!(!response.is_success());
    }
}
