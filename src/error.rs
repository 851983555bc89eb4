//! Error types for schema validation, artifact loading and inference

use std::path::PathBuf;
use thiserror::Error;

/// Why an input record does not fit a feature schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("unexpected field `{0}`")]
    UnexpectedField(String),

    #[error("field `{0}` given more than once")]
    DuplicateField(String),

    #[error("field `{name}` = {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("field `{name}` = {value} must be a whole number")]
    NotInteger { name: String, value: f64 },

    #[error("field `{name}` is not a finite number")]
    NotFinite { name: String },

    #[error("model `{model}` expects {expected} features, schema declares {declared}")]
    WidthMismatch {
        model: String,
        expected: usize,
        declared: usize,
    },

    #[error("model `{model}` expects feature `{expected}` at position {position}, schema declares `{declared}`")]
    OrderMismatch {
        model: String,
        position: usize,
        expected: String,
        declared: String,
    },

    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

/// Errors surfaced by the inference adapter and model loading.
#[derive(Error, Debug)]
pub enum PredictError {
    /// The caller supplied fields that do not match the schema, or the schema does
    /// not match what the model was trained on.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(#[from] SchemaViolation),

    /// A model artifact could not be loaded at startup.
    #[error("failed to load model artifact {}: {source:#}", .path.display())]
    ArtifactLoadFailure {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The model's own prediction call failed.
    #[error("inference failed for model `{model}`: {source:#}")]
    InferenceFailure {
        model: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PredictError {
    pub fn artifact(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::ArtifactLoadFailure {
            path: path.into(),
            source,
        }
    }

    pub fn inference(model: impl Into<String>, source: anyhow::Error) -> Self {
        Self::InferenceFailure {
            model: model.into(),
            source,
        }
    }

    /// Short, stable name of the error kind (used in responses and metrics).
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::SchemaMismatch(_) => "schema_mismatch",
            PredictError::ArtifactLoadFailure { .. } => "artifact_load_failure",
            PredictError::InferenceFailure { .. } => "inference_failure",
        }
    }
}

pub type Result<T> = std::result::Result<T, PredictError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err: PredictError = SchemaViolation::MissingField("Age".to_string()).into();
        assert_eq!(err.kind(), "schema_mismatch");
        assert_eq!(err.to_string(), "schema mismatch: missing field `Age`");

        let err = PredictError::inference("xgboost", anyhow::anyhow!("shape [1, 7]"));
        assert_eq!(err.kind(), "inference_failure");
        assert!(err.to_string().contains("shape [1, 7]"));
    }

    #[test]
    fn test_artifact_error_keeps_cause() {
        let err = PredictError::artifact("models/MLR_3.onnx", anyhow::anyhow!("file not found"));
        assert_eq!(err.kind(), "artifact_load_failure");
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("models/MLR_3.onnx"));
    }
}
