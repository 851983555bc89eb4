//! Model handles and the inference adapter

pub mod inference;
pub mod linear;
pub mod loader;
pub mod onnx;

pub use inference::{predict, InferenceEngine, Predictor};
pub use linear::LinearModel;
pub use loader::{ArtifactFormat, ModelLoader};
pub use onnx::OnnxModel;

use crate::catalog::ModelTask;
use crate::schema::FeatureRow;
use anyhow::Result;

/// What a model declares about the inputs it was trained on.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedFeatures {
    /// The artifact carries no input description
    Unknown,
    /// Number of positional inputs
    Width(usize),
    /// Feature names in training order
    Names(Vec<String>),
}

/// A pre-trained model loaded from disk.
///
/// Handles are shared read-only between requests, so implementations must be safe to
/// call from several threads at once.
pub trait Model: Send + Sync {
    /// Model name, used in logs and errors.
    fn name(&self) -> &str;

    fn task(&self) -> ModelTask;

    fn expected_features(&self) -> ExpectedFeatures {
        ExpectedFeatures::Unknown
    }

    /// Point prediction: the regression value, or the class label for classifiers.
    fn predict(&self, row: &FeatureRow) -> Result<f64>;

    /// Class probabilities as `(class, probability)` pairs ordered by class.
    fn predict_proba(&self, row: &FeatureRow) -> Result<Vec<(i64, f64)>> {
        let _ = row;
        anyhow::bail!("model `{}` does not expose class probabilities", self.name())
    }

    /// Label and class distribution from a single inference pass.
    fn classify(&self, row: &FeatureRow) -> Result<(f64, Vec<(i64, f64)>)> {
        Ok((self.predict(row)?, self.predict_proba(row)?))
    }

    /// Per-feature importances in training order, when the artifact carries them.
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }
}
