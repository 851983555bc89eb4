//! Type definitions shared by the adapter and the form surface

pub mod prediction;
pub mod request;

pub use prediction::{ClassProbability, FeatureContribution, PredictionResult};
pub use request::{PredictionRequest, PredictionResponse};
