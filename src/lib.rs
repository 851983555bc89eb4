//! Tabular Predictors Library
//!
//! Validates form inputs against fixed feature schemas, runs them through
//! pre-trained models and renders the predictions.

pub mod catalog;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod report;
pub mod schema;
pub mod service;
pub mod types;

pub use catalog::{ModelTask, PredictorKind};
pub use config::AppConfig;
pub use error::{PredictError, SchemaViolation};
pub use models::inference::{predict, InferenceEngine, Predictor};
pub use models::Model;
pub use schema::{FeatureSchema, FeatureSpec, InputRecord};
pub use types::{PredictionRequest, PredictionResponse, PredictionResult};
