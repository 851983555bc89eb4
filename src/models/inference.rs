//! Inference adapter: validated record in, structured prediction out

use super::{ExpectedFeatures, Model, ModelLoader};
use crate::catalog::{ModelTask, PredictorKind};
use crate::config::AppConfig;
use crate::error::{PredictError, Result, SchemaViolation};
use crate::schema::{FeatureSchema, InputRecord};
use crate::types::prediction::{ClassProbability, FeatureContribution, PredictionResult};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Probabilities from float32 runtimes drift slightly from 1.0
const DISTRIBUTION_TOLERANCE: f64 = 1e-4;

/// Check the schema against what the model says it was trained on.
fn check_expectation(schema: &FeatureSchema, model: &dyn Model) -> std::result::Result<(), SchemaViolation> {
    match model.expected_features() {
        ExpectedFeatures::Unknown => Ok(()),
        ExpectedFeatures::Width(width) => {
            if width != schema.len() {
                return Err(SchemaViolation::WidthMismatch {
                    model: model.name().to_string(),
                    expected: width,
                    declared: schema.len(),
                });
            }
            Ok(())
        }
        ExpectedFeatures::Names(names) => {
            if names.len() != schema.len() {
                return Err(SchemaViolation::WidthMismatch {
                    model: model.name().to_string(),
                    expected: names.len(),
                    declared: schema.len(),
                });
            }
            for (position, (expected, declared)) in names.iter().zip(schema.names()).enumerate() {
                if expected != declared {
                    return Err(SchemaViolation::OrderMismatch {
                        model: model.name().to_string(),
                        position,
                        expected: expected.clone(),
                        declared: declared.to_string(),
                    });
                }
            }
            Ok(())
        }
    }
}

fn check_distribution(distribution: &[(i64, f64)]) -> anyhow::Result<()> {
    if distribution.is_empty() {
        anyhow::bail!("empty class distribution");
    }
    if let Some((class, p)) = distribution
        .iter()
        .find(|(_, p)| !p.is_finite() || *p < -DISTRIBUTION_TOLERANCE || *p > 1.0 + DISTRIBUTION_TOLERANCE)
    {
        anyhow::bail!("class {} has probability {} outside [0, 1]", class, p);
    }
    let total: f64 = distribution.iter().map(|(_, p)| p).sum();
    if (total - 1.0).abs() > DISTRIBUTION_TOLERANCE {
        anyhow::bail!("class probabilities sum to {}", total);
    }
    Ok(())
}

/// Clamp into [0, 1] and rescale so the probabilities sum to exactly 1.
///
/// Only called on distributions that already passed `check_distribution`.
fn normalize(distribution: Vec<(i64, f64)>) -> Vec<ClassProbability> {
    let clamped: Vec<(i64, f64)> = distribution
        .into_iter()
        .map(|(class, p)| (class, p.clamp(0.0, 1.0)))
        .collect();
    let total: f64 = clamped.iter().map(|(_, p)| p).sum();

    clamped
        .into_iter()
        .map(|(class, p)| ClassProbability {
            class,
            probability: p / total,
        })
        .collect()
}

/// Run one prediction.
///
/// The record is checked against `schema`, and `schema` against what `model` was
/// trained on, before the model is called. Regression models give
/// [`PredictionResult::Continuous`], classifiers give [`PredictionResult::Categorical`]
/// with the full class distribution. Faults raised by the model are returned as
/// `InferenceFailure` and never retried.
pub fn predict(schema: &FeatureSchema, record: &InputRecord, model: &dyn Model) -> Result<PredictionResult> {
    check_expectation(schema, model)?;
    let row = schema.row(record)?;

    let result = match model.task() {
        ModelTask::Regression => {
            let value = model
                .predict(&row)
                .map_err(|e| PredictError::inference(model.name(), e))?;
            if !value.is_finite() {
                return Err(PredictError::inference(
                    model.name(),
                    anyhow::anyhow!("prediction is not finite: {}", value),
                ));
            }
            PredictionResult::Continuous { value }
        }
        ModelTask::Classification => {
            let (label, distribution) = model
                .classify(&row)
                .and_then(|(label, d)| check_distribution(&d).map(|_| (label, normalize(d))))
                .map_err(|e| PredictError::inference(model.name(), e))?;

            if label.fract() != 0.0 || !distribution.iter().any(|c| c.class as f64 == label) {
                return Err(PredictError::inference(
                    model.name(),
                    anyhow::anyhow!("label {} is not one of the model's classes", label),
                ));
            }

            PredictionResult::Categorical {
                label: label as i64,
                distribution,
            }
        }
    };

    debug!(model = %model.name(), result = ?result, "Inference complete");
    Ok(result)
}

/// Share of the prediction attributed to each feature: importance times value,
/// as a percentage of the total. `None` when the weighted total is zero.
pub fn feature_contributions(
    schema: &FeatureSchema,
    record: &InputRecord,
    importances: &[f64],
) -> Option<Vec<FeatureContribution>> {
    if importances.len() != schema.len() {
        return None;
    }

    let weighted: Vec<(String, f64)> = schema
        .features()
        .iter()
        .zip(importances)
        .map(|(spec, importance)| {
            let value = record.get(&spec.name).unwrap_or(0.0);
            (spec.name.clone(), importance * value)
        })
        .collect();

    let total: f64 = weighted.iter().map(|(_, w)| w).sum();
    if total == 0.0 || !total.is_finite() {
        return None;
    }

    Some(
        weighted
            .into_iter()
            .map(|(feature, w)| FeatureContribution {
                feature,
                percent: 100.0 * w / total,
            })
            .collect(),
    )
}

/// One form: a schema bound to the model trained on it.
#[derive(Clone)]
pub struct Predictor {
    kind: PredictorKind,
    schema: FeatureSchema,
    model: Arc<dyn Model>,
}

impl Predictor {
    /// Bind a model handle to the predictor's schema.
    ///
    /// The model must solve the predictor's task and agree with its schema.
    pub fn new(kind: PredictorKind, model: Arc<dyn Model>) -> Result<Self> {
        Self::with_schema(kind, kind.schema(), model)
    }

    pub fn with_schema(kind: PredictorKind, schema: FeatureSchema, model: Arc<dyn Model>) -> Result<Self> {
        if model.task() != kind.task() {
            return Err(PredictError::SchemaMismatch(SchemaViolation::InvalidSchema(format!(
                "predictor `{}` needs a {:?} model, `{}` is {:?}",
                kind,
                kind.task(),
                model.name(),
                model.task()
            ))));
        }
        check_expectation(&schema, model.as_ref())?;

        Ok(Self { kind, schema, model })
    }

    pub fn kind(&self) -> PredictorKind {
        self.kind
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    /// Validate raw form values into a record for this predictor.
    pub fn record(&self, values: &BTreeMap<String, f64>, fill_defaults: bool) -> Result<InputRecord> {
        let values = values.iter().map(|(k, v)| (k.clone(), *v));
        let record = if fill_defaults {
            self.schema.record_with_defaults(values)?
        } else {
            self.schema.record(values)?
        };
        Ok(record)
    }

    pub fn predict(&self, record: &InputRecord) -> Result<PredictionResult> {
        predict(&self.schema, record, self.model.as_ref())
    }

    pub fn contributions(&self, record: &InputRecord) -> Option<Vec<FeatureContribution>> {
        let importances = self.model.feature_importances()?;
        feature_contributions(&self.schema, record, &importances)
    }
}

/// All configured predictors, loaded once at startup.
pub struct InferenceEngine {
    predictors: BTreeMap<PredictorKind, Predictor>,
}

impl InferenceEngine {
    /// Load every configured artifact. Any failure is fatal for the caller.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(config.models.onnx_threads);
        let models_dir = Path::new(&config.models.models_dir);

        let mut predictors = BTreeMap::new();
        for entry in &config.models.predictors {
            let path = models_dir.join(entry.artifact_path());
            let model = loader.load(&path, entry.kind.name(), entry.kind.task(), entry.format)?;
            let predictor = Predictor::new(entry.kind, model)?;

            info!(
                predictor = %entry.kind,
                features = predictor.schema().len(),
                layout = ?predictor.schema().layout(),
                "Predictor registered"
            );
            predictors.insert(entry.kind, predictor);
        }

        Ok(Self { predictors })
    }

    /// Build an engine from already loaded predictors.
    pub fn from_predictors(predictors: impl IntoIterator<Item = Predictor>) -> Self {
        Self {
            predictors: predictors.into_iter().map(|p| (p.kind(), p)).collect(),
        }
    }

    pub fn get(&self, kind: PredictorKind) -> Option<&Predictor> {
        self.predictors.get(&kind)
    }

    pub fn predictor_count(&self) -> usize {
        self.predictors.len()
    }

    pub fn predictor_names(&self) -> Vec<&'static str> {
        self.predictors.keys().map(|k| k.name()).collect()
    }
}
