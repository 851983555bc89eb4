//! Request handling for the form surface.
//!
//! A request either yields a rendered prediction or a rendered error; a failed
//! request never affects the next one.

use crate::metrics::PredictionMetrics;
use crate::models::InferenceEngine;
use crate::report;
use crate::types::request::{PredictionRequest, PredictionResponse};
use std::time::Instant;
use tracing::{debug, error, warn};

/// Handle one parsed request against the loaded predictors.
///
/// Returns `None` only when the requested predictor was not configured.
pub fn handle_request(
    engine: &InferenceEngine,
    metrics: &PredictionMetrics,
    request: &PredictionRequest,
) -> Option<PredictionResponse> {
    let kind = request.predictor;
    let predictor = engine.get(kind)?;
    let start = Instant::now();

    let outcome = predictor
        .record(&request.inputs, request.fill_defaults)
        .and_then(|record| {
            let result = predictor.predict(&record)?;
            Ok((record, result))
        });

    let response = match outcome {
        Ok((record, result)) => {
            let elapsed = start.elapsed();
            metrics.record_prediction(kind, elapsed);
            debug!(
                predictor = %kind,
                result = ?result,
                elapsed_us = elapsed.as_micros(),
                "Prediction complete"
            );

            let contributions = predictor.contributions(&record).unwrap_or_default();
            report::render(kind, result).with_contributions(contributions)
        }
        Err(e) => {
            metrics.record_failure(e.kind());
            if e.kind() == "schema_mismatch" {
                warn!(predictor = %kind, error = %e, "Rejected request");
            } else {
                error!(predictor = %kind, error = %e, "Inference failed");
            }
            report::render_error(kind, &e)
        }
    };

    Some(response)
}

/// Handle one JSON line, producing the JSON value to write back.
pub fn handle_line(engine: &InferenceEngine, metrics: &PredictionMetrics, line: &str) -> serde_json::Value {
    let request: PredictionRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Failed to deserialize request");
            metrics.record_failure("malformed_request");
            return serde_json::json!({
                "error": "malformed_request",
                "message": format!("Invalid request: {}", e),
            });
        }
    };

    match handle_request(engine, metrics, &request) {
        Some(response) => serde_json::to_value(&response).unwrap_or_else(|e| {
            serde_json::json!({ "error": "serialization", "message": e.to_string() })
        }),
        None => {
            warn!(predictor = %request.predictor, "Predictor not loaded");
            metrics.record_failure("unknown_predictor");
            serde_json::json!({
                "error": "unknown_predictor",
                "message": format!("Predictor `{}` is not loaded", request.predictor),
            })
        }
    }
}
