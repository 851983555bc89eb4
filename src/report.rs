//! Turns prediction results into the text shown on each form.

use crate::catalog::PredictorKind;
use crate::error::PredictError;
use crate::types::prediction::PredictionResult;
use crate::types::request::PredictionResponse;

/// Format an amount as rupees with thousands separators and two decimals,
/// e.g. `Rs.1,234,567.89`.
pub fn format_currency(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}Rs.{}.{}", sign, grouped, fraction)
}

/// Headline for a successful prediction.
pub fn message(kind: PredictorKind, result: &PredictionResult) -> String {
    match (kind, result) {
        (PredictorKind::Salary, PredictionResult::Continuous { value }) => {
            format!("Predicted Salary: {}", format_currency(*value))
        }
        (PredictorKind::HousePrice, PredictionResult::Continuous { value }) => {
            format!("Predicted House Price: {}", format_currency(*value))
        }
        (_, PredictionResult::Categorical { label, .. }) => {
            let diabetic = *label != 0;
            let verdict = if diabetic { "Diabetic" } else { "Non-Diabetic" };
            let p_non = result.probability_of(0).unwrap_or(0.0) * 100.0;
            let p_dia = result.probability_of(1).unwrap_or(0.0) * 100.0;
            format!(
                "You are likely {} (Non-Diabetic {:.1}%, Diabetic {:.1}%)",
                verdict, p_non, p_dia
            )
        }
        (_, PredictionResult::Continuous { value }) => format!("Predicted value: {:.2}", value),
    }
}

/// Secondary line under the headline.
pub fn note(kind: PredictorKind, result: &PredictionResult) -> Option<&'static str> {
    match kind {
        PredictorKind::Salary => Some("This prediction is based on a simple linear regression."),
        PredictorKind::HousePrice => {
            Some("This prediction is based on a multiple linear regression model.")
        }
        PredictorKind::Diabetes if result.label() == Some(1) => {
            Some("Please consult your doctor.")
        }
        PredictorKind::Diabetes => None,
    }
}

/// Build the response for a completed prediction.
pub fn render(kind: PredictorKind, result: PredictionResult) -> PredictionResponse {
    let text = message(kind, &result);
    let note = note(kind, &result);

    let response = PredictionResponse::success(kind, result, text);
    match note {
        Some(note) => response.with_note(note),
        None => response,
    }
}

/// Build the response for a failed prediction.
pub fn render_error(kind: PredictorKind, error: &PredictError) -> PredictionResponse {
    let text = match error {
        PredictError::SchemaMismatch(violation) => format!("Invalid input: {}", violation),
        other => format!("Prediction failed: {}", other),
    };
    PredictionResponse::failure(kind, error.kind(), text)
}
