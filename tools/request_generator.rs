//! Test Request Generator
//!
//! Writes random prediction requests as JSON lines, ready to pipe into
//! `tabular-predictors`.

use clap::Parser;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::io::{self, Write};
use tabular_predictors::catalog::PredictorKind;
use tabular_predictors::schema::{FeatureSchema, NumericKind};
use tabular_predictors::types::PredictionRequest;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "request-generator", about = "Generate random prediction requests")]
struct Args {
    /// Number of requests to write
    #[arg(long, default_value_t = 100)]
    count: u64,

    /// Share of requests with an out-of-range field
    #[arg(long, default_value_t = 0.1)]
    invalid_rate: f64,

    /// Only generate requests for this predictor
    #[arg(long)]
    predictor: Option<PredictorKind>,
}

/// Request generator for testing
struct RequestGenerator {
    rng: rand::rngs::ThreadRng,
}

impl RequestGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Every field drawn uniformly from its declared range
    fn generate_valid(&mut self, kind: PredictorKind) -> PredictionRequest {
        let schema = kind.schema();
        let inputs = schema
            .features()
            .iter()
            .map(|spec| {
                let value = match spec.kind {
                    NumericKind::Integer => {
                        self.rng.gen_range(spec.min as i64..=spec.max as i64) as f64
                    }
                    NumericKind::Float => {
                        let raw = self.rng.gen_range(spec.min..=spec.max);
                        // Forms step in hundredths
                        ((raw * 100.0).round() / 100.0).clamp(spec.min, spec.max)
                    }
                };
                (spec.name.clone(), value)
            })
            .collect();

        PredictionRequest {
            predictor: kind,
            inputs,
            fill_defaults: false,
        }
    }

    /// A valid request with one field pushed one unit past its bound
    fn generate_invalid(&mut self, kind: PredictorKind) -> PredictionRequest {
        let mut request = self.generate_valid(kind);
        let schema: FeatureSchema = kind.schema();

        if let Some(spec) = schema.features().choose(&mut self.rng) {
            let value = if self.rng.gen_bool(0.5) {
                spec.min - 1.0
            } else {
                spec.max + 1.0
            };
            request.inputs.insert(spec.name.clone(), value);
        }
        request
    }
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr, requests to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("request_generator=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    if !(0.0..=1.0).contains(&args.invalid_rate) {
        anyhow::bail!("--invalid-rate must be within [0, 1]");
    }

    info!(
        count = args.count,
        invalid_rate = args.invalid_rate,
        predictor = ?args.predictor,
        "Configuration loaded"
    );

    let mut generator = RequestGenerator::new();
    let mut rng = rand::thread_rng();
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    let mut stdout = io::stdout().lock();

    for _ in 0..args.count {
        let kind = match args.predictor {
            Some(kind) => kind,
            None => PredictorKind::ALL[rng.gen_range(0..PredictorKind::ALL.len())],
        };

        let request = if rng.gen_bool(args.invalid_rate) {
            *counts.entry("invalid").or_insert(0) += 1;
            generator.generate_invalid(kind)
        } else {
            *counts.entry(kind.name()).or_insert(0) += 1;
            generator.generate_valid(kind)
        };

        serde_json::to_writer(&mut stdout, &request)?;
        writeln!(stdout)?;
    }

    info!(counts = ?counts, "Completed! Wrote {} requests", args.count);

    Ok(())
}
