//! Request counters and latency statistics for the predictors.

use crate::catalog::PredictorKind;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Latency samples kept per predictor
const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for prediction requests
pub struct PredictionMetrics {
    /// Total requests handled
    pub requests: AtomicU64,
    /// Requests rejected for schema mismatches
    pub schema_failures: AtomicU64,
    /// Requests whose model call failed
    pub inference_failures: AtomicU64,
    /// Requests that could not be parsed
    pub malformed_requests: AtomicU64,
    /// Requests naming a predictor that is not loaded
    pub unknown_predictors: AtomicU64,
    /// Successful predictions per predictor
    predictions: RwLock<BTreeMap<PredictorKind, u64>>,
    /// Prediction times per predictor (in microseconds)
    latencies: RwLock<BTreeMap<PredictorKind, Vec<u64>>>,
    start_time: Instant,
}

impl PredictionMetrics {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            schema_failures: AtomicU64::new(0),
            inference_failures: AtomicU64::new(0),
            malformed_requests: AtomicU64::new(0),
            unknown_predictors: AtomicU64::new(0),
            predictions: RwLock::new(BTreeMap::new()),
            latencies: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, kind: PredictorKind, elapsed: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut predictions) = self.predictions.write() {
            *predictions.entry(kind).or_insert(0) += 1;
        }

        if let Ok(mut latencies) = self.latencies.write() {
            let samples = latencies.entry(kind).or_default();
            samples.push(elapsed.as_micros() as u64);
            if samples.len() > MAX_SAMPLES {
                samples.drain(0..MAX_SAMPLES / 2);
            }
        }
    }

    /// Record a failed request by error kind
    pub fn record_failure(&self, error_kind: &str) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        match error_kind {
            "schema_mismatch" => self.schema_failures.fetch_add(1, Ordering::Relaxed),
            "inference_failure" => self.inference_failures.fetch_add(1, Ordering::Relaxed),
            "malformed_request" => self.malformed_requests.fetch_add(1, Ordering::Relaxed),
            "unknown_predictor" => self.unknown_predictors.fetch_add(1, Ordering::Relaxed),
            other => {
                warn!(error_kind = %other, "Failure of unrecognized kind");
                return;
            }
        };
    }

    pub fn predictions(&self, kind: PredictorKind) -> u64 {
        self.predictions
            .read()
            .map(|p| p.get(&kind).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Latency statistics for one predictor
    pub fn latency_stats(&self, kind: PredictorKind) -> LatencyStats {
        let Ok(latencies) = self.latencies.read() else {
            return LatencyStats::default();
        };
        let Some(samples) = latencies.get(&kind).filter(|s| !s.is_empty()) else {
            return LatencyStats::default();
        };

        let mut sorted = samples.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Requests per second since startup
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let requests = self.requests.load(Ordering::Relaxed);
        info!(
            requests = requests,
            schema_failures = self.schema_failures.load(Ordering::Relaxed),
            inference_failures = self.inference_failures.load(Ordering::Relaxed),
            malformed = self.malformed_requests.load(Ordering::Relaxed),
            unknown_predictors = self.unknown_predictors.load(Ordering::Relaxed),
            throughput = format!("{:.1} req/s", self.throughput()),
            "Prediction summary"
        );

        for kind in PredictorKind::ALL {
            let stats = self.latency_stats(kind);
            if stats.count == 0 {
                continue;
            }
            info!(
                predictor = %kind,
                predictions = self.predictions(kind),
                mean_us = stats.mean_us,
                p50_us = stats.p50_us,
                p95_us = stats.p95_us,
                p99_us = stats.p99_us,
                max_us = stats.max_us,
                "Predictor latency"
            );
        }
    }
}

impl Default for PredictionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Prediction time statistics
#[derive(Debug, Default, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = PredictionMetrics::new();

        metrics.record_prediction(PredictorKind::Salary, Duration::from_micros(100));
        metrics.record_prediction(PredictorKind::Salary, Duration::from_micros(300));
        metrics.record_failure("schema_mismatch");
        metrics.record_failure("inference_failure");
        metrics.record_failure("malformed_request");

        assert_eq!(metrics.requests.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.schema_failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.inference_failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.malformed_requests.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.predictions(PredictorKind::Salary), 2);
        assert_eq!(metrics.predictions(PredictorKind::Diabetes), 0);
    }

    #[test]
    fn test_failure_kinds_are_counted_separately() {
        let metrics = PredictionMetrics::new();

        metrics.record_failure("unknown_predictor");
        metrics.record_failure("unknown_predictor");
        metrics.record_failure("artifact_load_failure");

        assert_eq!(metrics.unknown_predictors.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.malformed_requests.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.schema_failures.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.inference_failures.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.requests.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = PredictionMetrics::new();
        for us in 1..=100 {
            metrics.record_prediction(PredictorKind::Diabetes, Duration::from_micros(us));
        }

        let stats = metrics.latency_stats(PredictorKind::Diabetes);
        assert_eq!(stats.count, 100);
        assert_eq!(stats.mean_us, 50);
        assert_eq!(stats.p50_us, 51);
        assert_eq!(stats.max_us, 100);

        assert_eq!(
            metrics.latency_stats(PredictorKind::HousePrice),
            LatencyStats::default()
        );
    }
}
