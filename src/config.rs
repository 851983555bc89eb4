//! Configuration management for the predictors

use crate::catalog::PredictorKind;
use crate::models::loader::ArtifactFormat;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub models: ModelsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model artifacts configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing the model artifacts
    pub models_dir: String,
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Predictors to load at startup
    #[serde(default = "default_predictors")]
    pub predictors: Vec<PredictorConfig>,
}

/// One predictor and its artifact
#[derive(Debug, Clone, Deserialize)]
pub struct PredictorConfig {
    pub kind: PredictorKind,
    /// Artifact path, relative to `models_dir` unless absolute
    #[serde(default)]
    pub artifact: Option<String>,
    /// Artifact format; inferred from the extension when absent
    #[serde(default)]
    pub format: Option<ArtifactFormat>,
}

impl PredictorConfig {
    pub fn new(kind: PredictorKind) -> Self {
        Self {
            kind,
            artifact: None,
            format: None,
        }
    }

    pub fn artifact_path(&self) -> &str {
        self.artifact
            .as_deref()
            .unwrap_or_else(|| self.kind.default_artifact())
    }
}

fn default_onnx_threads() -> usize {
    1
}

fn default_predictors() -> Vec<PredictorConfig> {
    PredictorKind::ALL.into_iter().map(PredictorConfig::new).collect()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.models.predictors.is_empty() {
            anyhow::bail!("No predictors configured");
        }
        for (i, entry) in self.models.predictors.iter().enumerate() {
            if self.models.predictors[..i].iter().any(|p| p.kind == entry.kind) {
                anyhow::bail!("Predictor `{}` configured twice", entry.kind);
            }
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: ModelsConfig {
                models_dir: "models".to_string(),
                onnx_threads: 1,
                predictors: default_predictors(),
            },
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.models.models_dir, "models");
        assert_eq!(config.models.predictors.len(), 3);
        assert_eq!(config.models.predictors[1].artifact_path(), "xgboost.onnx");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_repository_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/config.toml");
        let config = AppConfig::load_from_path(path).unwrap();

        assert_eq!(config.models.predictors.len(), 3);
        assert_eq!(config.models.predictors[2].kind, PredictorKind::HousePrice);
        assert_eq!(config.models.predictors[2].artifact_path(), "MLR_3.onnx");
    }

    #[test]
    fn test_duplicate_predictor_is_rejected() {
        let mut config = AppConfig::default();
        config
            .models
            .predictors
            .push(PredictorConfig::new(PredictorKind::Salary));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_format() {
        let entry: PredictorConfig = serde_json::from_str(
            r#"{"kind": "salary", "artifact": "salary.bin", "format": "linear_json"}"#,
        )
        .unwrap();
        assert_eq!(entry.format, Some(ArtifactFormat::LinearJson));
        assert_eq!(entry.artifact_path(), "salary.bin");
    }
}
