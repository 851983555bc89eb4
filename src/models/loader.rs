//! Model artifact loader

use super::{LinearModel, Model, OnnxModel};
use crate::catalog::ModelTask;
use crate::error::{PredictError, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// On-disk artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    Onnx,
    LinearJson,
}

impl ArtifactFormat {
    /// Guess the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "onnx" => Some(ArtifactFormat::Onnx),
            "json" => Some(ArtifactFormat::LinearJson),
            _ => None,
        }
    }
}

/// Loader for model artifacts
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load one artifact as a shared model handle.
    ///
    /// Fails with `ArtifactLoadFailure` when the file is missing, unreadable, corrupt,
    /// of unknown format, or trained for a different task than `task`.
    pub fn load<P: AsRef<Path>>(
        &self,
        path: P,
        name: &str,
        task: ModelTask,
        format: Option<ArtifactFormat>,
    ) -> Result<Arc<dyn Model>> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(PredictError::artifact(
                path,
                anyhow::anyhow!("model file not found"),
            ));
        }

        let format = format
            .or_else(|| ArtifactFormat::from_path(path))
            .ok_or_else(|| {
                PredictError::artifact(path, anyhow::anyhow!("cannot infer artifact format"))
            })?;

        info!(model = %name, path = %path.display(), format = ?format, "Loading model artifact");

        let model: Arc<dyn Model> = match format {
            ArtifactFormat::Onnx => Arc::new(
                OnnxModel::load(path, name, task, self.onnx_threads)
                    .map_err(|e| PredictError::artifact(path, e))?,
            ),
            ArtifactFormat::LinearJson => {
                let mut model =
                    LinearModel::from_file(path).map_err(|e| PredictError::artifact(path, e))?;
                model.name = name.to_string();
                Arc::new(model)
            }
        };

        if model.task() != task {
            return Err(PredictError::artifact(
                path,
                anyhow::anyhow!("artifact is a {:?} model, expected {:?}", model.task(), task),
            ));
        }

        info!(model = %name, task = ?task, "Model loaded successfully");
        Ok(model)
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
