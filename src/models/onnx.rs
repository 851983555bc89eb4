//! ONNX Runtime backed models

use super::{ExpectedFeatures, Model};
use crate::catalog::ModelTask;
use crate::schema::FeatureRow;
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionInputValue, SessionOutputs};
use ort::tensor::TensorElementType;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Element type the runtime expects for one graph input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputElement {
    Float32,
    Float64,
    Int64,
    Int32,
}

impl InputElement {
    fn from_tensor_type(ty: Option<TensorElementType>) -> Result<Self> {
        match ty {
            Some(TensorElementType::Float32) => Ok(InputElement::Float32),
            Some(TensorElementType::Float64) => Ok(InputElement::Float64),
            Some(TensorElementType::Int64) => Ok(InputElement::Int64),
            Some(TensorElementType::Int32) => Ok(InputElement::Int32),
            Some(other) => anyhow::bail!("unsupported input element type {:?}", other),
            None => anyhow::bail!("input is not a tensor"),
        }
    }
}

/// A graph input as read from the session at load time.
#[derive(Debug, Clone, PartialEq)]
struct InputSpec {
    name: String,
    element: InputElement,
    /// Declared dimensions; `-1` marks a dynamic axis
    dims: Vec<i64>,
}

/// One tensor to feed, before conversion into a runtime value.
#[derive(Debug, Clone, PartialEq)]
struct PlannedInput {
    name: String,
    element: InputElement,
    shape: Vec<i64>,
    values: Vec<f64>,
}

/// Feature count of a positional input, when its last axis is fixed.
fn fixed_width(dims: &[i64]) -> Option<usize> {
    dims.last()
        .copied()
        .filter(|&d| d > 0)
        .map(|d| d as usize)
}

fn expected_features(inputs: &[InputSpec]) -> ExpectedFeatures {
    match inputs {
        [single] => fixed_width(&single.dims)
            .map(ExpectedFeatures::Width)
            .unwrap_or(ExpectedFeatures::Unknown),
        many => ExpectedFeatures::Names(many.iter().map(|i| i.name.clone()).collect()),
    }
}

/// Pick the value output and, for classifiers, the probability output.
fn select_outputs(task: ModelTask, output_names: &[String]) -> Result<(String, Option<String>)> {
    match task {
        ModelTask::Regression => {
            let value = output_names
                .iter()
                .find(|n| n.contains("variable") || n.contains("output"))
                .or_else(|| output_names.first())
                .cloned()
                .context("regressor declares no outputs")?;
            Ok((value, None))
        }
        ModelTask::Classification => {
            let label = output_names
                .iter()
                .find(|n| n.contains("label"))
                .cloned()
                .context("classifier declares no label output")?;
            let probabilities = output_names
                .iter()
                .find(|n| n.contains("prob"))
                .cloned()
                .context("classifier declares no probability output")?;
            Ok((label, Some(probabilities)))
        }
    }
}

/// Lay a row out as the tensors the graph inputs expect.
fn plan_inputs(inputs: &[InputSpec], row: &FeatureRow) -> Result<Vec<PlannedInput>> {
    match row {
        FeatureRow::Positional(values) => {
            let [input] = inputs else {
                anyhow::bail!(
                    "model expects {} named inputs, got a positional vector",
                    inputs.len()
                );
            };
            Ok(vec![PlannedInput {
                name: input.name.clone(),
                element: input.element,
                shape: vec![1, values.len() as i64],
                values: values.clone(),
            }])
        }
        FeatureRow::Named(columns) => columns
            .iter()
            .map(|(column, value)| {
                let input = inputs
                    .iter()
                    .find(|i| &i.name == column)
                    .with_context(|| format!("model has no input named `{}`", column))?;
                Ok(PlannedInput {
                    name: column.clone(),
                    element: input.element,
                    shape: vec![1, 1],
                    values: vec![*value],
                })
            })
            .collect(),
    }
}

fn whole_numbers(planned: &PlannedInput) -> Result<Vec<i64>> {
    planned
        .values
        .iter()
        .map(|&v| {
            if v.fract() != 0.0 {
                anyhow::bail!("input `{}` takes integers, got {}", planned.name, v);
            }
            Ok(v as i64)
        })
        .collect()
}

fn to_session_input(planned: PlannedInput) -> Result<(String, SessionInputValue<'static>)> {
    let shape = planned.shape.clone();
    let value: SessionInputValue<'static> = match planned.element {
        InputElement::Float32 => {
            let data: Vec<f32> = planned.values.iter().map(|&v| v as f32).collect();
            Tensor::from_array((shape, data))?.into()
        }
        InputElement::Float64 => Tensor::from_array((shape, planned.values.clone()))?.into(),
        InputElement::Int64 => Tensor::from_array((shape, whole_numbers(&planned)?))?.into(),
        InputElement::Int32 => {
            let data: Vec<i32> = whole_numbers(&planned)?.into_iter().map(|v| v as i32).collect();
            Tensor::from_array((shape, data))?.into()
        }
    };
    Ok((planned.name, value))
}

/// Class distribution from a `[1, n_classes]` or `[n_classes]` probability tensor.
fn distribution_from_tensor(dims: &[i64], data: &[f32]) -> Result<Vec<(i64, f64)>> {
    let num_classes = dims.last().copied().unwrap_or(0).max(0) as usize;
    if num_classes == 0 || data.len() < num_classes {
        anyhow::bail!("probability tensor has shape {:?}", dims);
    }
    Ok(data[..num_classes]
        .iter()
        .enumerate()
        .map(|(class, &p)| (class as i64, p as f64))
        .collect())
}

/// Class distribution from the key/value pairs of a ZipMap output.
fn distribution_from_pairs(pairs: Vec<(i64, f32)>) -> Result<Vec<(i64, f64)>> {
    if pairs.is_empty() {
        anyhow::bail!("empty probability map");
    }
    let mut distribution: Vec<(i64, f64)> =
        pairs.into_iter().map(|(class, p)| (class, p as f64)).collect();
    distribution.sort_by_key(|(class, _)| *class);
    Ok(distribution)
}

/// A model exported to ONNX (scikit-learn, XGBoost via onnxmltools, ...).
///
/// Positional models have a single `[1, n]` input. Models trained on a named table
/// have one `[1, 1]` input per column, named after the column, each with its own
/// element type.
pub struct OnnxModel {
    name: String,
    task: ModelTask,
    /// ONNX Runtime needs exclusive access per run
    session: Mutex<Session>,
    inputs: Vec<InputSpec>,
    /// Regression value, or the label for classifiers
    value_output: String,
    probability_output: Option<String>,
}

impl OnnxModel {
    /// Load a model from file and inspect its inputs and outputs.
    pub fn load<P: AsRef<Path>>(path: P, name: &str, task: ModelTask, threads: usize) -> Result<Self> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let inputs = session
            .inputs
            .iter()
            .map(|input| {
                let element = InputElement::from_tensor_type(input.input_type.tensor_type())
                    .with_context(|| format!("input `{}`", input.name))?;
                let dims = input
                    .input_type
                    .tensor_shape()
                    .map(|shape| shape.iter().copied().collect())
                    .unwrap_or_default();
                Ok(InputSpec {
                    name: input.name.clone(),
                    element,
                    dims,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if inputs.is_empty() {
            anyhow::bail!("model {:?} declares no inputs", path);
        }

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let (value_output, probability_output) = select_outputs(task, &output_names)?;

        info!(
            model = %name,
            inputs = ?inputs,
            output = %value_output,
            probabilities = ?probability_output,
            "Model loaded successfully"
        );

        Ok(Self {
            name: name.to_string(),
            task,
            session: Mutex::new(session),
            inputs,
            value_output,
            probability_output,
        })
    }

    /// Run the session and hand the outputs to `extract` while the lock is held.
    fn run<T>(&self, row: &FeatureRow, extract: impl FnOnce(&SessionOutputs) -> Result<T>) -> Result<T> {
        let inputs = plan_inputs(&self.inputs, row)?
            .into_iter()
            .map(to_session_input)
            .collect::<Result<Vec<_>>>()
            .context("Failed to create input tensors")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let outputs = session.run(inputs)?;
        extract(&outputs)
    }

    fn output<'a>(outputs: &'a SessionOutputs, name: &str) -> Result<&'a DynValue> {
        outputs
            .get(name)
            .with_context(|| format!("output `{}` missing from session results", name))
    }

    /// First element of a label or value tensor, whatever its element type.
    fn first_scalar(output: &DynValue) -> Result<f64> {
        if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
            return data.first().map(|&v| v as f64).context("empty output tensor");
        }
        if let Ok((_, data)) = output.try_extract_tensor::<i64>() {
            return data.first().map(|&v| v as f64).context("empty output tensor");
        }
        if let Ok((_, data)) = output.try_extract_tensor::<f64>() {
            return data.first().copied().context("empty output tensor");
        }
        anyhow::bail!("output is not a numeric tensor")
    }

    /// Class distribution from either a probability tensor or the
    /// `seq(map(int64, float))` produced by ZipMap.
    fn distribution(&self, output: &DynValue) -> Result<Vec<(i64, f64)>> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            debug!(model = %self.name, shape = ?dims, "Extracted probabilities from tensor");
            return distribution_from_tensor(&dims, data);
        }

        let dtype = output.dtype();
        if DynSequenceValueType::can_downcast(&dtype) {
            let allocator = Allocator::default();
            let sequence = output
                .downcast_ref::<DynSequenceValueType>()
                .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;
            let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

            // batch size is always 1
            let map_value = maps.first().context("Empty probability sequence")?;
            let pairs = map_value.try_extract_key_values::<i64, f32>()?;

            debug!(model = %self.name, classes = pairs.len(), "Extracted probabilities from seq(map)");
            return distribution_from_pairs(pairs);
        }

        anyhow::bail!("unsupported probability output type {:?}", dtype)
    }

    fn probability_output(&self) -> Result<&str> {
        self.probability_output
            .as_deref()
            .context("model does not expose class probabilities")
    }
}

impl Model for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn task(&self) -> ModelTask {
        self.task
    }

    fn expected_features(&self) -> ExpectedFeatures {
        expected_features(&self.inputs)
    }

    fn predict(&self, row: &FeatureRow) -> Result<f64> {
        self.run(row, |outputs| {
            Self::first_scalar(Self::output(outputs, &self.value_output)?)
        })
    }

    fn predict_proba(&self, row: &FeatureRow) -> Result<Vec<(i64, f64)>> {
        let name = self.probability_output()?;
        self.run(row, |outputs| self.distribution(Self::output(outputs, name)?))
    }

    fn classify(&self, row: &FeatureRow) -> Result<(f64, Vec<(i64, f64)>)> {
        let name = self.probability_output()?;
        self.run(row, |outputs| {
            let label = Self::first_scalar(Self::output(outputs, &self.value_output)?)?;
            let distribution = self.distribution(Self::output(outputs, name)?)?;
            Ok((label, distribution))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, element: InputElement, dims: &[i64]) -> InputSpec {
        InputSpec {
            name: name.to_string(),
            element,
            dims: dims.to_vec(),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_element_types() {
        assert_eq!(
            InputElement::from_tensor_type(Some(TensorElementType::Int64)).unwrap(),
            InputElement::Int64
        );
        assert_eq!(
            InputElement::from_tensor_type(Some(TensorElementType::Float32)).unwrap(),
            InputElement::Float32
        );
        assert!(InputElement::from_tensor_type(Some(TensorElementType::String)).is_err());
        assert!(InputElement::from_tensor_type(None).is_err());
    }

    #[test]
    fn test_single_input_width() {
        let fixed = [input("float_input", InputElement::Float32, &[-1, 8])];
        assert_eq!(expected_features(&fixed), ExpectedFeatures::Width(8));

        let dynamic = [input("float_input", InputElement::Float32, &[-1, -1])];
        assert_eq!(expected_features(&dynamic), ExpectedFeatures::Unknown);

        let no_shape = [input("float_input", InputElement::Float32, &[])];
        assert_eq!(expected_features(&no_shape), ExpectedFeatures::Unknown);
    }

    #[test]
    fn test_multi_input_names() {
        let inputs = [
            input("bedrooms", InputElement::Int64, &[-1, 1]),
            input("bathrooms", InputElement::Float32, &[-1, 1]),
        ];
        assert_eq!(
            expected_features(&inputs),
            ExpectedFeatures::Names(names(&["bedrooms", "bathrooms"]))
        );
    }

    #[test]
    fn test_select_outputs() {
        let (value, probabilities) =
            select_outputs(ModelTask::Regression, &names(&["variable"])).unwrap();
        assert_eq!(value, "variable");
        assert_eq!(probabilities, None);

        let (label, probabilities) = select_outputs(
            ModelTask::Classification,
            &names(&["output_label", "output_probability"]),
        )
        .unwrap();
        assert_eq!(label, "output_label");
        assert_eq!(probabilities.as_deref(), Some("output_probability"));

        assert!(select_outputs(ModelTask::Classification, &names(&["variable"])).is_err());
        assert!(select_outputs(ModelTask::Regression, &[]).is_err());
    }

    #[test]
    fn test_plan_positional_input() {
        let inputs = [input("float_input", InputElement::Float32, &[-1, 2])];
        let planned = plan_inputs(&inputs, &FeatureRow::Positional(vec![1.0, 120.0])).unwrap();

        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].name, "float_input");
        assert_eq!(planned[0].shape, vec![1, 2]);
        assert_eq!(planned[0].values, vec![1.0, 120.0]);

        let two = [
            input("a", InputElement::Float32, &[-1, 1]),
            input("b", InputElement::Float32, &[-1, 1]),
        ];
        assert!(plan_inputs(&two, &FeatureRow::Positional(vec![1.0, 2.0])).is_err());
    }

    #[test]
    fn test_plan_named_columns_keeps_element_types() {
        let inputs = [
            input("bedrooms", InputElement::Int64, &[-1, 1]),
            input("lat", InputElement::Float32, &[-1, 1]),
        ];
        let row = FeatureRow::Named(vec![
            ("bedrooms".to_string(), 3.0),
            ("lat".to_string(), 47.5112),
        ]);
        let planned = plan_inputs(&inputs, &row).unwrap();

        assert_eq!(planned[0].element, InputElement::Int64);
        assert_eq!(planned[0].shape, vec![1, 1]);
        assert_eq!(whole_numbers(&planned[0]).unwrap(), vec![3]);
        assert_eq!(planned[1].element, InputElement::Float32);

        let unknown = FeatureRow::Named(vec![("zipcode".to_string(), 98001.0)]);
        assert!(plan_inputs(&inputs, &unknown).is_err());
    }

    #[test]
    fn test_fractional_value_for_integer_input() {
        let planned = PlannedInput {
            name: "bedrooms".to_string(),
            element: InputElement::Int64,
            shape: vec![1, 1],
            values: vec![2.5],
        };
        assert!(whole_numbers(&planned).is_err());
    }

    #[test]
    fn test_distribution_from_tensor() {
        let dist = distribution_from_tensor(&[1, 2], &[0.8, 0.2]).unwrap();
        assert_eq!(dist, vec![(0, 0.8_f32 as f64), (1, 0.2_f32 as f64)]);

        let flat = distribution_from_tensor(&[3], &[0.1, 0.2, 0.7]).unwrap();
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[2].0, 2);

        assert!(distribution_from_tensor(&[1, 0], &[]).is_err());
        assert!(distribution_from_tensor(&[1, 3], &[0.5, 0.5]).is_err());
    }

    #[test]
    fn test_distribution_from_pairs() {
        let dist = distribution_from_pairs(vec![(1, 0.25), (0, 0.75)]).unwrap();
        assert_eq!(dist, vec![(0, 0.75), (1, 0.25)]);
        assert!(distribution_from_pairs(Vec::new()).is_err());
    }
}
