//! Feature schemas and validated input records.
//!
//! A [`FeatureSchema`] is the ordered list of inputs a model was trained on. The
//! order is part of the model contract: rows are always built in schema order.

use crate::error::SchemaViolation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Numeric kind of a single feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericKind {
    /// Whole numbers only (counts, years, codes)
    Integer,
    /// Any finite value
    Float,
}

/// Shape of the single-row input the model expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputLayout {
    /// One vector, features identified by position
    Positional,
    /// One column per feature, identified by name
    NamedColumns,
}

/// A single named, typed, range-constrained feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: NumericKind,
    pub min: f64,
    pub max: f64,
    /// Value the form starts with
    pub default: f64,
}

impl FeatureSpec {
    pub fn integer(name: &str, min: i64, max: i64, default: i64) -> Self {
        Self {
            name: name.to_string(),
            kind: NumericKind::Integer,
            min: min as f64,
            max: max as f64,
            default: default as f64,
        }
    }

    pub fn float(name: &str, min: f64, max: f64, default: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: NumericKind::Float,
            min,
            max,
            default,
        }
    }

    /// Check one value against this feature's constraints.
    pub fn check(&self, value: f64) -> Result<(), SchemaViolation> {
        if !value.is_finite() {
            return Err(SchemaViolation::NotFinite {
                name: self.name.clone(),
            });
        }
        if self.kind == NumericKind::Integer && value.fract() != 0.0 {
            return Err(SchemaViolation::NotInteger {
                name: self.name.clone(),
                value,
            });
        }
        if value < self.min || value > self.max {
            return Err(SchemaViolation::OutOfRange {
                name: self.name.clone(),
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Ordered feature list for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSchema {
    features: Vec<FeatureSpec>,
    layout: InputLayout,
}

impl FeatureSchema {
    /// Build a schema, rejecting duplicate names, empty schemas and inverted ranges.
    pub fn new(features: Vec<FeatureSpec>, layout: InputLayout) -> Result<Self, SchemaViolation> {
        if features.is_empty() {
            return Err(SchemaViolation::InvalidSchema(
                "schema has no features".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for spec in &features {
            if !seen.insert(spec.name.as_str()) {
                return Err(SchemaViolation::InvalidSchema(format!(
                    "duplicate feature `{}`",
                    spec.name
                )));
            }
            if !(spec.min <= spec.max) {
                return Err(SchemaViolation::InvalidSchema(format!(
                    "feature `{}` has min {} > max {}",
                    spec.name, spec.min, spec.max
                )));
            }
            spec.check(spec.default).map_err(|e| {
                SchemaViolation::InvalidSchema(format!("bad default: {}", e))
            })?;
        }

        Ok(Self { features, layout })
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn layout(&self) -> InputLayout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Feature names in model order.
    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Validate raw values into an [`InputRecord`].
    ///
    /// The values must name exactly the schema's features, once each, each within range.
    pub fn record<I, K>(&self, values: I) -> Result<InputRecord, SchemaViolation>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let record = InputRecord {
            values: unique_values(values)?,
        };
        self.check(&record)?;
        Ok(record)
    }

    /// Validate values, filling any absent feature with its form default.
    pub fn record_with_defaults<I, K>(&self, values: I) -> Result<InputRecord, SchemaViolation>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut merged: BTreeMap<String, f64> = self
            .features
            .iter()
            .map(|f| (f.name.clone(), f.default))
            .collect();
        merged.extend(unique_values(values)?);
        self.record(merged)
    }

    /// The record made of every feature's default value.
    pub fn default_record(&self) -> InputRecord {
        InputRecord {
            values: self
                .features
                .iter()
                .map(|f| (f.name.clone(), f.default))
                .collect(),
        }
    }

    /// Check a record against this schema.
    ///
    /// Records are validated when built, but a record built for one schema can be
    /// handed to an adapter with another.
    pub fn check(&self, record: &InputRecord) -> Result<(), SchemaViolation> {
        for spec in &self.features {
            let value = record
                .get(&spec.name)
                .ok_or_else(|| SchemaViolation::MissingField(spec.name.clone()))?;
            spec.check(value)?;
        }

        if let Some(extra) = record.names().find(|name| self.get(name).is_none()) {
            return Err(SchemaViolation::UnexpectedField(extra.to_string()));
        }

        Ok(())
    }

    /// Build the single-row model input in schema order.
    pub fn row(&self, record: &InputRecord) -> Result<FeatureRow, SchemaViolation> {
        self.check(record)?;

        let row = match self.layout {
            InputLayout::Positional => FeatureRow::Positional(
                self.features
                    .iter()
                    .map(|f| record.values[&f.name])
                    .collect(),
            ),
            InputLayout::NamedColumns => FeatureRow::Named(
                self.features
                    .iter()
                    .map(|f| (f.name.clone(), record.values[&f.name]))
                    .collect(),
            ),
        };

        Ok(row)
    }
}

fn unique_values<I, K>(values: I) -> Result<BTreeMap<String, f64>, SchemaViolation>
where
    I: IntoIterator<Item = (K, f64)>,
    K: Into<String>,
{
    let mut unique = BTreeMap::new();
    for (name, value) in values {
        let name = name.into();
        if unique.contains_key(&name) {
            return Err(SchemaViolation::DuplicateField(name));
        }
        unique.insert(name, value);
    }
    Ok(unique)
}

/// Validated feature values for one request.
///
/// Only [`FeatureSchema`] can build one, so a record always satisfied some schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputRecord {
    values: BTreeMap<String, f64>,
}

impl InputRecord {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A single row ready for a model, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureRow {
    Positional(Vec<f64>),
    Named(Vec<(String, f64)>),
}

impl FeatureRow {
    pub fn len(&self) -> usize {
        match self {
            FeatureRow::Positional(values) => values.len(),
            FeatureRow::Named(columns) => columns.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values in row order regardless of layout.
    pub fn values(&self) -> Vec<f64> {
        match self {
            FeatureRow::Positional(values) => values.clone(),
            FeatureRow::Named(columns) => columns.iter().map(|(_, v)| *v).collect(),
        }
    }

    /// Column names, when the row is a named-column table.
    pub fn names(&self) -> Option<Vec<&str>> {
        match self {
            FeatureRow::Positional(_) => None,
            FeatureRow::Named(columns) => Some(columns.iter().map(|(n, _)| n.as_str()).collect()),
        }
    }
}
