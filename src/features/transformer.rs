//! Frozen feature transformation
//!
//! `fit` derives engineered features, captures the categorical schema, and computes
//! scaling parameters from the training partition only. Everything needed to rebuild
//! a feature vector is frozen into [`TransformerState`]; `transform` re-derives the
//! same features from that state alone and never re-fits anything, so the same input
//! always produces bit-identical output.

use crate::error::{Result, StaypriceError};
use crate::features::config::TransformConfig;
use crate::features::geo::haversine_km;
use crate::features::record::RawRecord;
use crate::report::RunReport;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Artifact format version; bumped whenever the state layout changes
pub const STATE_VERSION: u32 = 1;

const DISTANCE_FEATURE: &str = "distance_to_center";
const DENSITY_FEATURE: &str = "group_density";

/// Where one schema column's value comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureSource {
    /// Standardized numeric column taken directly from the input
    Numeric { column: String },
    /// Haversine distance to the frozen reference point, standardized
    DistanceToCenter,
    /// Frozen per-group record count, standardized
    GroupDensity,
    /// One-hot indicator: 1.0 when `column` holds `category`
    Indicator { column: String, category: String },
}

/// Frozen one-hot membership for one encoded categorical column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEncoding {
    pub column: String,
    /// Dropped reference category (lexicographically smallest seen at fit time)
    pub reference: String,
    /// Categories that received indicator columns, in frozen order
    pub kept: Vec<String>,
}

/// Per-feature standardization parameters computed from the training rows
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScalingParams {
    pub mean: f64,
    /// Population standard deviation; 0.0 marks a constant column whose scaled
    /// values are emitted as zeros
    pub std: f64,
}

/// Immutable artifact produced once by fitting.
///
/// Carries the ordered output schema, the source of every schema column, frozen
/// category membership, frozen group counts, and scaling parameters. Passed by
/// reference between fit and transform; column identity is by name, never by
/// position in some input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerState {
    pub version: u32,
    /// Ordered output feature-column names, exactly as used to train the model
    pub schema: Vec<String>,
    /// Source of each schema column, parallel to `schema`
    sources: Vec<FeatureSource>,
    /// Standardization parameters keyed by schema name (indicators are unscaled)
    scaling: HashMap<String, ScalingParams>,
    /// Frozen one-hot membership per encoded column
    encodings: Vec<CategoryEncoding>,
    /// Frozen per-group record counts from the fitting dataset
    group_counts: HashMap<String, f64>,
    pub target_column: String,
    group_column: String,
    latitude_column: String,
    longitude_column: String,
    reference_point: (f64, f64),
}

impl TransformerState {
    pub fn schema_len(&self) -> usize {
        self.schema.len()
    }

    pub fn encodings(&self) -> &[CategoryEncoding] {
        &self.encodings
    }

    pub fn scaling(&self, feature: &str) -> Option<&ScalingParams> {
        self.scaling.get(feature)
    }

    /// Persist the state as a JSON artifact
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StaypriceError::ArtifactError(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| {
            StaypriceError::ArtifactError(format!("cannot write {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    /// Load a persisted state, rejecting unreadable or version-incompatible files
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            StaypriceError::ArtifactError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let state: Self = serde_json::from_str(&json).map_err(|e| {
            StaypriceError::ArtifactError(format!("cannot parse {}: {}", path.display(), e))
        })?;

        if state.version != STATE_VERSION {
            return Err(StaypriceError::ArtifactError(format!(
                "transformer state version {} is incompatible with expected {}",
                state.version, STATE_VERSION
            )));
        }

        Ok(state)
    }
}

/// Fits the frozen transformation and applies it to datasets or single records.
pub struct FeatureTransformer {
    config: TransformConfig,
}

impl Default for FeatureTransformer {
    fn default() -> Self {
        Self::new(TransformConfig::default())
    }
}

impl FeatureTransformer {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    /// Fit the transformation on a cleaned dataset.
    ///
    /// Returns the training feature matrix (aligned to the frozen schema), the
    /// log1p-transformed target vector, and the frozen state.
    pub fn fit(
        &self,
        df: &DataFrame,
        report: &mut RunReport,
    ) -> Result<(Array2<f64>, Array1<f64>, TransformerState)> {
        let cfg = &self.config;

        // Target must be present and numeric; structural problems are fatal
        let target = numeric_values(df, &cfg.target_column).ok_or_else(|| {
            StaypriceError::DataError(format!(
                "target column '{}' is missing or not numeric",
                cfg.target_column
            ))
        })?;
        let y: Array1<f64> = target
            .iter()
            .map(|v| v.unwrap_or(0.0).ln_1p())
            .collect::<Vec<f64>>()
            .into();

        // Numeric passthrough columns in input order, minus the target and
        // leakage-prone identifiers
        let mut numeric_cols: Vec<String> = Vec::new();
        for col in df.get_columns() {
            let name = col.name().to_string();
            if name == cfg.target_column
                || cfg.drop_columns.contains(&name)
                || cfg.encode_exclusions.contains(&name)
                || name == DISTANCE_FEATURE
                || name == DENSITY_FEATURE
            {
                continue;
            }
            if is_numeric_dtype(col.as_materialized_series().dtype()) {
                numeric_cols.push(name);
            }
        }

        // Frozen per-group counts; unseen groups default to 1 at transform time
        let mut group_counts: HashMap<String, f64> = HashMap::new();
        match string_values(df, &cfg.group_column) {
            Some(values) => {
                for value in values.into_iter().flatten() {
                    *group_counts.entry(value).or_insert(0.0) += 1.0;
                }
            }
            None => {
                report.warn(format!(
                    "grouping column '{}' not found; {DENSITY_FEATURE} set to 1 for all rows",
                    cfg.group_column
                ));
            }
        }

        let has_coordinates = column_present(df, &cfg.latitude_column)
            && column_present(df, &cfg.longitude_column);
        if !has_coordinates {
            report.warn(format!(
                "columns '{}'/'{}' not found; {DISTANCE_FEATURE} set to 0 for all rows",
                cfg.latitude_column, cfg.longitude_column
            ));
        }

        // Low-cardinality categorical columns, excluding free-text and identifiers.
        // Categories are frozen sorted; the smallest becomes the dropped reference.
        let mut encodings: Vec<CategoryEncoding> = Vec::new();
        for col in df.get_columns() {
            let name = col.name().to_string();
            if cfg.encode_exclusions.contains(&name)
                || cfg.drop_columns.contains(&name)
                || name == cfg.group_column
            {
                continue;
            }
            let series = col.as_materialized_series();
            let Ok(ca) = series.str() else {
                continue;
            };

            let mut categories: Vec<String> = ca
                .into_iter()
                .flatten()
                .map(|s| s.to_string())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            if categories.len() >= cfg.max_cardinality || categories.is_empty() {
                continue;
            }
            categories.sort();

            let reference = categories.remove(0);
            encodings.push(CategoryEncoding {
                column: name,
                reference,
                kept: categories,
            });
        }

        // Freeze the schema: passthrough numerics, then the derived features, then
        // the one-hot indicator blocks
        let mut schema: Vec<String> = Vec::new();
        let mut sources: Vec<FeatureSource> = Vec::new();
        for name in &numeric_cols {
            schema.push(name.clone());
            sources.push(FeatureSource::Numeric {
                column: name.clone(),
            });
        }
        schema.push(DENSITY_FEATURE.to_string());
        sources.push(FeatureSource::GroupDensity);
        schema.push(DISTANCE_FEATURE.to_string());
        sources.push(FeatureSource::DistanceToCenter);
        for encoding in &encodings {
            for category in &encoding.kept {
                schema.push(format!("{}_{}", encoding.column, category));
                sources.push(FeatureSource::Indicator {
                    column: encoding.column.clone(),
                    category: category.clone(),
                });
            }
        }

        let mut state = TransformerState {
            version: STATE_VERSION,
            schema,
            sources,
            scaling: HashMap::new(),
            encodings,
            group_counts,
            target_column: cfg.target_column.clone(),
            group_column: cfg.group_column.clone(),
            latitude_column: cfg.latitude_column.clone(),
            longitude_column: cfg.longitude_column.clone(),
            reference_point: cfg.reference_point,
        };

        // Scaling parameters from the raw (unscaled) training feature values,
        // computed for every non-indicator schema column
        let mut scaling: HashMap<String, ScalingParams> = HashMap::new();
        for (name, source) in state.schema.iter().zip(state.sources.iter()) {
            if matches!(source, FeatureSource::Indicator { .. }) {
                continue;
            }
            let values = raw_feature_values(df, source, &state);
            scaling.insert(name.clone(), standardization_params(&values));
        }
        state.scaling = scaling;

        let x = Self::build_matrix(df, &state)?;

        info!(
            rows = x.nrows(),
            features = state.schema.len(),
            encoded_columns = state.encodings.len(),
            "feature transformation fitted"
        );

        Ok((x, y, state))
    }

    /// Apply the frozen transformation to a dataset.
    ///
    /// Pure: identical input and state yield bit-identical output. Columns the
    /// schema expects but the input lacks are zero-filled; input columns outside
    /// the schema are ignored; unseen categories produce all-zero indicators.
    pub fn transform(df: &DataFrame, state: &TransformerState) -> Result<Array2<f64>> {
        // Unseen categories degrade to zero indicators, but never silently
        for encoding in &state.encodings {
            if let Some(values) = string_values(df, &encoding.column) {
                let mut reported: HashSet<String> = HashSet::new();
                for value in values.into_iter().flatten() {
                    if value != encoding.reference
                        && !encoding.kept.contains(&value)
                        && reported.insert(value.clone())
                    {
                        warn!(
                            column = %encoding.column,
                            category = %value,
                            "category unseen at fit time; indicator columns set to 0"
                        );
                    }
                }
            }
        }

        Self::build_matrix(df, state)
    }

    /// Apply the frozen transformation to one raw record, yielding a feature
    /// vector whose length and order equal `state.schema`.
    pub fn transform_record(record: &RawRecord, state: &TransformerState) -> Result<Array1<f64>> {
        let df = record.to_dataframe()?;
        let matrix = Self::transform(&df, state)?;
        Ok(matrix.row(0).to_owned())
    }

    /// Shared matrix builder used by both fit and transform; the single code path
    /// is what guarantees train/serve consistency.
    fn build_matrix(df: &DataFrame, state: &TransformerState) -> Result<Array2<f64>> {
        let n_rows = df.height();
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(state.schema.len());

        for (name, source) in state.schema.iter().zip(state.sources.iter()) {
            let raw = raw_feature_values(df, source, state);
            debug_assert_eq!(raw.len(), n_rows);

            let column = match state.scaling.get(name) {
                Some(params) => raw.iter().map(|v| params.apply(*v)).collect(),
                None => raw,
            };
            columns.push(column);
        }

        let col_refs: Vec<&[f64]> = columns.iter().map(|c| c.as_slice()).collect();
        Ok(Array2::from_shape_fn((n_rows, state.schema.len()), |(r, c)| {
            col_refs[c][r]
        }))
    }
}

impl ScalingParams {
    fn apply(&self, value: f64) -> f64 {
        if self.std > 0.0 {
            (value - self.mean) / self.std
        } else {
            0.0
        }
    }
}

/// Raw (pre-scaling) values of one schema column for every row of `df`.
fn raw_feature_values(df: &DataFrame, source: &FeatureSource, state: &TransformerState) -> Vec<f64> {
    let n_rows = df.height();

    match source {
        FeatureSource::Numeric { column } => match numeric_values(df, column) {
            Some(values) => values.into_iter().map(|v| v.unwrap_or(0.0)).collect(),
            None => vec![0.0; n_rows],
        },
        FeatureSource::DistanceToCenter => {
            let lat = numeric_values(df, &state.latitude_column);
            let lon = numeric_values(df, &state.longitude_column);
            match (lat, lon) {
                (Some(lat), Some(lon)) => lat
                    .into_iter()
                    .zip(lon)
                    .map(|pair| match pair {
                        (Some(lat), Some(lon)) => haversine_km(
                            lat,
                            lon,
                            state.reference_point.0,
                            state.reference_point.1,
                        ),
                        _ => 0.0,
                    })
                    .collect(),
                _ => vec![0.0; n_rows],
            }
        }
        FeatureSource::GroupDensity => match string_values(df, &state.group_column) {
            Some(values) => values
                .into_iter()
                .map(|v| {
                    v.and_then(|g| state.group_counts.get(&g).copied())
                        .unwrap_or(1.0)
                })
                .collect(),
            None => vec![1.0; n_rows],
        },
        FeatureSource::Indicator { column, category } => match string_values(df, column) {
            Some(values) => values
                .into_iter()
                .map(|v| if v.as_deref() == Some(category.as_str()) { 1.0 } else { 0.0 })
                .collect(),
            None => vec![0.0; n_rows],
        },
    }
}

fn standardization_params(values: &[f64]) -> ScalingParams {
    let n = values.len();
    if n < 2 {
        return ScalingParams {
            mean: values.first().copied().unwrap_or(0.0),
            std: 0.0,
        };
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let std = variance.sqrt();

    ScalingParams {
        mean,
        std: if std.is_finite() { std } else { 0.0 },
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Column values as f64 options, or None when the column is absent or non-numeric
fn numeric_values(df: &DataFrame, name: &str) -> Option<Vec<Option<f64>>> {
    let series = df.column(name).ok()?.as_materialized_series();
    if !is_numeric_dtype(series.dtype()) {
        return None;
    }
    let casted = series.cast(&DataType::Float64).ok()?;
    let ca = casted.f64().ok()?;
    Some(ca.into_iter().collect())
}

/// Column values as strings, or None when the column is absent or not a string column
fn string_values(df: &DataFrame, name: &str) -> Option<Vec<Option<String>>> {
    let series = df.column(name).ok()?.as_materialized_series();
    let ca = series.str().ok()?;
    Some(ca.into_iter().map(|v| v.map(|s| s.to_string())).collect())
}

fn column_present(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}
