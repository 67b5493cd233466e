//! Single raw listing record

use crate::error::{Result, StaypriceError};
use polars::prelude::*;
use std::collections::BTreeMap;

/// A heterogeneous field value in a raw listing record
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Text(String),
    Null,
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// One unvalidated listing record, a mapping from field name to value.
///
/// Fields may be missing entirely; the frozen transformation zero-fills anything
/// the schema expects but the record does not carry.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value
    pub fn set(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Materialize the record as a one-row DataFrame so the batch transform path
    /// and the single-record path share one implementation.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        if self.fields.is_empty() {
            return Err(StaypriceError::DataError("record has no fields".to_string()));
        }

        let columns: Vec<Column> = self
            .fields
            .iter()
            .map(|(name, value)| match value {
                FieldValue::Float(v) => Column::new(name.as_str().into(), [*v]),
                FieldValue::Int(v) => Column::new(name.as_str().into(), [*v as f64]),
                FieldValue::Text(v) => Column::new(name.as_str().into(), [v.as_str()]),
                FieldValue::Null => Column::new(name.as_str().into(), [Option::<f64>::None]),
            })
            .collect();

        DataFrame::new(columns).map_err(|e| StaypriceError::DataError(e.to_string()))
    }
}
