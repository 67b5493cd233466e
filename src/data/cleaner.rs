//! Missing-value imputation and IQR outlier removal

use crate::error::{Result, StaypriceError};
use crate::report::RunReport;
use polars::prelude::*;
use std::collections::HashMap;
use tracing::info;

/// Cleans a raw listing dataset before feature engineering.
///
/// Imputation fills every null: numeric columns get the column median, categorical
/// columns the most frequent value. Outlier removal applies the interquartile-range
/// rule on a single column, keeping rows inside `[Q1 - f*IQR, Q3 + f*IQR]`.
pub struct DatasetCleaner;

impl DatasetCleaner {
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

    /// Fill all missing values. Numeric columns are cast to Float64 and filled with
    /// the median of their non-null values; string columns are filled with the most
    /// frequent value, ties broken by first occurrence in column order.
    pub fn impute(df: &DataFrame, report: &mut RunReport) -> Result<DataFrame> {
        let mut result = df.clone();

        for col in df.get_columns() {
            let name = col.name().clone();
            let series = col.as_materialized_series();
            let null_count = series.null_count();

            let filled = if Self::is_numeric_dtype(series.dtype()) {
                let casted = series
                    .cast(&DataType::Float64)
                    .map_err(|e| StaypriceError::DataError(e.to_string()))?;
                let ca = casted
                    .f64()
                    .map_err(|e| StaypriceError::DataError(e.to_string()))?;
                let median = ca.median().unwrap_or(0.0);

                let filled: Float64Chunked = ca
                    .into_iter()
                    .map(|opt| Some(opt.unwrap_or(median)))
                    .collect();
                filled.with_name(name.clone()).into_series()
            } else if let Ok(ca) = series.str() {
                let mode = Self::string_mode(ca);

                let filled: StringChunked = ca
                    .into_iter()
                    .map(|opt| Some(opt.unwrap_or(mode.as_str()).to_string()))
                    .collect();
                filled.with_name(name.clone()).into_series()
            } else {
                // Dates and other exotic dtypes pass through untouched
                continue;
            };

            if null_count > 0 {
                report.warn(format!("column '{name}' had {null_count} missing values, imputed"));
            }

            result = result
                .with_column(filled)
                .map_err(|e| StaypriceError::DataError(e.to_string()))?
                .clone();
        }

        Ok(result)
    }

    /// Most frequent string value; ties broken by first occurrence in column order.
    fn string_mode(ca: &StringChunked) -> String {
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();

        for (idx, val) in ca.into_iter().enumerate() {
            if let Some(v) = val {
                let entry = counts.entry(v).or_insert((0, idx));
                entry.0 += 1;
            }
        }

        counts
            .into_iter()
            .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
            .map(|(v, _)| v.to_string())
            .unwrap_or_default()
    }

    /// Drop rows whose `column` value lies outside `[Q1 - factor*IQR, Q3 + factor*IQR]`.
    /// Bounds are inclusive; quartiles use linear interpolation. Deterministic.
    pub fn filter_outliers(df: &DataFrame, column: &str, factor: f64) -> Result<DataFrame> {
        let series = df
            .column(column)
            .map_err(|_| StaypriceError::FeatureNotFound(column.to_string()))?
            .as_materialized_series()
            .cast(&DataType::Float64)
            .map_err(|e| StaypriceError::DataError(e.to_string()))?;

        let ca = series
            .f64()
            .map_err(|e| StaypriceError::DataError(e.to_string()))?;

        let q1 = ca
            .quantile(0.25, QuantileMethod::Linear)
            .map_err(|e| StaypriceError::DataError(e.to_string()))?
            .unwrap_or(0.0);
        let q3 = ca
            .quantile(0.75, QuantileMethod::Linear)
            .map_err(|e| StaypriceError::DataError(e.to_string()))?
            .unwrap_or(0.0);

        let iqr = q3 - q1;
        let lower = q1 - factor * iqr;
        let upper = q3 + factor * iqr;

        let mask: BooleanChunked = ca
            .into_iter()
            .map(|opt| opt.map(|v| v >= lower && v <= upper))
            .collect();

        let kept = df
            .filter(&mask)
            .map_err(|e| StaypriceError::DataError(e.to_string()))?;

        info!(
            column,
            lower,
            upper,
            dropped = df.height() - kept.height(),
            "outlier filter applied"
        );

        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impute_numeric_median() {
        let df = DataFrame::new(vec![Column::new(
            "reviews".into(),
            &[Some(1.0), None, Some(3.0), Some(10.0)],
        )])
        .unwrap();

        let mut report = RunReport::new();
        let result = DatasetCleaner::impute(&df, &mut report).unwrap();

        let col = result.column("reviews").unwrap().f64().unwrap();
        assert_eq!(col.null_count(), 0);
        // Median of [1, 3, 10] = 3
        assert!((col.get(1).unwrap() - 3.0).abs() < 1e-12);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_impute_categorical_mode_first_occurrence_tie() {
        let df = DataFrame::new(vec![Column::new(
            "room_type".into(),
            &[Some("Private"), Some("Shared"), None, Some("Shared"), Some("Private")],
        )])
        .unwrap();

        let mut report = RunReport::new();
        let result = DatasetCleaner::impute(&df, &mut report).unwrap();

        let col = result.column("room_type").unwrap().str().unwrap();
        // Both values occur twice: "Private" appears first and wins the tie
        assert_eq!(col.get(2).unwrap(), "Private");
    }

    #[test]
    fn test_filter_outliers_iqr() {
        let df = DataFrame::new(vec![Column::new(
            "price".into(),
            &[1.0, 2.0, 3.0, 4.0, 5.0, 100.0],
        )])
        .unwrap();

        let kept = DatasetCleaner::filter_outliers(&df, "price", 1.5).unwrap();
        // Q1=2.25, Q3=4.75, IQR=2.5 -> bounds [-1.5, 8.5]; only 100 is dropped
        assert_eq!(kept.height(), 5);
        let col = kept.column("price").unwrap().f64().unwrap();
        assert!((col.max().unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_filter_outliers_missing_column() {
        let df = DataFrame::new(vec![Column::new("price".into(), &[1.0, 2.0])]).unwrap();
        let err = DatasetCleaner::filter_outliers(&df, "absent", 1.5).unwrap_err();
        assert!(matches!(err, StaypriceError::FeatureNotFound(_)));
    }
}
