//! Dataset loading

use crate::error::{Result, StaypriceError};
use polars::prelude::*;
use std::fs::File;
use tracing::info;

/// Loader for tabular listing data
pub struct DataLoader {
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(100),
        }
    }

    /// Number of rows used to infer column dtypes
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = Some(n);
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: &str) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| StaypriceError::DataError(format!("cannot open {path}: {e}")))?;

        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .into_reader_with_file_handle(file);

        let df = reader
            .finish()
            .map_err(|e| StaypriceError::DataError(format!("cannot parse {path}: {e}")))?;

        info!(rows = df.height(), columns = df.width(), "loaded dataset from {path}");
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "price,room_type").unwrap();
        writeln!(f, "100,Private room").unwrap();
        writeln!(f, "250,Entire home/apt").unwrap();

        let df = DataLoader::new().load_csv(path.to_str().unwrap()).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn test_missing_file_is_data_error() {
        let err = DataLoader::new().load_csv("/nonexistent/listings.csv").unwrap_err();
        assert!(matches!(err, StaypriceError::DataError(_)));
    }
}
