//! Feature transformation configuration

use serde::{Deserialize, Serialize};

/// Configuration for fitting a [`crate::features::FeatureTransformer`].
///
/// Defaults target the NYC short-term-rental dataset: `price` as the target,
/// `(40.7128, -74.0060)` as the distance reference point, and `neighbourhood` as
/// the density grouping field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Target column, log1p-transformed into the training target
    pub target_column: String,

    /// Coordinate columns for the distance feature
    pub latitude_column: String,
    pub longitude_column: String,

    /// Grouping field for the per-group record count feature
    pub group_column: String,

    /// Fixed reference point (latitude, longitude) for `distance_to_center`
    pub reference_point: (f64, f64),

    /// Categorical columns with at least this many distinct values are left unencoded
    pub max_cardinality: usize,

    /// Free-text / identifier columns never one-hot encoded
    pub encode_exclusions: Vec<String>,

    /// Leakage-prone identifier columns dropped from the feature set
    pub drop_columns: Vec<String>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            target_column: "price".to_string(),
            latitude_column: "latitude".to_string(),
            longitude_column: "longitude".to_string(),
            group_column: "neighbourhood".to_string(),
            reference_point: (40.7128, -74.0060),
            max_cardinality: 50,
            encode_exclusions: vec![
                "name".to_string(),
                "host_name".to_string(),
                "last_review".to_string(),
                "neighbourhood".to_string(),
            ],
            drop_columns: vec!["id".to_string(), "host_id".to_string()],
        }
    }
}

impl TransformConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target_column(mut self, name: impl Into<String>) -> Self {
        self.target_column = name.into();
        self
    }

    pub fn with_group_column(mut self, name: impl Into<String>) -> Self {
        self.group_column = name.into();
        self
    }

    pub fn with_reference_point(mut self, lat: f64, lon: f64) -> Self {
        self.reference_point = (lat, lon);
        self
    }

    pub fn with_max_cardinality(mut self, n: usize) -> Self {
        self.max_cardinality = n;
        self
    }

    pub fn with_encode_exclusions(mut self, columns: Vec<String>) -> Self {
        self.encode_exclusions = columns;
        self
    }

    pub fn with_drop_columns(mut self, columns: Vec<String>) -> Self {
        self.drop_columns = columns;
        self
    }
}
