//! Stayprice - short-term rental price prediction
//!
//! End-to-end pipeline from a raw listings CSV to a served price model:
//! - Data loading and cleaning (imputation, IQR outlier filtering)
//! - A frozen feature transformation applied identically at fit and serve time
//! - Grid search with k-fold cross-validation over a random forest regressor
//! - Held-out evaluation with a residual normality diagnostic
//! - Single-record inference from saved artifacts
//!
//! # Modules
//!
//! - [`data`] - CSV loading and dataset cleaning
//! - [`features`] - Feature transformation and its persisted frozen state
//! - [`training`] - Decision trees, random forest, k-fold CV, grid search
//! - [`evaluation`] - Regression metrics and residual diagnostics
//! - [`inference`] - Single-record price queries from artifacts
//! - [`report`] - Per-run data quality findings

pub mod data;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod inference;
pub mod report;
pub mod training;

pub use error::{Result, StaypriceError};
pub use report::RunReport;

/// Common imports for pipeline consumers
pub mod prelude {
    pub use crate::data::{DataLoader, DatasetCleaner};
    pub use crate::error::{Result, StaypriceError};
    pub use crate::evaluation::{evaluate, EvaluationReport, NormalityTest};
    pub use crate::features::{
        FeatureTransformer, RawRecord, TransformConfig, TransformerState,
    };
    pub use crate::inference::InferenceAdapter;
    pub use crate::report::RunReport;
    pub use crate::training::{
        GridSearch, Hyperparameters, MaxFeatures, ParamGrid, RandomForestRegressor,
        SearchConfig, SearchOutcome,
    };
}
