//! Data loading and cleaning
//!
//! Raw listing records arrive as a rectangular CSV with a header row. This module
//! loads them into a `polars::DataFrame`, fills missing values, and removes
//! statistical outliers on the target column before feature engineering.

mod cleaner;
mod loader;

pub use cleaner::DatasetCleaner;
pub use loader::DataLoader;
