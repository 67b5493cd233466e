//! Single-record price inference from saved artifacts

use crate::error::{Result, StaypriceError};
use crate::features::{FeatureTransformer, RawRecord, TransformerState};
use crate::training::RandomForestRegressor;
use std::path::Path;
use tracing::debug;

/// Binds a frozen transformer state to a fitted model and answers
/// single-record price queries in original currency units.
#[derive(Debug)]
pub struct InferenceAdapter {
    state: TransformerState,
    model: RandomForestRegressor,
}

impl InferenceAdapter {
    /// Pair a transformer state with a model, rejecting mismatched widths
    pub fn new(state: TransformerState, model: RandomForestRegressor) -> Result<Self> {
        if state.schema.len() != model.n_features() {
            return Err(StaypriceError::SchemaMismatch {
                expected: format!("{} features", model.n_features()),
                actual: format!("{} features", state.schema.len()),
            });
        }
        Ok(Self { state, model })
    }

    /// Load both artifacts from disk
    pub fn from_artifacts(
        state_path: impl AsRef<Path>,
        model_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let state = TransformerState::load(state_path)?;
        let model = RandomForestRegressor::load(model_path)?;
        Self::new(state, model)
    }

    /// Predict the nightly price for one raw listing
    pub fn predict(&self, record: &RawRecord) -> Result<f64> {
        let features = FeatureTransformer::transform_record(record, &self.state)?;

        let matrix = features.insert_axis(ndarray::Axis(0));
        let log_prediction = self.model.predict(&matrix)?[0];
        let price = log_prediction.exp_m1();

        debug!(log_prediction, price, "scored record");
        Ok(price)
    }

    pub fn schema(&self) -> &[String] {
        &self.state.schema
    }

    pub fn state(&self) -> &TransformerState {
        &self.state
    }

    pub fn model(&self) -> &RandomForestRegressor {
        &self.model
    }
}
