//! Feature engineering
//!
//! The transformation is fitted once on cleaned training data and frozen into a
//! [`TransformerState`]: the ordered output schema, one-hot category membership,
//! derived-feature parameters, and per-column scaling. Applying the frozen state is
//! a pure function, so the feature vector built for one record at inference time is
//! structurally and numerically identical to the vectors the model was trained on.

mod config;
mod geo;
mod record;
mod transformer;

pub use config::TransformConfig;
pub use geo::{haversine_km, EARTH_RADIUS_KM};
pub use record::{FieldValue, RawRecord};
pub use transformer::{
    CategoryEncoding, FeatureSource, FeatureTransformer, ScalingParams, TransformerState,
    STATE_VERSION,
};
