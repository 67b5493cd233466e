//! Bootstrap-aggregated ensemble of regression trees

use super::decision_tree::DecisionTree;
use crate::error::{Result, StaypriceError};
use ndarray::{Array1, Array2, Axis};
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

// Decorrelates the per-node feature sampler from the bootstrap sampler,
// which both derive from the same per-tree seed.
const TREE_SEED_OFFSET: u64 = 0x517c_c1b7_2722_0a95;

/// Model artifact format version; bumped whenever the serialized layout changes
pub const MODEL_VERSION: u32 = 1;

/// Tunable ensemble hyperparameters, one point of the search grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl Hyperparameters {
    /// Save as a JSON artifact
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(&path).map_err(|e| {
            StaypriceError::ArtifactError(format!(
                "cannot write parameter artifact {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Load from a JSON artifact
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(&path).map_err(|e| {
            StaypriceError::ArtifactError(format!(
                "cannot open parameter artifact {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let params = serde_json::from_reader(BufReader::new(file))?;
        Ok(params)
    }
}

/// Per-node feature subsampling strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of the feature count
    Sqrt,
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

/// Random forest regressor.
///
/// Each tree trains on a bootstrap resample of the training set with a
/// deterministic per-tree seed, so a fixed `random_state` reproduces the
/// ensemble exactly. Prediction is the unweighted mean over trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    pub version: u32,
    trees: Vec<DecisionTree>,
    pub params: Hyperparameters,
    pub max_features: MaxFeatures,
    pub random_state: u64,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl RandomForestRegressor {
    pub fn new(params: Hyperparameters) -> Self {
        Self {
            version: MODEL_VERSION,
            trees: Vec::new(),
            params,
            max_features: MaxFeatures::Sqrt,
            random_state: 42,
            feature_importances: None,
            n_features: 0,
        }
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the forest to training data. A tree that fails to train aborts
    /// the whole fit.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(StaypriceError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(StaypriceError::TrainingError(
                "cannot fit a forest on an empty dataset".to_string(),
            ));
        }

        self.n_features = n_features;
        let max_features = self.max_features.resolve(n_features);
        let base_seed = self.random_state;

        let trees: Vec<DecisionTree> = (0..self.params.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                // Bootstrap sample with replacement
                let sample_indices: Vec<usize> = (0..n_samples)
                    .map(|_| (rng.next_u64() as usize) % n_samples)
                    .collect();

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Array1<f64> =
                    Array1::from_vec(sample_indices.iter().map(|&i| y[i]).collect());

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(self.params.min_samples_split)
                    .with_min_samples_leaf(self.params.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_random_state(seed.wrapping_add(TREE_SEED_OFFSET));
                if let Some(d) = self.params.max_depth {
                    tree = tree.with_max_depth(d);
                }

                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (slot, &val) in total.iter_mut().zip(imp.iter()) {
                    *slot += val;
                }
            }
        }

        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            for imp in &mut total {
                *imp /= sum;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total));
    }

    /// Predict by averaging the trees
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(StaypriceError::ModelNotFitted);
        }

        let all_predictions: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let n_samples = x.nrows();
        let predictions: Vec<f64> = (0..n_samples)
            .map(|i| {
                let sum: f64 = all_predictions.iter().map(|p| p[i]).sum();
                sum / all_predictions.len() as f64
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Mean impurity decrease across trees, normalized to sum to 1
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Width of the feature matrix the forest was trained on
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Persist the fitted ensemble as a JSON artifact
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        if self.trees.is_empty() {
            return Err(StaypriceError::ModelNotFitted);
        }
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Load a previously saved ensemble, rejecting unreadable or
    /// version-incompatible files
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(&path).map_err(|e| {
            StaypriceError::ArtifactError(format!(
                "cannot open model artifact {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let model: Self = serde_json::from_reader(BufReader::new(file))?;

        if model.version != MODEL_VERSION {
            return Err(StaypriceError::ArtifactError(format!(
                "model artifact version {} is incompatible with expected {}",
                model.version, MODEL_VERSION
            )));
        }

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy_data() -> (Array2<f64>, Array1<f64>) {
        (
            array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]],
            array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        )
    }

    #[test]
    fn test_regression_fit_predict() {
        let (x, y) = toy_data();

        let mut rf = RandomForestRegressor::new(Hyperparameters {
            n_estimators: 20,
            ..Default::default()
        })
        .with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;

        assert!(mse < 2.0, "MSE too high: {}", mse);
        assert_eq!(rf.n_trees(), 20);
        assert_eq!(rf.n_features(), 1);
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let (x, y) = toy_data();

        let fit = |seed| {
            let mut rf = RandomForestRegressor::new(Hyperparameters {
                n_estimators: 10,
                ..Default::default()
            })
            .with_random_state(seed);
            rf.fit(&x, &y).unwrap();
            rf.predict(&x).unwrap()
        };

        let a = fit(7);
        let b = fit(7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_unfitted_predict_fails() {
        let rf = RandomForestRegressor::new(Hyperparameters::default());
        let err = rf.predict(&array![[1.0]]).unwrap_err();
        assert!(matches!(err, StaypriceError::ModelNotFitted));
    }

    #[test]
    fn test_empty_dataset_fails() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);

        let mut rf = RandomForestRegressor::new(Hyperparameters::default());
        let err = rf.fit(&x, &y).unwrap_err();
        assert!(matches!(err, StaypriceError::TrainingError(_)));
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut rf = RandomForestRegressor::new(Hyperparameters {
            n_estimators: 10,
            ..Default::default()
        })
        .with_max_features(MaxFeatures::All)
        .with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] >= importances[1]);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (x, y) = toy_data();

        let mut rf = RandomForestRegressor::new(Hyperparameters {
            n_estimators: 5,
            ..Default::default()
        })
        .with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        rf.save(&path).unwrap();

        let loaded = RandomForestRegressor::load(&path).unwrap();
        assert_eq!(loaded.predict(&x).unwrap(), rf.predict(&x).unwrap());
    }

    #[test]
    fn test_model_version_mismatch_rejected() {
        let (x, y) = toy_data();

        let mut rf = RandomForestRegressor::new(Hyperparameters {
            n_estimators: 3,
            ..Default::default()
        })
        .with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        // Corrupt the version field and expect rejection
        let mut tampered = rf.clone();
        tampered.version = MODEL_VERSION + 1;
        let json = serde_json::to_string(&tampered).unwrap();
        std::fs::write(&path, json).unwrap();

        let err = RandomForestRegressor::load(&path).unwrap_err();
        assert!(matches!(err, StaypriceError::ArtifactError(_)));
    }

    #[test]
    fn test_missing_parameter_artifact_fails() {
        let err = Hyperparameters::load("/nonexistent/best_params.json").unwrap_err();
        assert!(matches!(err, StaypriceError::ArtifactError(_)));
    }

    #[test]
    fn test_hyperparameters_artifact_roundtrip() {
        let params = Hyperparameters {
            n_estimators: 200,
            max_depth: Some(30),
            min_samples_split: 5,
            min_samples_leaf: 2,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best_params.json");
        params.save(&path).unwrap();

        assert_eq!(Hyperparameters::load(&path).unwrap(), params);
    }
}
