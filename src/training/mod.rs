//! Model training and hyperparameter search
//!
//! The trainable model is a bootstrap-aggregated ensemble of regression trees.
//! [`GridSearch`] evaluates every hyperparameter combination with seeded k-fold
//! cross-validation and refits the winner on the full training set.

mod cross_validation;
mod decision_tree;
mod grid_search;
mod random_forest;

pub use cross_validation::{CvSplit, KFold};
pub use decision_tree::{DecisionTree, TreeNode};
pub use grid_search::{CvResult, GridSearch, ParamGrid, SearchConfig, SearchOutcome};
pub use random_forest::{Hyperparameters, MaxFeatures, RandomForestRegressor, MODEL_VERSION};
