//! Exhaustive hyperparameter grid search with k-fold cross-validation

use super::cross_validation::KFold;
use super::random_forest::{Hyperparameters, MaxFeatures, RandomForestRegressor};
use crate::error::{Result, StaypriceError};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Candidate values per hyperparameter. The cartesian product of all four
/// axes is the search space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![50, 100, 200],
            max_depth: vec![Some(10), Some(20), Some(30)],
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
        }
    }
}

impl ParamGrid {
    /// Enumerate combinations in lexicographic order of the declared axes,
    /// n_estimators varying slowest.
    pub fn combinations(&self) -> Result<Vec<Hyperparameters>> {
        if self.n_estimators.is_empty()
            || self.max_depth.is_empty()
            || self.min_samples_split.is_empty()
            || self.min_samples_leaf.is_empty()
        {
            return Err(StaypriceError::SearchConfigError(
                "every grid axis needs at least one candidate value".to_string(),
            ));
        }

        let mut combos = Vec::with_capacity(
            self.n_estimators.len()
                * self.max_depth.len()
                * self.min_samples_split.len()
                * self.min_samples_leaf.len(),
        );
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    for &min_samples_leaf in &self.min_samples_leaf {
                        combos.push(Hyperparameters {
                            n_estimators,
                            max_depth,
                            min_samples_split,
                            min_samples_leaf,
                        });
                    }
                }
            }
        }
        Ok(combos)
    }
}

/// Knobs of the search procedure itself, as opposed to the model grid
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub n_folds: usize,
    pub seed: u64,
    /// Worker thread cap for the search; None uses the global rayon pool
    pub n_jobs: Option<usize>,
    pub max_features: MaxFeatures,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_folds: 5,
            seed: 42,
            n_jobs: None,
            max_features: MaxFeatures::Sqrt,
        }
    }
}

/// Cross-validation outcome for one hyperparameter combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvResult {
    pub params: Hyperparameters,
    /// Validation MSE per fold
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
}

/// Result of a completed search
#[derive(Debug)]
pub struct SearchOutcome {
    pub best_params: Hyperparameters,
    /// Mean cross-validation MSE of the winner
    pub best_score: f64,
    /// One entry per combination, in grid order
    pub results: Vec<CvResult>,
    /// Winner refit on the full training set
    pub model: RandomForestRegressor,
}

/// Exhaustive search over a [`ParamGrid`].
///
/// Every (combination, fold) pair trains an independent forest with the
/// configured seed, so results are reproducible regardless of execution
/// order. The winner minimizes mean validation MSE; ties go to the earlier
/// combination in grid order.
#[derive(Debug, Clone, Default)]
pub struct GridSearch {
    pub grid: ParamGrid,
    pub config: SearchConfig,
}

impl GridSearch {
    pub fn new(grid: ParamGrid, config: SearchConfig) -> Self {
        Self { grid, config }
    }

    /// Run the full search and refit the winner
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchOutcome> {
        let combos = self.grid.combinations()?;
        let kfold = KFold::new(self.config.n_folds, self.config.seed);
        let splits = kfold.split(x.nrows())?;

        info!(
            combinations = combos.len(),
            folds = splits.len(),
            "starting grid search"
        );

        let tasks: Vec<(usize, usize)> = (0..combos.len())
            .flat_map(|ci| (0..splits.len()).map(move |fi| (ci, fi)))
            .collect();

        let evaluate = |(ci, fi): (usize, usize)| -> Result<(usize, usize, f64)> {
            let params = &combos[ci];
            let split = &splits[fi];

            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train =
                Array1::from_vec(split.train_indices.iter().map(|&i| y[i]).collect());
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_test: Vec<f64> = split.test_indices.iter().map(|&i| y[i]).collect();

            let mut forest = RandomForestRegressor::new(params.clone())
                .with_max_features(self.config.max_features)
                .with_random_state(self.config.seed);
            forest.fit(&x_train, &y_train)?;

            let predictions = forest.predict(&x_test)?;
            let mse = predictions
                .iter()
                .zip(y_test.iter())
                .map(|(p, a)| (p - a).powi(2))
                .sum::<f64>()
                / y_test.len() as f64;

            Ok((ci, fi, mse))
        };

        let scored: Vec<(usize, usize, f64)> = match self.config.n_jobs {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| StaypriceError::SearchConfigError(e.to_string()))?;
                pool.install(|| {
                    tasks
                        .par_iter()
                        .map(|&task| evaluate(task))
                        .collect::<Result<Vec<_>>>()
                })?
            }
            None => tasks
                .par_iter()
                .map(|&task| evaluate(task))
                .collect::<Result<Vec<_>>>()?,
        };

        let mut fold_scores: Vec<Vec<f64>> = vec![vec![0.0; splits.len()]; combos.len()];
        for (ci, fi, mse) in scored {
            fold_scores[ci][fi] = mse;
        }

        let results: Vec<CvResult> = combos
            .iter()
            .zip(fold_scores)
            .map(|(params, scores)| {
                let mean = scores.iter().sum::<f64>() / scores.len() as f64;
                let var = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>()
                    / scores.len() as f64;
                CvResult {
                    params: params.clone(),
                    fold_scores: scores,
                    mean_score: mean,
                    std_score: var.sqrt(),
                }
            })
            .collect();

        let mut best_idx = 0;
        for (i, result) in results.iter().enumerate() {
            if result.mean_score < results[best_idx].mean_score {
                best_idx = i;
            }
        }

        let best_params = results[best_idx].params.clone();
        let best_score = results[best_idx].mean_score;

        info!(
            params = ?best_params,
            mean_mse = best_score,
            "grid search complete, refitting winner"
        );

        let mut model = RandomForestRegressor::new(best_params.clone())
            .with_max_features(self.config.max_features)
            .with_random_state(self.config.seed);
        model.fit(x, y)?;

        Ok(SearchOutcome {
            best_params,
            best_score,
            results,
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(30, |i| 2.0 * i as f64 + 1.0);
        (x, y)
    }

    fn small_grid() -> ParamGrid {
        ParamGrid {
            n_estimators: vec![5, 10],
            max_depth: vec![Some(3)],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1],
        }
    }

    #[test]
    fn test_combination_count_and_order() {
        let combos = ParamGrid::default().combinations().unwrap();
        assert_eq!(combos.len(), 81);
        assert_eq!(
            combos[0],
            Hyperparameters {
                n_estimators: 50,
                max_depth: Some(10),
                min_samples_split: 2,
                min_samples_leaf: 1,
            }
        );
        // Last axis varies fastest
        assert_eq!(combos[1].min_samples_leaf, 2);
        assert_eq!(combos[80].n_estimators, 200);
    }

    #[test]
    fn test_empty_axis_rejected() {
        let grid = ParamGrid {
            n_estimators: vec![],
            ..Default::default()
        };
        let err = grid.combinations().unwrap_err();
        assert!(matches!(err, StaypriceError::SearchConfigError(_)));
    }

    #[test]
    fn test_search_produces_fitted_winner() {
        let (x, y) = toy_data();

        let search = GridSearch::new(
            small_grid(),
            SearchConfig {
                n_folds: 3,
                ..Default::default()
            },
        );
        let outcome = search.fit(&x, &y).unwrap();

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.model.is_fitted());
        assert!(outcome.best_score >= 0.0);
        assert!(outcome
            .results
            .iter()
            .all(|r| r.mean_score >= outcome.best_score));
        assert!(outcome
            .results
            .iter()
            .all(|r| r.fold_scores.len() == 3));
    }

    #[test]
    fn test_search_is_deterministic() {
        let (x, y) = toy_data();

        let run = || {
            let search = GridSearch::new(
                small_grid(),
                SearchConfig {
                    n_folds: 3,
                    seed: 11,
                    ..Default::default()
                },
            );
            search.fit(&x, &y).unwrap()
        };

        let a = run();
        let b = run();
        assert_eq!(a.best_params, b.best_params);
        assert_eq!(a.best_score, b.best_score);
        for (ra, rb) in a.results.iter().zip(b.results.iter()) {
            assert_eq!(ra.fold_scores, rb.fold_scores);
        }
    }

    #[test]
    fn test_n_jobs_matches_global_pool() {
        let (x, y) = toy_data();

        let fit_with = |n_jobs| {
            let search = GridSearch::new(
                small_grid(),
                SearchConfig {
                    n_folds: 3,
                    n_jobs,
                    ..Default::default()
                },
            );
            search.fit(&x, &y).unwrap()
        };

        let bounded = fit_with(Some(2));
        let global = fit_with(None);
        assert_eq!(bounded.best_params, global.best_params);
        assert_eq!(bounded.best_score, global.best_score);
    }
}
