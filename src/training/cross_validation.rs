//! Seeded k-fold cross-validation splitter

use crate::error::{Result, StaypriceError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A single train/validation split
#[derive(Debug, Clone)]
pub struct CvSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// K-fold splitter with a seeded shuffle, so the same seed always yields
/// the same fold assignment.
#[derive(Debug, Clone)]
pub struct KFold {
    pub n_splits: usize,
    pub seed: u64,
}

impl Default for KFold {
    fn default() -> Self {
        Self {
            n_splits: 5,
            seed: 42,
        }
    }
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    /// Partition `0..n_samples` into folds. Every index lands in exactly one
    /// test fold; earlier folds absorb the remainder when the sample count
    /// does not divide evenly.
    pub fn split(&self, n_samples: usize) -> Result<Vec<CvSplit>> {
        if self.n_splits < 2 {
            return Err(StaypriceError::SearchConfigError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < self.n_splits {
            return Err(StaypriceError::SearchConfigError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, self.n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);

        let base = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut splits = Vec::with_capacity(self.n_splits);
        let mut current = 0;

        for fold_idx in 0..self.n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CvSplit {
                train_indices,
                test_indices,
                fold_idx,
            });

            current += fold_size;
        }

        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_index_tested_once() {
        let kfold = KFold::new(5, 42);
        let splits = kfold.split(23).unwrap();

        assert_eq!(splits.len(), 5);

        let mut seen = vec![0usize; 23];
        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 23);
            for &idx in &split.test_indices {
                seen[idx] += 1;
            }
            for &idx in &split.test_indices {
                assert!(!split.train_indices.contains(&idx));
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_remainder_goes_to_early_folds() {
        let splits = KFold::new(5, 42).split(23).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![5, 5, 5, 4, 4]);
    }

    #[test]
    fn test_same_seed_same_splits() {
        let a = KFold::new(4, 7).split(20).unwrap();
        let b = KFold::new(4, 7).split(20).unwrap();
        for (sa, sb) in a.iter().zip(b.iter()) {
            assert_eq!(sa.test_indices, sb.test_indices);
            assert_eq!(sa.train_indices, sb.train_indices);
        }
    }

    #[test]
    fn test_too_few_splits() {
        let err = KFold::new(1, 42).split(10).unwrap_err();
        assert!(matches!(err, StaypriceError::SearchConfigError(_)));
    }

    #[test]
    fn test_too_few_samples() {
        let err = KFold::new(5, 42).split(3).unwrap_err();
        assert!(matches!(err, StaypriceError::SearchConfigError(_)));
    }
}
