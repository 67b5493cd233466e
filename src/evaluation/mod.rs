//! Model evaluation: regression metrics and a residual normality diagnostic

use crate::error::{Result, StaypriceError};
use crate::training::RandomForestRegressor;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Minimum sample size for the omnibus normality test; the kurtosis
/// approximation is unreliable below this.
const NORMALITY_MIN_SAMPLES: usize = 20;

/// D'Agostino-Pearson omnibus test result on the residuals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalityTest {
    /// K^2 statistic, the sum of squared skewness and kurtosis z-scores
    pub statistic: f64,
    /// Survival of chi-squared with 2 degrees of freedom at K^2
    pub p_value: f64,
    /// Whether normality is NOT rejected at the 5% level
    pub normal: bool,
}

/// Held-out evaluation of a fitted model, computed in target units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    pub n_samples: usize,
    pub residuals: Vec<f64>,
    /// None when fewer than 20 residuals are available
    pub normality: Option<NormalityTest>,
}

impl EvaluationReport {
    /// Compute metrics from true and predicted values
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(StaypriceError::ShapeError {
                expected: format!("predictions length = {}", y_true.len()),
                actual: format!("predictions length = {}", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(StaypriceError::DataError(
                "cannot evaluate on an empty dataset".to_string(),
            ));
        }

        let n = y_true.len() as f64;
        let residuals: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse: f64 = residuals.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = residuals.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean: f64 = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = residuals.iter().map(|e| e.powi(2)).sum();
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else {
            0.0
        };

        let normality = normality_test(&residuals);

        Ok(Self {
            mae,
            rmse: mse.sqrt(),
            r2,
            n_samples: y_true.len(),
            residuals,
            normality,
        })
    }
}

/// Score a fitted model on held-out data
pub fn evaluate(
    model: &RandomForestRegressor,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
) -> Result<EvaluationReport> {
    let predictions = model.predict(x_test)?;
    EvaluationReport::compute(y_test, &predictions)
}

/// D'Agostino-Pearson K^2 omnibus test. Returns None below the minimum
/// sample size or when the sample is degenerate.
pub fn normality_test(sample: &[f64]) -> Option<NormalityTest> {
    if sample.len() < NORMALITY_MIN_SAMPLES {
        return None;
    }

    let zs = skewness_z(sample)?;
    let zk = kurtosis_z(sample)?;

    let statistic = zs * zs + zk * zk;
    // chi2(df=2) survival function
    let p_value = (-statistic / 2.0).exp();

    Some(NormalityTest {
        statistic,
        p_value,
        normal: p_value > 0.05,
    })
}

fn central_moments(sample: &[f64]) -> (f64, f64, f64, f64) {
    let n = sample.len() as f64;
    let mean = sample.iter().sum::<f64>() / n;
    let m2 = sample.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let m3 = sample.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n;
    let m4 = sample.iter().map(|v| (v - mean).powi(4)).sum::<f64>() / n;
    (mean, m2, m3, m4)
}

/// Z-score of the sample skewness under normality
fn skewness_z(sample: &[f64]) -> Option<f64> {
    let n = sample.len() as f64;
    let (_, m2, m3, _) = central_moments(sample);
    if m2 <= 0.0 {
        return None;
    }

    let b1 = m3 / m2.powf(1.5);
    let y = b1 * ((n + 1.0) * (n + 3.0) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();

    let ratio = y / alpha;
    Some(delta * (ratio + (ratio * ratio + 1.0).sqrt()).ln())
}

/// Z-score of the sample kurtosis under normality (Anscombe-Glynn)
fn kurtosis_z(sample: &[f64]) -> Option<f64> {
    let n = sample.len() as f64;
    let (_, m2, _, m4) = central_moments(sample);
    if m2 <= 0.0 {
        return None;
    }

    let b2 = m4 / (m2 * m2);
    let expected = 3.0 * (n - 1.0) / (n + 1.0);
    let var_b2 =
        24.0 * n * (n - 2.0) * (n - 3.0) / ((n + 1.0).powi(2) * (n + 3.0) * (n + 5.0));
    let x = (b2 - expected) / var_b2.sqrt();

    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * (6.0 * (n + 3.0) * (n + 5.0) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0
        + 8.0 / sqrt_beta1
            * (2.0 / sqrt_beta1 + (1.0 + 4.0 / (sqrt_beta1 * sqrt_beta1)).sqrt());

    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    if denom == 0.0 {
        return None;
    }
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).cbrt();

    Some((term1 - term2) / (2.0 / (9.0 * a)).sqrt())
}
