//! Standardised ridge regression solved in closed form.

use serde::{Deserialize, Serialize};

use kilnwatch_core::{AnalyticsError, AnalyticsResult};

use crate::learner::{Regressor, RegressorLearner, check_rows};

/// Ridge learner. Features are standardised (zero-variance columns are left
/// centred but unscaled) and the intercept is the target mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeLearner {
    pub alpha: f64,
}

impl Default for RidgeLearner {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl RidgeLearner {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    pub fn fit_ridge(&self, rows: &[Vec<f64>], targets: &[f64]) -> AnalyticsResult<RidgeModel> {
        if !(self.alpha.is_finite() && self.alpha >= 0.0) {
            return Err(AnalyticsError::invalid_config(format!(
                "ridge alpha must be finite and >= 0, got {}",
                self.alpha
            )));
        }
        let width = check_rows(rows)?;
        if targets.len() != rows.len() {
            return Err(AnalyticsError::training(format!(
                "{} rows but {} targets",
                rows.len(),
                targets.len()
            )));
        }
        if targets.iter().any(|t| !t.is_finite()) {
            return Err(AnalyticsError::training("targets contain non-finite values"));
        }

        let n = rows.len() as f64;
        let means: Vec<f64> = (0..width)
            .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let scales: Vec<f64> = (0..width)
            .map(|j| {
                let var = rows.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n;
                let sd = var.sqrt();
                if sd > 1e-12 { sd } else { 1.0 }
            })
            .collect();
        let y_mean = targets.iter().sum::<f64>() / n;

        let z: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| (0..width).map(|j| (r[j] - means[j]) / scales[j]).collect())
            .collect();

        // (ZᵀZ + αI) w = Zᵀ(y - ȳ)
        let mut a = vec![vec![0.0; width]; width];
        let mut b = vec![0.0; width];
        for (row, y) in z.iter().zip(targets) {
            let yc = y - y_mean;
            for i in 0..width {
                b[i] += row[i] * yc;
                for j in i..width {
                    a[i][j] += row[i] * row[j];
                }
            }
        }
        for i in 0..width {
            for j in 0..i {
                a[i][j] = a[j][i];
            }
            // Tiny jitter keeps alpha = 0 solvable on rank-deficient data.
            a[i][i] += self.alpha.max(1e-9);
        }

        let weights = solve(a, b)
            .ok_or_else(|| AnalyticsError::training("ridge normal equations are singular"))?;

        Ok(RidgeModel {
            means,
            scales,
            weights,
            intercept: y_mean,
        })
    }
}

impl RegressorLearner for RidgeLearner {
    fn fit(&self, rows: &[Vec<f64>], targets: &[f64]) -> AnalyticsResult<Box<dyn Regressor>> {
        Ok(Box::new(self.fit_ridge(rows, targets)?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeModel {
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<f64>,
    intercept: f64,
}

impl RidgeModel {
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Coefficients on the original (unstandardised) feature scale.
    pub fn coefficients(&self) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.scales)
            .map(|(w, s)| w / s)
            .collect()
    }
}

impl Regressor for RidgeModel {
    fn predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .weights
                .iter()
                .enumerate()
                .map(|(j, w)| {
                    let x = row.get(j).copied().unwrap_or(self.means[j]);
                    w * (x - self.means[j]) / self.scales[j]
                })
                .sum::<f64>()
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_a_noise_free_linear_relation() {
        let rows: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![i as f64, (i % 7) as f64])
            .collect();
        let targets: Vec<f64> = rows.iter().map(|r| 3.0 * r[0] - 2.0 * r[1] + 5.0).collect();

        let model = RidgeLearner::new(1e-6).fit_ridge(&rows, &targets).unwrap();
        let coef = model.coefficients();
        assert!((coef[0] - 3.0).abs() < 1e-4, "{coef:?}");
        assert!((coef[1] + 2.0).abs() < 1e-4, "{coef:?}");
        assert!((model.predict(&[10.0, 3.0]) - 29.0).abs() < 1e-3);
    }

    #[test]
    fn constant_feature_does_not_break_the_solve() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 4.0]).collect();
        let targets: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let model = RidgeLearner::default().fit_ridge(&rows, &targets).unwrap();
        assert!(model.predict(&[5.0, 4.0]).is_finite());
        assert_eq!(model.coefficients()[1], 0.0);
    }

    #[test]
    fn alpha_shrinks_toward_the_mean() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..10).map(|i| 2.0 * i as f64).collect();
        let loose = RidgeLearner::new(0.0).fit_ridge(&rows, &targets).unwrap();
        let tight = RidgeLearner::new(1e6).fit_ridge(&rows, &targets).unwrap();
        let mean = 9.0;
        assert!((tight.predict(&[9.0]) - mean).abs() < (loose.predict(&[9.0]) - mean).abs());
    }

    #[test]
    fn mismatched_targets_fail_training() {
        let err = RidgeLearner::default()
            .fit_ridge(&[vec![1.0], vec![2.0]], &[1.0])
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Training(_)));
    }
}
