//! Regression metrics on a held-out split.

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub mae: f64,
    pub r2: f64,
    pub samples: usize,
}

impl RegressionMetrics {
    /// Metrics for paired predictions/actuals; `None` when there are none.
    ///
    /// When the actuals have zero variance, `r2` is 1 for an exact fit and
    /// 0 otherwise.
    pub fn evaluate(predicted: &[f64], actual: &[f64]) -> Option<Self> {
        let n = predicted.len().min(actual.len());
        if n == 0 {
            return None;
        }
        let pairs = || predicted.iter().zip(actual).take(n);
        let nf = n as f64;

        let sse: f64 = pairs().map(|(p, a)| (p - a).powi(2)).sum();
        let mae = pairs().map(|(p, a)| (p - a).abs()).sum::<f64>() / nf;
        let mean = actual[..n].iter().sum::<f64>() / nf;
        let sst: f64 = actual[..n].iter().map(|a| (a - mean).powi(2)).sum();

        let r2 = if sst > 0.0 {
            1.0 - sse / sst
        } else if sse == 0.0 {
            1.0
        } else {
            0.0
        };

        Some(Self {
            mse: sse / nf,
            mae,
            r2,
            samples: n,
        })
    }
}
