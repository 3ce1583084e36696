//! Learning capability seams.
//!
//! The pipeline only needs "fit a regressor" and "fit an outlier scorer";
//! concrete algorithms live behind these traits so components can be given
//! any implementation (tests inject deterministic stubs).

use core::fmt::Debug;

use kilnwatch_core::AnalyticsResult;

/// A fitted regression function over a fixed-width feature row.
pub trait Regressor: Send + Sync + Debug {
    fn predict(&self, row: &[f64]) -> f64;
}

/// A fitted outlier scorer.
///
/// Scores are oriented so that larger means more anomalous.
pub trait OutlierScorer: Send + Sync + Debug {
    fn score(&self, row: &[f64]) -> f64;

    /// Scores strictly above this value are outliers.
    fn threshold(&self) -> f64;

    fn is_outlier(&self, row: &[f64]) -> bool {
        self.score(row) > self.threshold()
    }
}

/// Fits a [`Regressor`] from row-major features and one target per row.
pub trait RegressorLearner: Send + Sync + Debug {
    fn fit(&self, rows: &[Vec<f64>], targets: &[f64]) -> AnalyticsResult<Box<dyn Regressor>>;
}

/// Fits an [`OutlierScorer`] from row-major features.
pub trait OutlierLearner: Send + Sync + Debug {
    fn fit(&self, rows: &[Vec<f64>]) -> AnalyticsResult<Box<dyn OutlierScorer>>;
}

/// Shared shape checks for learners.
pub(crate) fn check_rows(rows: &[Vec<f64>]) -> AnalyticsResult<usize> {
    use kilnwatch_core::AnalyticsError;

    let first = rows
        .first()
        .ok_or_else(|| AnalyticsError::training("no training rows"))?;
    let width = first.len();
    if width == 0 {
        return Err(AnalyticsError::training("training rows have no features"));
    }
    if let Some(i) = rows.iter().position(|r| r.len() != width) {
        return Err(AnalyticsError::training(format!(
            "row {i} has {} features, expected {width}",
            rows[i].len()
        )));
    }
    if rows.iter().flatten().any(|v| !v.is_finite()) {
        return Err(AnalyticsError::training("training rows contain non-finite values"));
    }
    Ok(width)
}
