use serde::{Deserialize, Serialize};

use kilnwatch_ai::IsolationForestLearner;
use kilnwatch_core::{AnalyticsError, AnalyticsResult};

/// Detector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Rolling window in samples.
    pub window: usize,
    /// Expected outlier fraction; shapes the outlier scorer's threshold.
    pub contamination: f64,
    pub n_estimators: usize,
    pub max_samples: usize,
    pub seed: u64,
    /// Fraction of features that must leave their bounds to flag a row.
    pub statistical_fraction: f64,
    /// Bounds are `mean ± sigma·std`.
    pub sigma: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            window: 6,
            contamination: 0.1,
            n_estimators: 200,
            max_samples: 256,
            seed: 42,
            statistical_fraction: 0.2,
            sigma: 3.0,
        }
    }
}

impl AnomalyConfig {
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.window == 0 {
            return Err(AnalyticsError::invalid_config("anomaly window must be >= 1"));
        }
        if !(0.0..1.0).contains(&self.statistical_fraction) {
            return Err(AnalyticsError::invalid_config(format!(
                "statistical fraction must be in [0, 1), got {}",
                self.statistical_fraction
            )));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(AnalyticsError::invalid_config("sigma must be positive"));
        }
        self.outlier_learner().validate()
    }

    pub fn outlier_learner(&self) -> IsolationForestLearner {
        IsolationForestLearner::new(self.contamination)
            .with_estimators(self.n_estimators)
            .with_max_samples(self.max_samples)
            .with_seed(self.seed)
    }
}
