//! `kilnwatch-ai`
//!
//! **Responsibility:** learning capability for the analytics stages.
//!
//! - Feature schemas and alignment-checked vectors.
//! - Learner seams (`RegressorLearner`, `OutlierLearner`) and the fitted
//!   model traits behind them.
//! - The default algorithms: a seeded isolation forest and ridge regression.
//! - Held-out metrics and train/test splits.
//!
//! Nothing here knows about kilns or trucks.

pub mod isolation_forest;
pub mod learner;
pub mod metrics;
pub mod ridge;
pub mod schema;
pub mod split;
pub mod trained;

pub use isolation_forest::{IsolationForest, IsolationForestLearner};
pub use learner::{OutlierLearner, OutlierScorer, Regressor, RegressorLearner};
pub use metrics::RegressionMetrics;
pub use ridge::{RidgeLearner, RidgeModel};
pub use schema::{FeatureSchema, FeatureVector};
pub use split::Split;
pub use trained::TrainedModel;
