//! `kilnwatch-anomaly`
//!
//! **Responsibility:** flag abnormal operating states from sensor history.
//!
//! Two scorers vote on every row: a learned outlier scorer and per-feature
//! normal-range bounds. Either one flagging a row marks it anomalous. Flagged
//! rows get a severity band and a root-cause narrative from a fixed lookup
//! table.

pub mod config;
pub mod detector;
pub mod features;
pub mod narrative;
pub mod profile;
pub mod severity;

pub use config::AnomalyConfig;
pub use detector::{
    AnomalyEnsembleDetector, AnomalyReport, Detection, DetectorModel, RowVerdict, TrainingSummary,
};
pub use features::{anomaly_engine, anomaly_features};
pub use narrative::{AffectedSensor, SensorFamily};
pub use profile::{FeatureRange, NormalRangeProfile, StatisticalVerdict};
pub use severity::{BatchSeverity, classify};
