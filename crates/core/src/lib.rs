//! `kilnwatch-core`: shared building blocks for the analytics pipeline.
//!
//! This crate contains the error model, the sample records, the shared
//! severity/status vocabulary, and the train/commit slot every learned
//! artifact lives in. No numerics, no IO.

pub mod error;
pub mod id;
pub mod model;
pub mod samples;
pub mod vocabulary;

pub use error::{AnalyticsError, AnalyticsResult};
pub use id::{CycleId, TrainingRunId};
pub use model::{Committed, ModelSlot, ModelState};
pub use samples::{
    MATERIAL_COLUMNS, MaterialSample, QUALITY_COLUMNS, QualitySample, SENSOR_CHANNELS,
    SensorSample,
};
pub use vocabulary::{Priority, QualityGrade, Severity, SystemStatus};
