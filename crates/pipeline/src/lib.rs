//! `kilnwatch-pipeline`
//!
//! **Responsibility:** wire the analytics together into training and
//! per-cycle inference, and run cycles in the background.
//!
//! - `PipelineConfig`: component configs, JSON loading, env overrides.
//! - `AnalysisOrchestrator`: trains every model; runs anomaly, quality, and
//!   logistics stages concurrently per cycle and aggregates alerts/status.
//! - `AnalysisRunner`: interval/trigger-driven background cycles.

pub mod config;
pub mod orchestrator;
pub mod result;
pub mod runner;

pub use config::PipelineConfig;
pub use orchestrator::{
    ANOMALY_STAGE, AnalysisOrchestrator, CycleInput, LOGISTICS_STAGE, QUALITY_STAGE, TrainingData,
    TrainingReport,
};
pub use result::{
    Alert, AnalysisResult, PerformanceMetrics, QualityControl, Recommendations, derive_status,
};
pub use runner::{
    AnalysisRunner, AnalysisRunnerHandle, AnalysisSink, CycleSource, InMemoryAnalysisSink,
};
