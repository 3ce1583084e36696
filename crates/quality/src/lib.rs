//! `kilnwatch-quality`
//!
//! **Responsibility:** predict cement quality from process state and propose
//! corrective set-point changes.
//!
//! - `QualityPredictor`: one regressor per target (fineness, setting time,
//!   28-day strength) over a shared feature schema, plus score/grade banding.
//! - `CorrectionEngine`: tagged rules that turn a poor prediction into
//!   process and material adjustments.

pub mod correction;
pub mod features;
pub mod predictor;

pub use correction::{
    ACTION_THRESHOLD, Adjustment, AdjustmentKind, CorrectionEngine, CorrectionPlan, CorrectionRule,
    EstimatedImpact,
};
pub use features::{QUALITY_FEATURES, live_state, state_frame, training_frame};
pub use predictor::{
    QualityConfig, QualityModels, QualityPrediction, QualityPredictor, QualityScores,
    QualityTarget, QualityTrainingReport, quality_score,
};
