//! Analytics error model.

use thiserror::Error;

/// Result type used across the analytics crates.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Analytics-level error.
///
/// Training-time variants are fatal to the training call. Inference-time
/// variants are fatal to the single call that raised them, never to the
/// process; the orchestrator folds them into `PipelineStage`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalyticsError {
    /// An inference operation ran before its model was committed.
    #[error("model `{model}` is not trained")]
    UntrainedModel { model: String },

    /// A feature vector does not match the schema a model was fit on.
    #[error("feature alignment failed for `{model}`: {reason}")]
    FeatureAlignment { model: String, reason: String },

    /// A sample failed validation (composition sum, non-finite fields).
    #[error("malformed sample: {0}")]
    MalformedSample(String),

    /// One analytic stage failed during an inference cycle.
    #[error("pipeline stage `{stage}` failed: {message}")]
    PipelineStage { stage: String, message: String },

    /// Training could not produce a usable model.
    #[error("training failed: {0}")]
    Training(String),

    /// A declared feature column is absent from a frame.
    #[error("missing column `{0}`")]
    MissingColumn(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AnalyticsError {
    pub fn untrained(model: impl Into<String>) -> Self {
        Self::UntrainedModel {
            model: model.into(),
        }
    }

    pub fn alignment(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FeatureAlignment {
            model: model.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedSample(msg.into())
    }

    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PipelineStage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn missing_column(name: impl Into<String>) -> Self {
        Self::MissingColumn(name.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Wrap any error as a failure of the named pipeline stage.
    ///
    /// Already-wrapped stage errors keep their original stage name.
    pub fn into_stage(self, stage: &str) -> Self {
        match self {
            e @ AnalyticsError::PipelineStage { .. } => e,
            other => AnalyticsError::stage(stage, other.to_string()),
        }
    }
}
