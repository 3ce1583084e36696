//! Multi-target quality prediction.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use kilnwatch_ai::{
    FeatureSchema, RegressionMetrics, Regressor, RegressorLearner, RidgeLearner, TrainedModel,
    split,
};
use kilnwatch_core::{
    AnalyticsError, AnalyticsResult, MaterialSample, ModelSlot, ModelState, QualityGrade,
    QualitySample, SensorSample, TrainingRunId,
};
use kilnwatch_features::FeatureFrame;

use crate::features::{QUALITY_FEATURES, training_frame};

/// A predicted quality attribute and its specification.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTarget {
    Fineness,
    SettingTime,
    Strength,
}

impl QualityTarget {
    pub const ALL: [QualityTarget; 3] = [
        QualityTarget::Fineness,
        QualityTarget::SettingTime,
        QualityTarget::Strength,
    ];

    /// Training column holding the target value.
    pub fn column(self) -> &'static str {
        match self {
            QualityTarget::Fineness => "fineness",
            QualityTarget::SettingTime => "setting_time",
            QualityTarget::Strength => "compressive_strength_28d",
        }
    }

    pub fn target(self) -> f64 {
        match self {
            QualityTarget::Fineness => 350.0,
            QualityTarget::SettingTime => 165.0,
            QualityTarget::Strength => 53.0,
        }
    }

    pub fn tolerance(self) -> f64 {
        match self {
            QualityTarget::Fineness => 25.0,
            QualityTarget::SettingTime => 15.0,
            QualityTarget::Strength => 5.0,
        }
    }

    fn model_name(self) -> &'static str {
        match self {
            QualityTarget::Fineness => "quality_fineness",
            QualityTarget::SettingTime => "quality_setting_time",
            QualityTarget::Strength => "quality_strength",
        }
    }

    /// Score of a predicted value against this target's specification.
    pub fn score(self, predicted: f64) -> f64 {
        quality_score(predicted, self.target(), self.tolerance())
    }
}

/// `clamp(0, 100, 100 − |predicted − target| / tolerance × 50)`.
pub fn quality_score(predicted: f64, target: f64, tolerance: f64) -> f64 {
    let score = 100.0 - ((predicted - target).abs() / tolerance) * 50.0;
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Rolling window for the stability metrics, in samples.
    pub stability_window: usize,
    pub test_fraction: f64,
    pub seed: u64,
    pub ridge_alpha: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            stability_window: 12,
            test_fraction: 0.2,
            seed: 42,
            ridge_alpha: 1.0,
        }
    }
}

impl QualityConfig {
    pub fn with_stability_window(mut self, window: usize) -> Self {
        self.stability_window = window;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.stability_window == 0 {
            return Err(AnalyticsError::invalid_config("stability window must be >= 1"));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(AnalyticsError::invalid_config(format!(
                "test fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        Ok(())
    }
}

/// One fitted regressor per target, committed together.
#[derive(Debug)]
pub struct QualityModels {
    models: Vec<(QualityTarget, TrainedModel<dyn Regressor>)>,
}

impl QualityModels {
    pub fn get(&self, target: QualityTarget) -> Option<&TrainedModel<dyn Regressor>> {
        self.models
            .iter()
            .find(|(t, _)| *t == target)
            .map(|(_, m)| m)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityTrainingReport {
    pub run_id: TrainingRunId,
    pub generation: u64,
    pub rows: usize,
    pub metrics: BTreeMap<QualityTarget, RegressionMetrics>,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub fineness_score: f64,
    pub setting_score: f64,
    pub strength_score: f64,
    pub overall_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityPrediction {
    pub predicted_fineness: f64,
    pub predicted_setting_time: f64,
    pub predicted_strength: f64,
    pub quality_scores: QualityScores,
    pub quality_grade: QualityGrade,
    /// Model features absent from the state (zero-filled).
    pub missing_features: usize,
}

impl QualityPrediction {
    /// Build a prediction from point estimates.
    pub fn from_predictions(fineness: f64, setting_time: f64, strength: f64) -> Self {
        let fineness_score = QualityTarget::Fineness.score(fineness);
        let setting_score = QualityTarget::SettingTime.score(setting_time);
        let strength_score = QualityTarget::Strength.score(strength);
        let overall_score = (fineness_score + setting_score + strength_score) / 3.0;
        Self {
            predicted_fineness: fineness,
            predicted_setting_time: setting_time,
            predicted_strength: strength,
            quality_scores: QualityScores {
                fineness_score,
                setting_score,
                strength_score,
                overall_score,
            },
            quality_grade: QualityGrade::from_score(overall_score),
            missing_features: 0,
        }
    }

    pub fn predicted(&self, target: QualityTarget) -> f64 {
        match target {
            QualityTarget::Fineness => self.predicted_fineness,
            QualityTarget::SettingTime => self.predicted_setting_time,
            QualityTarget::Strength => self.predicted_strength,
        }
    }
}

#[derive(Debug)]
pub struct QualityPredictor {
    config: QualityConfig,
    learner: Arc<dyn RegressorLearner>,
    slot: ModelSlot<QualityModels>,
}

impl QualityPredictor {
    pub const MODEL_NAME: &'static str = "quality_predictor";

    pub fn new(config: QualityConfig) -> AnalyticsResult<Self> {
        let learner = Arc::new(RidgeLearner::new(config.ridge_alpha));
        Self::with_learner(config, learner)
    }

    pub fn with_learner(
        config: QualityConfig,
        learner: Arc<dyn RegressorLearner>,
    ) -> AnalyticsResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            learner,
            slot: ModelSlot::new(Self::MODEL_NAME),
        })
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    pub fn state(&self) -> ModelState {
        self.slot.state()
    }

    pub fn train(
        &self,
        sensor: &[SensorSample],
        material: &[MaterialSample],
        quality: &[QualitySample],
    ) -> AnalyticsResult<QualityTrainingReport> {
        if quality.is_empty() {
            return Err(AnalyticsError::training("no quality samples to train on"));
        }
        if sensor.is_empty() || material.is_empty() {
            return Err(AnalyticsError::training(
                "quality training needs sensor and material history",
            ));
        }
        let frame = training_frame(sensor, material, quality, self.config.stability_window)?;
        self.train_on_frame(&frame)
    }

    /// Fit every target on a prepared frame holding the model features and
    /// target columns.
    pub fn train_on_frame(&self, frame: &FeatureFrame) -> AnalyticsResult<QualityTrainingReport> {
        let schema = FeatureSchema::new(QUALITY_FEATURES)?;
        let rows = schema.matrix(frame)?;
        let halves = split::shuffled(rows.len(), self.config.test_fraction, self.config.seed)?;
        let train_rows = split::take(&rows, &halves.train);
        let test_rows = split::take(&rows, &halves.test);

        let mut models = Vec::with_capacity(QualityTarget::ALL.len());
        let mut metrics = BTreeMap::new();
        for target in QualityTarget::ALL {
            let y = frame.require(target.column())?;
            let y_train = split::take(y, &halves.train);
            let y_test = split::take(y, &halves.test);

            let fitted = self.learner.fit(&train_rows, &y_train)?;
            let predicted: Vec<f64> = test_rows.iter().map(|r| fitted.predict(r)).collect();
            let m = RegressionMetrics::evaluate(&predicted, &y_test)
                .ok_or_else(|| AnalyticsError::training("empty quality test split"))?;

            tracing::info!(
                target = target.column(),
                mse = m.mse,
                mae = m.mae,
                r2 = m.r2,
                "quality regressor evaluated"
            );
            metrics.insert(target, m);
            models.push((
                target,
                TrainedModel::new(target.model_name(), schema.clone(), train_rows.len(), fitted),
            ));
        }

        let run_id = TrainingRunId::new();
        let committed = self.slot.commit(run_id, QualityModels { models });
        Ok(QualityTrainingReport {
            run_id,
            generation: committed.generation,
            rows: rows.len(),
            metrics,
        })
    }

    /// Predict all targets from a named state. Absent features are zero-filled.
    pub fn predict(&self, state: &BTreeMap<String, f64>) -> AnalyticsResult<QualityPrediction> {
        let committed = self.slot.current()?;
        let mut point = [0.0; 3];
        let mut missing_features = 0;
        for (slot, target) in point.iter_mut().zip(QualityTarget::ALL) {
            let model = committed
                .get(target)
                .ok_or_else(|| AnalyticsError::untrained(target.model_name()))?;
            let (vector, missing) = model.schema.vector_from_map(state);
            missing_features = missing.len();
            *slot = model.predict(&vector)?;
        }
        if missing_features > 0 {
            tracing::debug!(missing = missing_features, "quality features zero-filled");
        }

        let mut prediction = QualityPrediction::from_predictions(point[0], point[1], point[2]);
        prediction.missing_features = missing_features;
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn score_bands_match_the_specification() {
        assert_eq!(quality_score(350.0, 350.0, 25.0), 100.0);
        assert_eq!(quality_score(375.0, 350.0, 25.0), 50.0);
        assert_eq!(quality_score(300.0, 350.0, 25.0), 0.0);
        assert_eq!(quality_score(f64::NAN, 350.0, 25.0), 0.0);
    }

    #[test]
    fn grade_follows_the_overall_score() {
        let p = QualityPrediction::from_predictions(350.0, 165.0, 53.0);
        assert_eq!(p.quality_scores.overall_score, 100.0);
        assert_eq!(p.quality_grade, QualityGrade::Excellent);

        let p = QualityPrediction::from_predictions(300.0, 165.0, 53.0);
        assert!((p.quality_scores.overall_score - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(p.quality_grade, QualityGrade::Acceptable);
    }

    #[test]
    fn predict_before_train_is_untrained() {
        let predictor = QualityPredictor::new(QualityConfig::default()).unwrap();
        let err = predictor.predict(&BTreeMap::new()).unwrap_err();
        assert_eq!(err, AnalyticsError::untrained(QualityPredictor::MODEL_NAME));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: sub-scores stay in [0, 100] and overall is their mean.
        #[test]
        fn scores_are_clamped_and_averaged(
            fineness in -1.0e6f64..1.0e6,
            setting in -1.0e6f64..1.0e6,
            strength in -1.0e6f64..1.0e6,
        ) {
            let p = QualityPrediction::from_predictions(fineness, setting, strength);
            let s = p.quality_scores;
            for v in [s.fineness_score, s.setting_score, s.strength_score, s.overall_score] {
                prop_assert!((0.0..=100.0).contains(&v));
            }
            let mean = (s.fineness_score + s.setting_score + s.strength_score) / 3.0;
            prop_assert!((s.overall_score - mean).abs() < 1e-9);
        }
    }
}
