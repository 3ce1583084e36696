//! Ensemble anomaly detector: learned outlier scorer OR statistical bounds.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kilnwatch_ai::{FeatureSchema, FeatureVector, OutlierLearner, OutlierScorer, TrainedModel};
use kilnwatch_core::{
    AnalyticsError, AnalyticsResult, ModelSlot, ModelState, SENSOR_CHANNELS, SensorSample,
    Severity, TrainingRunId,
};
use kilnwatch_features::FeatureFrame;

use crate::config::AnomalyConfig;
use crate::features::anomaly_features;
use crate::narrative::AffectedSensor;
use crate::profile::NormalRangeProfile;
use crate::severity::{BatchSeverity, classify};

/// The artifacts one training run commits together.
#[derive(Debug)]
pub struct DetectorModel {
    pub outlier: TrainedModel<dyn OutlierScorer>,
    pub profile: NormalRangeProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub run_id: TrainingRunId,
    pub generation: u64,
    pub normal_rows: usize,
    pub anomalous_rows: usize,
    pub feature_count: usize,
    /// Share of labelled anomalies the outlier scorer flags (if any labelled).
    pub outlier_detection_rate: Option<f64>,
    /// Share of labelled anomalies the statistical scorer flags (if any labelled).
    pub statistical_detection_rate: Option<f64>,
}

/// Both scorers' view of one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowVerdict {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub outlier_flag: bool,
    pub outlier_score: f64,
    pub statistical_flag: bool,
    pub statistical_score: f64,
    pub out_of_bounds: usize,
    pub is_anomaly: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub is_anomaly: bool,
    pub confidence: f64,
    pub severity: Severity,
    pub affected_sensors: Vec<AffectedSensor>,
    pub causes: Vec<String>,
    pub recommended_actions: Vec<String>,
}

/// Result of one detection call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub generation: u64,
    /// One verdict per evaluated row.
    pub verdicts: Vec<RowVerdict>,
    /// One report per flagged row.
    pub reports: Vec<AnomalyReport>,
    pub severity: BatchSeverity,
}

impl Detection {
    pub fn anomaly_count(&self) -> usize {
        self.reports.len()
    }

    pub fn has_anomalies(&self) -> bool {
        !self.reports.is_empty()
    }

    pub fn mean_confidence(&self) -> f64 {
        if self.verdicts.is_empty() {
            return 0.0;
        }
        self.verdicts.iter().map(|v| v.confidence).sum::<f64>() / self.verdicts.len() as f64
    }
}

#[derive(Debug)]
pub struct AnomalyEnsembleDetector {
    config: AnomalyConfig,
    learner: Arc<dyn OutlierLearner>,
    slot: ModelSlot<DetectorModel>,
}

impl AnomalyEnsembleDetector {
    pub const MODEL_NAME: &'static str = "anomaly_detector";

    pub fn new(config: AnomalyConfig) -> AnalyticsResult<Self> {
        let learner = Arc::new(config.outlier_learner());
        Self::with_learner(config, learner)
    }

    /// Use a custom outlier learner in place of the configured forest.
    pub fn with_learner(
        config: AnomalyConfig,
        learner: Arc<dyn OutlierLearner>,
    ) -> AnalyticsResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            learner,
            slot: ModelSlot::new(Self::MODEL_NAME),
        })
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    pub fn state(&self) -> ModelState {
        self.slot.state()
    }

    pub fn is_trained(&self) -> bool {
        self.slot.is_trained()
    }

    /// Fit the outlier scorer and the normal-range profile on the rows
    /// labelled non-anomalous, then commit both together.
    pub fn train(&self, samples: &[SensorSample]) -> AnalyticsResult<TrainingSummary> {
        if samples.is_empty() {
            return Err(AnalyticsError::training("anomaly training batch is empty"));
        }
        let frame = anomaly_features(samples, self.config.window)?;
        let schema = FeatureSchema::new(frame.names().iter().cloned())?;
        let matrix = schema.matrix(&frame)?;

        let (normal, anomalous): (Vec<_>, Vec<_>) = matrix
            .into_iter()
            .zip(samples)
            .partition(|(_, s)| !s.is_anomaly);
        let normal: Vec<Vec<f64>> = normal.into_iter().map(|(row, _)| row).collect();
        let anomalous: Vec<Vec<f64>> = anomalous.into_iter().map(|(row, _)| row).collect();

        if normal.is_empty() {
            return Err(AnalyticsError::training(
                "no non-anomalous rows to learn normal behaviour from",
            ));
        }

        let scorer = self.learner.fit(&normal)?;
        let profile = NormalRangeProfile::fit(
            &schema,
            &normal,
            self.config.sigma,
            self.config.statistical_fraction,
        )?;
        let model = DetectorModel {
            outlier: TrainedModel::new(Self::MODEL_NAME, schema.clone(), normal.len(), scorer),
            profile,
        };

        let (outlier_rate, statistical_rate) = if anomalous.is_empty() {
            (None, None)
        } else {
            let mut outlier_hits = 0usize;
            let mut statistical_hits = 0usize;
            for row in anomalous {
                let scores = score_vector(&model, &schema.vector(row))?;
                outlier_hits += usize::from(scores.outlier_flag);
                statistical_hits += usize::from(scores.statistical_flag);
            }
            let total = (samples.len() - normal.len()) as f64;
            (
                Some(outlier_hits as f64 / total),
                Some(statistical_hits as f64 / total),
            )
        };

        let run_id = TrainingRunId::new();
        let feature_count = schema.len();
        let normal_rows = normal.len();
        let committed = self.slot.commit(run_id, model);

        tracing::info!(
            model = Self::MODEL_NAME,
            normal_rows,
            features = feature_count,
            outlier_rate = ?outlier_rate,
            statistical_rate = ?statistical_rate,
            "anomaly detector trained"
        );

        Ok(TrainingSummary {
            run_id,
            generation: committed.generation,
            normal_rows,
            anomalous_rows: samples.len() - normal_rows,
            feature_count,
            outlier_detection_rate: outlier_rate,
            statistical_detection_rate: statistical_rate,
        })
    }

    /// Score every row of `samples`.
    pub fn detect(&self, samples: &[SensorSample]) -> AnalyticsResult<Detection> {
        self.detect_recent(samples, samples.len())
    }

    /// Compute features over the whole `history` but score only the
    /// trailing `evaluate_last` rows.
    pub fn detect_recent(
        &self,
        history: &[SensorSample],
        evaluate_last: usize,
    ) -> AnalyticsResult<Detection> {
        let model = self.slot.current()?;
        if history.is_empty() || evaluate_last == 0 {
            return Ok(Detection {
                generation: model.generation,
                verdicts: Vec::new(),
                reports: Vec::new(),
                severity: BatchSeverity::none(),
            });
        }

        let frame = anomaly_features(history, self.config.window)?;
        let schema = &model.outlier.schema;
        let start = frame.len().saturating_sub(evaluate_last);

        let verdicts = (start..frame.len())
            .map(|row| {
                let vector = schema.vector_from_frame(&frame, row)?;
                let s = score_vector(&model, &vector)?;
                let is_anomaly = s.outlier_flag || s.statistical_flag;
                Ok::<_, AnalyticsError>(RowVerdict {
                    index: row,
                    timestamp: frame.timestamps()[row],
                    outlier_flag: s.outlier_flag,
                    outlier_score: s.outlier_score,
                    statistical_flag: s.statistical_flag,
                    statistical_score: s.statistical_score,
                    out_of_bounds: s.out_of_bounds,
                    is_anomaly,
                    confidence: (s.outlier_score.abs() + s.statistical_score) / 2.0,
                })
            })
            .collect::<AnalyticsResult<Vec<_>>>()?;

        let flagged: Vec<f64> = verdicts
            .iter()
            .filter(|v| v.is_anomaly)
            .map(|v| v.confidence)
            .collect();
        let severity = BatchSeverity::from_confidences(&flagged);

        let reports: Vec<AnomalyReport> = verdicts
            .iter()
            .filter(|v| v.is_anomaly)
            .map(|v| build_report(v, &frame, &model.profile, severity.average_confidence))
            .collect();

        if reports.is_empty() {
            tracing::debug!(rows = verdicts.len(), "no anomalies detected");
        } else {
            tracing::info!(
                rows = verdicts.len(),
                anomalies = reports.len(),
                severity = %severity.level,
                "anomalies detected"
            );
        }

        Ok(Detection {
            generation: model.generation,
            verdicts,
            reports,
            severity,
        })
    }
}

struct Scores {
    outlier_flag: bool,
    outlier_score: f64,
    statistical_flag: bool,
    statistical_score: f64,
    out_of_bounds: usize,
}

fn score_vector(model: &DetectorModel, vector: &FeatureVector) -> AnalyticsResult<Scores> {
    let (outlier_score, outlier_flag) = model.outlier.score(vector)?;
    let stat = model.profile.evaluate(vector);
    Ok(Scores {
        outlier_flag,
        outlier_score,
        statistical_flag: stat.is_anomaly,
        statistical_score: stat.score,
        out_of_bounds: stat.out_of_bounds,
    })
}

fn build_report(
    verdict: &RowVerdict,
    frame: &FeatureFrame,
    profile: &NormalRangeProfile,
    batch_average: f64,
) -> AnomalyReport {
    let affected: Vec<AffectedSensor> = SENSOR_CHANNELS
        .iter()
        .filter_map(|channel| {
            let range = profile.range(channel)?;
            let value = frame.value(channel, verdict.index)?;
            (!range.contains(value)).then(|| AffectedSensor {
                sensor: (*channel).to_string(),
                value,
                lower_bound: range.lower_bound,
                upper_bound: range.upper_bound,
                deviation_percent: range.deviation_percent(value),
            })
        })
        .collect();

    let mut causes: Vec<String> = Vec::new();
    let mut actions: Vec<String> = Vec::new();
    for sensor in &affected {
        let (cause, action) = sensor.narrative();
        if !causes.contains(&cause) {
            causes.push(cause);
        }
        if !actions.contains(&action) {
            actions.push(action);
        }
    }

    AnomalyReport {
        index: verdict.index,
        timestamp: verdict.timestamp,
        is_anomaly: true,
        confidence: verdict.confidence,
        severity: classify(verdict.confidence, batch_average),
        affected_sensors: affected,
        causes,
        recommended_actions: actions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    /// Scores the first feature directly; flags anything above 10.
    #[derive(Debug)]
    struct FirstFeature;

    impl OutlierScorer for FirstFeature {
        fn score(&self, row: &[f64]) -> f64 {
            row[0]
        }
        fn threshold(&self) -> f64 {
            10_000.0
        }
    }

    #[derive(Debug)]
    struct FirstFeatureLearner;

    impl OutlierLearner for FirstFeatureLearner {
        fn fit(&self, _rows: &[Vec<f64>]) -> AnalyticsResult<Box<dyn OutlierScorer>> {
            Ok(Box::new(FirstFeature))
        }
    }

    fn sample(i: i64, temp: f64, is_anomaly: bool) -> SensorSample {
        SensorSample {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(5 * i),
            kiln_temperature: temp,
            system_pressure: 3.2 + (i % 3) as f64 * 0.01,
            material_moisture: 5.0 + (i % 2) as f64 * 0.1,
            material_flow_rate: 100.0 + (i % 4) as f64,
            oxygen_level: 3.0,
            co_level: 100.0 + (i % 5) as f64,
            nox_level: 400.0,
            mill_vibration: 2.0,
            kiln_vibration: 1.5,
            energy_consumption: 130.0 + (i % 3) as f64,
            is_anomaly,
        }
    }

    fn detector() -> AnomalyEnsembleDetector {
        AnomalyEnsembleDetector::with_learner(AnomalyConfig::default(), Arc::new(FirstFeatureLearner))
            .unwrap()
    }

    #[test]
    fn detect_before_train_is_untrained() {
        let err = detector().detect(&[sample(0, 1000.0, false)]).unwrap_err();
        assert_eq!(err, AnalyticsError::untrained(AnomalyEnsembleDetector::MODEL_NAME));
    }

    #[test]
    fn all_anomalous_training_batch_aborts() {
        let d = detector();
        let batch: Vec<_> = (0..20).map(|i| sample(i, 1000.0, true)).collect();
        assert!(matches!(d.train(&batch), Err(AnalyticsError::Training(_))));
        assert!(!d.is_trained());
    }

    #[test]
    fn outlier_flag_alone_is_enough() {
        let d = detector();
        let batch: Vec<_> = (0..50).map(|i| sample(i, 1000.0 + (i % 7) as f64, false)).collect();
        d.train(&batch).unwrap();

        let mut live = batch.clone();
        live.push(sample(50, 20_000.0, false));
        let out = d.detect_recent(&live, 1).unwrap();
        assert_eq!(out.verdicts.len(), 1);
        assert_eq!(out.verdicts[0].index, 50);
        assert!(out.verdicts[0].outlier_flag);
        assert!(out.verdicts[0].is_anomaly);
        assert_eq!(out.reports.len(), 1);
    }

    #[test]
    fn summary_reports_rates_for_labelled_anomalies() {
        let d = detector();
        let mut batch: Vec<_> = (0..40).map(|i| sample(i, 1000.0 + (i % 7) as f64, false)).collect();
        batch.push(sample(40, 50_000.0, true));
        let summary = d.train(&batch).unwrap();
        assert_eq!(summary.normal_rows, 40);
        assert_eq!(summary.anomalous_rows, 1);
        assert_eq!(summary.feature_count, 55);
        assert_eq!(summary.outlier_detection_rate, Some(1.0));
        assert_eq!(summary.generation, 1);
    }

    #[test]
    fn empty_history_yields_an_empty_detection() {
        let d = detector();
        let batch: Vec<_> = (0..10).map(|i| sample(i, 1000.0, false)).collect();
        d.train(&batch).unwrap();
        let out = d.detect(&[]).unwrap();
        assert!(out.verdicts.is_empty());
        assert_eq!(out.severity.level, Severity::Normal);
    }
}
