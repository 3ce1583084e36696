//! One training entry point and one inference cycle across all analytics.
//!
//! Training runs the three components to completion one after another and
//! fails on the first error. An inference cycle runs the anomaly, quality,
//! and logistics stages concurrently on scoped threads against the models
//! committed at that moment; a stage that fails (or panics) is reported in
//! `AnalysisResult::error` and leaves its sibling outputs intact.

use std::any::Any;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use kilnwatch_anomaly::{AnomalyEnsembleDetector, Detection, TrainingSummary};
use kilnwatch_core::{
    AnalyticsError, AnalyticsResult, CycleId, MaterialSample, QualityGrade, QualitySample,
    SensorSample, Severity,
};
use kilnwatch_logistics::{
    DemandForecaster, ForecastTrainingReport, LogisticsAdvisor, LogisticsRecommendations,
};
use kilnwatch_quality::{CorrectionEngine, QualityPredictor, QualityTrainingReport, live_state};

use crate::config::PipelineConfig;
use crate::result::{
    Alert, AnalysisResult, PerformanceMetrics, QualityControl, Recommendations, derive_status,
};

pub const ANOMALY_STAGE: &str = "anomaly_detection";
pub const QUALITY_STAGE: &str = "quality_control";
pub const LOGISTICS_STAGE: &str = "logistics";

/// Supply efficiency below which a logistics alert is raised.
const EFFICIENCY_ALERT_FLOOR: f64 = 0.7;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingData {
    pub sensor: Vec<SensorSample>,
    pub material: Vec<MaterialSample>,
    pub quality: Vec<QualitySample>,
}

/// Recent history for one cycle; the last sensor sample is the live reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleInput {
    pub sensor_history: Vec<SensorSample>,
    pub material_history: Vec<MaterialSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub logistics: ForecastTrainingReport,
    pub quality: QualityTrainingReport,
    pub anomaly: TrainingSummary,
}

#[derive(Debug)]
pub struct AnalysisOrchestrator {
    config: PipelineConfig,
    detector: AnomalyEnsembleDetector,
    quality: QualityPredictor,
    corrections: CorrectionEngine,
    advisor: LogisticsAdvisor,
}

impl AnalysisOrchestrator {
    pub fn new(config: PipelineConfig) -> AnalyticsResult<Self> {
        config.validate()?;
        let detector = AnomalyEnsembleDetector::new(config.anomaly.clone())?;
        let quality = QualityPredictor::new(config.quality.clone())?;
        let forecaster = Arc::new(DemandForecaster::new(config.logistics.clone())?);
        Ok(Self::from_parts(config, detector, quality, forecaster))
    }

    /// Assemble from pre-built components (custom learners, shared forecaster).
    pub fn from_parts(
        config: PipelineConfig,
        detector: AnomalyEnsembleDetector,
        quality: QualityPredictor,
        forecaster: Arc<DemandForecaster>,
    ) -> Self {
        Self {
            config,
            detector,
            quality,
            corrections: CorrectionEngine::default(),
            advisor: LogisticsAdvisor::new(forecaster),
        }
    }

    pub fn with_corrections(mut self, corrections: CorrectionEngine) -> Self {
        self.corrections = corrections;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn detector(&self) -> &AnomalyEnsembleDetector {
        &self.detector
    }

    pub fn quality(&self) -> &QualityPredictor {
        &self.quality
    }

    /// Every component has a committed model.
    pub fn is_ready(&self) -> bool {
        self.detector.is_trained()
            && self.quality.state().is_trained()
            && self.advisor.forecaster().is_trained()
    }

    pub fn train(&self, data: &TrainingData) -> AnalyticsResult<TrainingReport> {
        tracing::info!(
            sensor_rows = data.sensor.len(),
            material_rows = data.material.len(),
            quality_rows = data.quality.len(),
            "training analytics models"
        );

        let logistics = self
            .advisor
            .forecaster()
            .train(&data.sensor, &data.material)?;
        tracing::info!(generation = logistics.generation, "demand forecaster trained");

        let quality = self
            .quality
            .train(&data.sensor, &data.material, &data.quality)?;
        tracing::info!(generation = quality.generation, "quality predictor trained");

        let anomaly = self.detector.train(&data.sensor)?;
        tracing::info!(generation = anomaly.generation, "anomaly detector trained");

        Ok(TrainingReport {
            logistics,
            quality,
            anomaly,
        })
    }

    /// Run one inference cycle. Never fails as a whole: stage failures are
    /// folded into the result with `system_status = error`.
    pub fn run_cycle(&self, input: &CycleInput) -> AnalysisResult {
        let cycle_id = CycleId::new();
        let Some(live) = input.sensor_history.last() else {
            tracing::warn!(cycle = %cycle_id, "cycle input has no sensor readings");
            return AnalysisResult {
                cycle_id,
                timestamp: Utc::now(),
                system_status: derive_status(&[], true),
                alerts: Vec::new(),
                recommendations: Recommendations::default(),
                performance_metrics: PerformanceMetrics::default(),
                error: Some(
                    AnalyticsError::malformed("cycle input has no sensor readings").to_string(),
                ),
            };
        };

        let (anomaly, quality, logistics) = thread::scope(|s| {
            let anomaly = s.spawn(|| self.anomaly_stage(input));
            let quality = s.spawn(|| self.quality_stage(input));
            let logistics = s.spawn(|| self.logistics_stage(input));
            (
                join_stage(ANOMALY_STAGE, anomaly.join()),
                join_stage(QUALITY_STAGE, quality.join()),
                join_stage(LOGISTICS_STAGE, logistics.join()),
            )
        });

        let mut alerts = Vec::new();
        let mut errors = Vec::new();
        let mut recommendations = Recommendations::default();
        let mut metrics = PerformanceMetrics {
            energy_efficiency: live.material_flow_rate / (live.energy_consumption + 1.0),
            material_flow_rate: live.material_flow_rate,
            system_pressure: live.system_pressure,
            kiln_temperature: live.kiln_temperature,
            quality_score: 0.0,
            anomaly_confidence: 0.0,
        };

        match anomaly {
            Ok(detection) => {
                metrics.anomaly_confidence = detection.mean_confidence();
                if detection.has_anomalies() {
                    alerts.push(Alert::Anomaly {
                        severity: detection.severity.level,
                        count: detection.anomaly_count(),
                        details: detection.reports,
                    });
                }
            }
            Err(e) => errors.push(e),
        }

        match quality {
            Ok(control) => {
                let prediction = &control.predictions;
                metrics.quality_score = prediction.quality_scores.overall_score;
                if let Some(alert) = quality_alert(prediction.quality_grade, prediction) {
                    alerts.push(alert);
                }
                recommendations.quality_control = Some(control);
            }
            Err(e) => errors.push(e),
        }

        match logistics {
            Ok(rec) => {
                let m = &rec.performance_metrics;
                if m.current_supply_efficiency < EFFICIENCY_ALERT_FLOOR {
                    alerts.push(Alert::Logistics {
                        severity: Severity::Medium,
                        message: "Low supply chain efficiency detected".to_owned(),
                        details: m.clone(),
                    });
                }
                recommendations.logistics = Some(rec);
            }
            Err(e) => errors.push(e),
        }

        for e in &errors {
            tracing::error!(cycle = %cycle_id, error = %e, "analysis stage failed");
        }
        let system_status = derive_status(&alerts, !errors.is_empty());
        let error = (!errors.is_empty()).then(|| {
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        });
        tracing::info!(
            cycle = %cycle_id,
            status = ?system_status,
            alerts = alerts.len(),
            "analysis cycle completed"
        );

        AnalysisResult {
            cycle_id,
            timestamp: live.timestamp,
            system_status,
            alerts,
            recommendations,
            performance_metrics: metrics,
            error,
        }
    }

    fn anomaly_stage(&self, input: &CycleInput) -> AnalyticsResult<Detection> {
        self.detector
            .detect_recent(&input.sensor_history, self.config.anomaly_rows)
    }

    fn quality_stage(&self, input: &CycleInput) -> AnalyticsResult<QualityControl> {
        let state = live_state(
            &input.sensor_history,
            &input.material_history,
            self.config.quality.stability_window,
        )?;
        let predictions = self.quality.predict(&state)?;
        let corrections = self.corrections.plan(&predictions, &state);
        Ok(QualityControl {
            predictions,
            corrections,
        })
    }

    fn logistics_stage(&self, input: &CycleInput) -> AnalyticsResult<LogisticsRecommendations> {
        self.advisor
            .recommend(&input.sensor_history, &input.material_history)
    }
}

/// Grades worse than good raise an alert: high for poor, medium otherwise.
fn quality_alert(
    grade: QualityGrade,
    prediction: &kilnwatch_quality::QualityPrediction,
) -> Option<Alert> {
    let severity = match grade {
        QualityGrade::Poor => Severity::High,
        QualityGrade::Acceptable => Severity::Medium,
        QualityGrade::Excellent | QualityGrade::Good => return None,
    };
    Some(Alert::Quality {
        severity,
        message: format!("Quality grade {} predicted", grade.as_u8()),
        details: prediction.clone(),
    })
}

fn join_stage<T>(
    stage: &str,
    joined: Result<AnalyticsResult<T>, Box<dyn Any + Send + 'static>>,
) -> AnalyticsResult<T> {
    match joined {
        Ok(result) => result.map_err(|e| e.into_stage(stage)),
        Err(payload) => Err(AnalyticsError::stage(
            stage,
            format!("panicked: {}", panic_message(payload.as_ref())),
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_errors_keep_the_stage_name() {
        let err = join_stage::<()>(
            QUALITY_STAGE,
            Ok(Err(AnalyticsError::untrained(QualityPredictor::MODEL_NAME))),
        )
        .unwrap_err();
        assert_eq!(
            err,
            AnalyticsError::stage(QUALITY_STAGE, "model `quality_predictor` is not trained")
        );
    }

    #[test]
    fn panics_become_stage_errors() {
        let joined = thread::scope(|s| s.spawn(|| -> AnalyticsResult<()> { panic!("boom") }).join());
        let err = join_stage(LOGISTICS_STAGE, joined).unwrap_err();
        assert_eq!(err, AnalyticsError::stage(LOGISTICS_STAGE, "panicked: boom"));
    }

    #[test]
    fn quality_alert_bands() {
        let poor = kilnwatch_quality::QualityPrediction::from_predictions(0.0, 0.0, 0.0);
        let alert = quality_alert(poor.quality_grade, &poor).unwrap();
        assert_eq!(alert.severity(), Severity::High);
        assert!(matches!(&alert, Alert::Quality { message, .. } if message == "Quality grade 4 predicted"));

        let good = kilnwatch_quality::QualityPrediction::from_predictions(350.0, 165.0, 53.0);
        assert!(quality_alert(good.quality_grade, &good).is_none());
    }

    #[test]
    fn empty_cycle_is_an_error_result() {
        let orchestrator = AnalysisOrchestrator::new(PipelineConfig::default()).unwrap();
        let result = orchestrator.run_cycle(&CycleInput::default());
        assert_eq!(result.system_status, kilnwatch_core::SystemStatus::Error);
        assert!(result.error.is_some());
        assert!(result.alerts.is_empty());
    }
}
