//! Per-cycle analysis output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kilnwatch_anomaly::AnomalyReport;
use kilnwatch_core::{CycleId, Severity, SystemStatus};
use kilnwatch_logistics::{LogisticsMetrics, LogisticsRecommendations};
use kilnwatch_quality::{CorrectionPlan, QualityPrediction};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Alert {
    Anomaly {
        severity: Severity,
        count: usize,
        details: Vec<AnomalyReport>,
    },
    Quality {
        severity: Severity,
        message: String,
        details: QualityPrediction,
    },
    Logistics {
        severity: Severity,
        message: String,
        details: LogisticsMetrics,
    },
}

impl Alert {
    pub fn severity(&self) -> Severity {
        match self {
            Alert::Anomaly { severity, .. }
            | Alert::Quality { severity, .. }
            | Alert::Logistics { severity, .. } => *severity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityControl {
    pub predictions: QualityPrediction,
    pub corrections: CorrectionPlan,
}

/// Stage outputs that completed; a failed stage leaves its slot empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub quality_control: Option<QualityControl>,
    pub logistics: Option<LogisticsRecommendations>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub energy_efficiency: f64,
    pub material_flow_rate: f64,
    pub system_pressure: f64,
    pub kiln_temperature: f64,
    pub quality_score: f64,
    pub anomaly_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub cycle_id: CycleId,
    pub timestamp: DateTime<Utc>,
    pub system_status: SystemStatus,
    pub alerts: Vec<Alert>,
    pub recommendations: Recommendations,
    pub performance_metrics: PerformanceMetrics,
    /// Stage failures of this cycle, `; `-joined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `error` on any stage failure, `optimal` without alerts, `critical` or
/// `warning` on the worst alert, `alert` otherwise.
pub fn derive_status(alerts: &[Alert], failed: bool) -> SystemStatus {
    if failed {
        return SystemStatus::Error;
    }
    match alerts.iter().map(Alert::severity).max() {
        None => SystemStatus::Optimal,
        Some(Severity::Critical) => SystemStatus::Critical,
        Some(Severity::High) => SystemStatus::Warning,
        Some(_) => SystemStatus::Alert,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kilnwatch_logistics::LogisticsMetrics;

    fn logistics(severity: Severity) -> Alert {
        Alert::Logistics {
            severity,
            message: "Low supply chain efficiency detected".to_owned(),
            details: LogisticsMetrics {
                current_supply_efficiency: 0.5,
                inventory_turnover: None,
                average_delay: 10.0,
            },
        }
    }

    fn anomaly(severity: Severity) -> Alert {
        Alert::Anomaly {
            severity,
            count: 1,
            details: Vec::new(),
        }
    }

    #[test]
    fn status_follows_the_worst_alert() {
        assert_eq!(derive_status(&[], false), SystemStatus::Optimal);
        assert_eq!(derive_status(&[logistics(Severity::Medium)], false), SystemStatus::Alert);
        assert_eq!(
            derive_status(&[logistics(Severity::Medium), anomaly(Severity::High)], false),
            SystemStatus::Warning
        );
        assert_eq!(
            derive_status(&[anomaly(Severity::Critical), anomaly(Severity::High)], false),
            SystemStatus::Critical
        );
        assert_eq!(derive_status(&[], true), SystemStatus::Error);
    }

    #[test]
    fn alerts_serialize_with_a_type_tag() {
        let json = serde_json::to_value(anomaly(Severity::Low)).unwrap();
        assert_eq!(json["type"], "anomaly");
        assert_eq!(json["severity"], "low");
        assert_eq!(json["count"], 1);
    }
}
