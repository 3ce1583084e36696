//! Corrective set-point changes derived from a quality prediction.
//!
//! Each rule looks at the prediction and the live state independently and
//! emits at most one adjustment. Nothing is emitted unless the overall
//! quality score is below the action threshold.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kilnwatch_core::Priority;

use crate::predictor::QualityPrediction;

/// Overall score below which corrections are generated.
pub const ACTION_THRESHOLD: f64 = 70.0;

/// Nominal set-points used when the live state lacks a value.
pub const NOMINAL_KILN_TEMPERATURE: f64 = 1000.0;
pub const NOMINAL_GYPSUM_PERCENT: f64 = 4.0;
pub const NOMINAL_LIMESTONE_PERCENT: f64 = 80.0;
pub const NOMINAL_FLOW_RATE: f64 = 100.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Process,
    Material,
}

/// One proposed change to a set-point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub current: f64,
    /// Signed change to apply to `current`.
    pub delta: f64,
    pub unit: String,
    pub reason: String,
}

impl Adjustment {
    fn new(current: f64, delta: f64, unit: &str, reason: &str) -> Self {
        Self {
            current,
            delta,
            unit: unit.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Human form, e.g. `+40.0°C`.
    pub fn describe(&self) -> String {
        let precision = if self.unit == "%" { 2 } else { 1 };
        format!("{:+.*}{}", precision, self.delta, self.unit)
    }
}

/// The correction rules.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum CorrectionRule {
    /// Fineness outside [320, 380] moves the kiln temperature.
    Temperature,
    /// Setting time outside [140, 200] moves the gypsum fraction.
    Gypsum,
    /// Strength below 50 raises the limestone fraction.
    Limestone,
    /// Flow rolling std above 5 lowers the flow target.
    FlowStability,
}

impl CorrectionRule {
    pub const ALL: [CorrectionRule; 4] = [
        CorrectionRule::Temperature,
        CorrectionRule::Gypsum,
        CorrectionRule::Limestone,
        CorrectionRule::FlowStability,
    ];

    /// `(kind, parameter, adjustment)` when the rule fires.
    pub fn evaluate(
        self,
        prediction: &QualityPrediction,
        state: &BTreeMap<String, f64>,
    ) -> Option<(AdjustmentKind, &'static str, Adjustment)> {
        let current = |name: &str, nominal: f64| state.get(name).copied().unwrap_or(nominal);
        match self {
            CorrectionRule::Temperature => {
                let fineness = prediction.predicted_fineness;
                let now = current("kiln_temperature", NOMINAL_KILN_TEMPERATURE);
                let adj = if fineness < 320.0 {
                    Adjustment::new(now, (320.0 - fineness) * 2.0, "°C", "Increase fineness")
                } else if fineness > 380.0 {
                    Adjustment::new(now, -(fineness - 380.0) * 1.5, "°C", "Reduce over-grinding")
                } else {
                    return None;
                };
                Some((AdjustmentKind::Process, "kiln_temperature", adj))
            }
            CorrectionRule::Gypsum => {
                let setting = prediction.predicted_setting_time;
                let now = current("gypsum_percent", NOMINAL_GYPSUM_PERCENT);
                let adj = if setting < 140.0 {
                    Adjustment::new(now, (140.0 - setting) * 0.01, "%", "Slow down setting time")
                } else if setting > 200.0 {
                    Adjustment::new(now, -(setting - 200.0) * 0.008, "%", "Speed up setting time")
                } else {
                    return None;
                };
                Some((AdjustmentKind::Material, "gypsum_percent", adj))
            }
            CorrectionRule::Limestone => {
                let strength = prediction.predicted_strength;
                if strength >= 50.0 {
                    return None;
                }
                let now = current("limestone_percent", NOMINAL_LIMESTONE_PERCENT);
                Some((
                    AdjustmentKind::Material,
                    "limestone_percent",
                    Adjustment::new(now, (50.0 - strength) * 0.3, "%", "Increase cement strength"),
                ))
            }
            CorrectionRule::FlowStability => {
                let stability = state.get("flow_stability").copied().unwrap_or(0.0);
                if stability <= 5.0 {
                    return None;
                }
                let now = current("material_flow_rate", NOMINAL_FLOW_RATE);
                Some((
                    AdjustmentKind::Process,
                    "material_flow_rate",
                    Adjustment::new(
                        now,
                        -(stability - 3.0).min(10.0),
                        " tons/hr",
                        "Improve process stability",
                    ),
                ))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatedImpact {
    pub quality_improvement: f64,
    pub energy_impact: String,
    pub cost_impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionPlan {
    pub priority: Priority,
    pub process_adjustments: BTreeMap<String, Adjustment>,
    pub material_adjustments: BTreeMap<String, Adjustment>,
    pub estimated_impact: EstimatedImpact,
    pub implementation_time: String,
}

impl CorrectionPlan {
    pub fn adjustment_count(&self) -> usize {
        self.process_adjustments.len() + self.material_adjustments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjustment_count() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionEngine {
    threshold: f64,
    rules: Vec<CorrectionRule>,
}

impl Default for CorrectionEngine {
    fn default() -> Self {
        Self {
            threshold: ACTION_THRESHOLD,
            rules: CorrectionRule::ALL.to_vec(),
        }
    }
}

impl CorrectionEngine {
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = CorrectionRule>) -> Self {
        self.rules = rules.into_iter().collect();
        self
    }

    pub fn plan(
        &self,
        prediction: &QualityPrediction,
        state: &BTreeMap<String, f64>,
    ) -> CorrectionPlan {
        let overall = prediction.quality_scores.overall_score;
        let mut process = BTreeMap::new();
        let mut material = BTreeMap::new();

        let priority = if overall < self.threshold {
            for rule in &self.rules {
                if let Some((kind, parameter, adj)) = rule.evaluate(prediction, state) {
                    let target = match kind {
                        AdjustmentKind::Process => &mut process,
                        AdjustmentKind::Material => &mut material,
                    };
                    target.insert(parameter.to_string(), adj);
                }
            }
            Priority::High
        } else {
            Priority::Low
        };

        let count = process.len() + material.len();
        if count > 0 {
            tracing::info!(
                overall,
                process = process.len(),
                material = material.len(),
                "quality corrections proposed"
            );
        }

        CorrectionPlan {
            priority,
            estimated_impact: EstimatedImpact {
                quality_improvement: (100.0 - overall).clamp(5.0, 30.0),
                energy_impact: energy_impact(&process).to_string(),
                cost_impact: cost_impact(count).to_string(),
            },
            process_adjustments: process,
            material_adjustments: material,
            implementation_time: "immediate".to_string(),
        }
    }
}

fn energy_impact(process: &BTreeMap<String, Adjustment>) -> &'static str {
    match process.get("kiln_temperature") {
        Some(adj) if adj.delta > 0.0 => "Increase 2-5%",
        Some(_) => "Decrease 2-5%",
        None => "Minimal impact",
    }
}

fn cost_impact(adjustments: usize) -> &'static str {
    if adjustments > 3 {
        "Medium impact ($500-2000/hr)"
    } else if adjustments > 1 {
        "Low impact ($100-500/hr)"
    } else {
        "Minimal impact (<$100/hr)"
    }
}
