//! Quality feature preparation.
//!
//! Training rows are quality-test samples with the nearest sensor and
//! material readings attached. Live rows are sensor readings with the
//! nearest material reading attached. Both get the same derived ratios and
//! stability metrics; no feature depends on a quality target.

use std::collections::BTreeMap;

use kilnwatch_core::{AnalyticsResult, MaterialSample, QualitySample, SensorSample};
use kilnwatch_features::rolling::moving_std;
use kilnwatch_features::{FeatureFrame, sanitize};

/// Model inputs, in schema order.
pub const QUALITY_FEATURES: [&str; 21] = [
    "kiln_temperature",
    "system_pressure",
    "material_moisture",
    "material_flow_rate",
    "oxygen_level",
    "energy_consumption",
    "limestone_percent",
    "clay_percent",
    "iron_ore_percent",
    "gypsum_percent",
    "cao_content",
    "sio2_content",
    "al2o3_content",
    "fe2o3_content",
    "temp_pressure_ratio",
    "energy_efficiency",
    "cao_sio2_ratio",
    "al2o3_fe2o3_ratio",
    "raw_material_balance",
    "temp_stability",
    "flow_stability",
];

/// `a / (b + 1)` ratios.
const RATIOS: [(&str, &str, &str); 4] = [
    ("temp_pressure_ratio", "kiln_temperature", "system_pressure"),
    ("energy_efficiency", "material_flow_rate", "energy_consumption"),
    ("cao_sio2_ratio", "cao_content", "sio2_content"),
    ("al2o3_fe2o3_ratio", "al2o3_content", "fe2o3_content"),
];

const BALANCE_WEIGHTS: [(&str, f64); 4] = [
    ("limestone_percent", 0.4),
    ("clay_percent", 0.3),
    ("iron_ore_percent", 0.2),
    ("gypsum_percent", 0.1),
];

const STABILITY: [(&str, &str); 2] = [
    ("temp_stability", "kiln_temperature"),
    ("flow_stability", "material_flow_rate"),
];

/// Quality samples joined with process state, plus derived features.
pub fn training_frame(
    sensor: &[SensorSample],
    material: &[MaterialSample],
    quality: &[QualitySample],
    stability_window: usize,
) -> AnalyticsResult<FeatureFrame> {
    let mut frame = FeatureFrame::from_quality_samples(&sorted(quality, |q| q.timestamp))
        .merge_asof_nearest(&FeatureFrame::from_sensor_samples(&sorted(sensor, |s| s.timestamp)))
        .merge_asof_nearest(&FeatureFrame::from_material_samples(&sorted(material, |m| {
            m.timestamp
        })));
    append_derived(&mut frame, stability_window)?;
    Ok(frame)
}

/// Sensor history joined with material history, plus derived features.
pub fn state_frame(
    sensor_history: &[SensorSample],
    material_history: &[MaterialSample],
    stability_window: usize,
) -> AnalyticsResult<FeatureFrame> {
    let mut frame = FeatureFrame::from_sensor_samples(sensor_history)
        .merge_asof_nearest(&FeatureFrame::from_material_samples(material_history));
    append_derived(&mut frame, stability_window)?;
    Ok(frame)
}

/// The live state: every feature of the last history row.
pub fn live_state(
    sensor_history: &[SensorSample],
    material_history: &[MaterialSample],
    stability_window: usize,
) -> AnalyticsResult<BTreeMap<String, f64>> {
    let frame = state_frame(sensor_history, material_history, stability_window)?;
    Ok(match frame.len() {
        0 => BTreeMap::new(),
        n => frame.row_map(n - 1),
    })
}

/// Adds every derived feature whose inputs are present, then sanitises.
fn append_derived(frame: &mut FeatureFrame, stability_window: usize) -> AnalyticsResult<()> {
    for (name, num, den) in RATIOS {
        if let (Some(a), Some(b)) = (frame.column(num), frame.column(den)) {
            let values = a.iter().zip(b).map(|(a, b)| a / (b + 1.0)).collect();
            frame.insert(name, values)?;
        }
    }

    if BALANCE_WEIGHTS.iter().all(|(c, _)| frame.contains(c)) {
        let mut balance = vec![0.0; frame.len()];
        for (col, weight) in BALANCE_WEIGHTS {
            if let Some(values) = frame.column(col) {
                for (acc, v) in balance.iter_mut().zip(values) {
                    *acc += v * weight;
                }
            }
        }
        frame.insert("raw_material_balance", balance)?;
    }

    for (name, source) in STABILITY {
        if let Some(values) = frame.column(source) {
            let sd = moving_std(values, stability_window);
            frame.insert(name, sd)?;
        }
    }

    let filled = sanitize(frame);
    if filled > 0 {
        tracing::debug!(rows = frame.len(), filled, "sanitised quality features");
    }
    Ok(())
}

fn sorted<T: Clone, K: Ord>(items: &[T], key: impl Fn(&T) -> K) -> Vec<T> {
    let mut out = items.to_vec();
    out.sort_by_key(|x| key(x));
    out
}
