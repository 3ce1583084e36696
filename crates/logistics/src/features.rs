//! Logistics feature preparation over merged sensor/material history.

use kilnwatch_core::{AnalyticsResult, MaterialSample, SensorSample};
use kilnwatch_features::rolling::{moving_average, moving_std};
use kilnwatch_features::{FeatureEngine, FeatureFrame, TimeFeatures, sanitize};

use crate::scheduler::TRUCK_CAPACITY;

/// Forecaster inputs, in schema order.
pub const FORECAST_FEATURES: [&str; 9] = [
    "hour",
    "day_of_week",
    "month",
    "kiln_temperature",
    "system_pressure",
    "flow_rate_ma_24h",
    "flow_rate_std_24h",
    "inventory_level",
    "supply_chain_delay",
];

/// Time-derived forecaster inputs; the only ones that change when the live
/// state is rolled forward.
pub const TIME_FEATURES: [&str; 3] = ["hour", "day_of_week", "month"];

/// Inventory level at which urgency reaches zero.
const URGENCY_REFERENCE: f64 = 1000.0;

/// `1 / (1 + delay / 10)`.
pub fn supply_efficiency(delay: f64) -> f64 {
    1.0 / (1.0 + delay / 10.0)
}

/// Sensor rows with the nearest material reading attached, plus time
/// features, 24 h flow statistics, and inventory/supply scores.
pub fn logistics_frame(
    sensor: &[SensorSample],
    material: &[MaterialSample],
    rolling_window: usize,
) -> AnalyticsResult<FeatureFrame> {
    let merged = FeatureFrame::from_sensor_samples(sensor)
        .merge_asof_nearest(&FeatureFrame::from_material_samples(material));

    let mut frame = FeatureEngine::new(rolling_window)
        .with_rate_of_change(false)
        .with_time_features(TimeFeatures {
            hour: true,
            day_of_week: true,
            month: true,
            ..TimeFeatures::none()
        })
        .transform(&merged)?;

    let flow = frame.require("material_flow_rate")?.to_vec();
    frame.insert("flow_rate_ma_24h", moving_average(&flow, rolling_window))?;
    frame.insert("flow_rate_std_24h", moving_std(&flow, rolling_window))?;

    if let Some(inventory) = frame.column("inventory_level") {
        let urgency = inventory
            .iter()
            .map(|inv| ((URGENCY_REFERENCE - inv) / URGENCY_REFERENCE).clamp(0.0, 1.0))
            .collect();
        frame.insert("inventory_urgency", urgency)?;
    }
    if let Some(delay) = frame.column("supply_chain_delay") {
        let efficiency = delay.iter().map(|d| supply_efficiency(*d)).collect();
        frame.insert("supply_efficiency", efficiency)?;
    }
    if let Some(arrivals) = frame.column("truck_arrivals") {
        let ratio = flow
            .iter()
            .zip(arrivals)
            .map(|(f, a)| f / (a * TRUCK_CAPACITY + 1.0))
            .collect();
        frame.insert("demand_supply_ratio", ratio)?;
    }

    let filled = sanitize(&mut frame);
    if filled > 0 {
        tracing::debug!(rows = frame.len(), filled, "sanitised logistics features");
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(minutes: i64) -> DateTime<Utc> {
        // A Wednesday in March.
        Utc.with_ymd_and_hms(2024, 3, 6, 10, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn sensor(minutes: i64, flow: f64) -> SensorSample {
        SensorSample {
            timestamp: at(minutes),
            kiln_temperature: 1000.0,
            system_pressure: 3.2,
            material_moisture: 5.0,
            material_flow_rate: flow,
            oxygen_level: 3.0,
            co_level: 100.0,
            nox_level: 400.0,
            mill_vibration: 2.0,
            kiln_vibration: 1.5,
            energy_consumption: 130.0,
            is_anomaly: false,
        }
    }

    fn material(minutes: i64, inventory: f64, delay: f64, arrivals: u32) -> MaterialSample {
        MaterialSample {
            timestamp: at(minutes),
            limestone_percent: 80.0,
            clay_percent: 14.0,
            iron_ore_percent: 4.0,
            gypsum_percent: 2.0,
            cao_content: 44.0,
            sio2_content: 10.0,
            al2o3_content: 3.0,
            fe2o3_content: 2.0,
            truck_arrivals: arrivals,
            inventory_level: inventory,
            supply_chain_delay: delay,
            limestone_quality: 0.9,
            clay_quality: 0.8,
        }
    }

    #[test]
    fn derives_scores_from_the_nearest_material_row() {
        let frame = logistics_frame(
            &[sensor(0, 100.0), sensor(5, 110.0)],
            &[material(0, 1500.0, 10.0, 0), material(5, 600.0, 0.0, 2)],
            288,
        )
        .unwrap();

        assert_eq!(frame.column("hour").unwrap(), &[10.0, 10.0]);
        assert_eq!(frame.column("day_of_week").unwrap(), &[2.0, 2.0]);
        assert_eq!(frame.column("month").unwrap(), &[3.0, 3.0]);
        assert_eq!(frame.column("flow_rate_ma_24h").unwrap(), &[100.0, 105.0]);
        assert_eq!(frame.value("flow_rate_std_24h", 0), Some(0.0));
        assert_eq!(frame.column("inventory_urgency").unwrap(), &[0.0, 0.4]);
        assert_eq!(frame.column("supply_efficiency").unwrap(), &[0.5, 1.0]);
        assert_eq!(frame.column("demand_supply_ratio").unwrap(), &[100.0, 110.0 / 51.0]);
        for name in FORECAST_FEATURES {
            assert!(frame.contains(name), "{name}");
        }
    }
}
