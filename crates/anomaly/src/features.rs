//! Anomaly feature set.

use kilnwatch_core::{AnalyticsResult, SENSOR_CHANNELS, SensorSample};
use kilnwatch_features::{CrossFeature, FeatureEngine, FeatureFrame, TimeFeatures};

/// The engine the detector runs over raw sensor samples: rolling statistics
/// and rate of change for every channel, two declared products, and
/// `hour`/`minute`/`is_weekend`.
pub fn anomaly_engine(window: usize) -> FeatureEngine {
    FeatureEngine::new(window)
        .with_rolling_columns(SENSOR_CHANNELS)
        .with_cross_feature(CrossFeature::new(
            "temp_pressure_correlation",
            "kiln_temperature",
            "system_pressure",
        ))
        .with_cross_feature(CrossFeature::new(
            "flow_energy_correlation",
            "material_flow_rate",
            "energy_consumption",
        ))
        .with_time_features(TimeFeatures {
            hour: true,
            minute: true,
            is_weekend: true,
            ..TimeFeatures::none()
        })
}

pub fn anomaly_features(samples: &[SensorSample], window: usize) -> AnalyticsResult<FeatureFrame> {
    anomaly_engine(window).transform(&FeatureFrame::from_sensor_samples(samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn emits_fifty_five_columns() {
        let s = SensorSample {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            kiln_temperature: 1000.0,
            system_pressure: 3.2,
            material_moisture: 5.0,
            material_flow_rate: 100.0,
            oxygen_level: 3.0,
            co_level: 100.0,
            nox_level: 400.0,
            mill_vibration: 2.0,
            kiln_vibration: 1.5,
            energy_consumption: 130.0,
            is_anomaly: false,
        };
        let frame = anomaly_features(&[s.clone(), s], 6).unwrap();
        // 10 raw + 10×3 rolling + 10 rate of change + 2 products + 3 time.
        assert_eq!(frame.names().len(), 55);
        assert!(frame.contains("flow_energy_correlation"));
        assert!(frame.contains("kiln_vibration_rate_of_change"));
    }
}
