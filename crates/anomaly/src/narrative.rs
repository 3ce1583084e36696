//! Root-cause lookup for out-of-bounds sensors.

use serde::{Deserialize, Serialize};

/// Sensor families with a dedicated cause/action rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorFamily {
    Temperature,
    Pressure,
    Flow,
    Vibration,
}

impl SensorFamily {
    pub fn of(channel: &str) -> Option<Self> {
        match channel {
            "kiln_temperature" => Some(SensorFamily::Temperature),
            "system_pressure" => Some(SensorFamily::Pressure),
            "material_flow_rate" => Some(SensorFamily::Flow),
            "mill_vibration" | "kiln_vibration" => Some(SensorFamily::Vibration),
            _ => None,
        }
    }

    /// Deviation percent above which the family's fault narrative applies.
    pub fn threshold_percent(self) -> f64 {
        match self {
            SensorFamily::Temperature => 15.0,
            SensorFamily::Pressure => 20.0,
            SensorFamily::Flow => 25.0,
            SensorFamily::Vibration => 30.0,
        }
    }

    /// `(cause, action)` for a given deviation.
    pub fn narrative(self, deviation_percent: f64) -> (&'static str, &'static str) {
        let severe = deviation_percent > self.threshold_percent();
        match (self, severe) {
            (SensorFamily::Temperature, true) => (
                "Kiln burner malfunction or fuel supply issue",
                "Check burner operation and fuel quality",
            ),
            (SensorFamily::Temperature, false) => {
                ("Normal temperature variation", "Monitor temperature trend")
            }
            (SensorFamily::Pressure, true) => (
                "Blockage in system or fan malfunction",
                "Inspect system for blockages, check fan operation",
            ),
            (SensorFamily::Pressure, false) => ("Minor pressure fluctuation", "Continue monitoring"),
            (SensorFamily::Flow, true) => (
                "Feeder malfunction or material blockage",
                "Inspect material feeders and conveyor systems",
            ),
            (SensorFamily::Flow, false) => ("Normal flow variation", "Monitor flow stability"),
            (SensorFamily::Vibration, true) => (
                "Equipment bearing wear or misalignment",
                "Schedule immediate maintenance inspection",
            ),
            (SensorFamily::Vibration, false) => {
                ("Minor vibration increase", "Monitor vibration trend")
            }
        }
    }
}

/// One sensor outside its normal range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedSensor {
    pub sensor: String,
    pub value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub deviation_percent: f64,
}

impl AffectedSensor {
    /// Cause and action lines for this sensor.
    pub fn narrative(&self) -> (String, String) {
        match SensorFamily::of(&self.sensor) {
            Some(family) => {
                let (cause, action) = family.narrative(self.deviation_percent);
                (cause.to_string(), action.to_string())
            }
            None => (
                format!("Unusual {} reading", self.sensor.replace('_', " ")),
                format!("Monitor {} trend", self.sensor.replace('_', " ")),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn affected(sensor: &str, deviation_percent: f64) -> AffectedSensor {
        AffectedSensor {
            sensor: sensor.into(),
            value: 0.0,
            lower_bound: 0.0,
            upper_bound: 0.0,
            deviation_percent,
        }
    }

    #[test]
    fn family_thresholds_pick_fault_narratives() {
        assert_eq!(
            affected("kiln_temperature", 25.0).narrative().0,
            "Kiln burner malfunction or fuel supply issue"
        );
        assert_eq!(
            affected("kiln_temperature", 10.0).narrative().1,
            "Monitor temperature trend"
        );
        assert_eq!(
            affected("system_pressure", 20.5).narrative().1,
            "Inspect system for blockages, check fan operation"
        );
        assert_eq!(
            affected("material_flow_rate", 25.0).narrative().0,
            "Normal flow variation"
        );
        assert_eq!(
            affected("kiln_vibration", 31.0).narrative().1,
            "Schedule immediate maintenance inspection"
        );
    }

    #[test]
    fn channels_without_a_family_get_monitor_guidance() {
        let (cause, action) = affected("co_level", 80.0).narrative();
        assert_eq!(cause, "Unusual co level reading");
        assert_eq!(action, "Monitor co level trend");
    }
}
