//! Raw sample records ingested from the plant.
//!
//! Samples are immutable once produced and ordered by timestamp within each
//! sequence; ordering is the caller's responsibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::vocabulary::QualityGrade;

/// Raw sensor channel names, in canonical column order.
pub const SENSOR_CHANNELS: [&str; 10] = [
    "kiln_temperature",
    "system_pressure",
    "material_moisture",
    "material_flow_rate",
    "oxygen_level",
    "co_level",
    "nox_level",
    "mill_vibration",
    "kiln_vibration",
    "energy_consumption",
];

/// Material/logistics column names, in canonical column order.
pub const MATERIAL_COLUMNS: [&str; 13] = [
    "limestone_percent",
    "clay_percent",
    "iron_ore_percent",
    "gypsum_percent",
    "cao_content",
    "sio2_content",
    "al2o3_content",
    "fe2o3_content",
    "truck_arrivals",
    "inventory_level",
    "supply_chain_delay",
    "limestone_quality",
    "clay_quality",
];

/// Quality attribute column names, in canonical column order.
pub const QUALITY_COLUMNS: [&str; 10] = [
    "fineness",
    "setting_time",
    "compressive_strength_3d",
    "compressive_strength_28d",
    "density",
    "specific_surface",
    "c3s_content",
    "c2s_content",
    "c3a_content",
    "c4af_content",
];

/// Composition used when a sample's mix cannot be renormalised (sums to 100).
pub const NOMINAL_COMPOSITION: [f64; 4] = [80.0, 14.0, 4.0, 2.0];

/// Allowed distance of a composition total from 100 pct-points.
pub const COMPOSITION_TOLERANCE: f64 = 0.5;

/// One reading of the process sensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub timestamp: DateTime<Utc>,
    pub kiln_temperature: f64,
    pub system_pressure: f64,
    pub material_moisture: f64,
    pub material_flow_rate: f64,
    pub oxygen_level: f64,
    pub co_level: f64,
    pub nox_level: f64,
    pub mill_vibration: f64,
    pub kiln_vibration: f64,
    pub energy_consumption: f64,
    /// Ground-truth label, only meaningful in training batches.
    #[serde(default)]
    pub is_anomaly: bool,
}

impl SensorSample {
    /// Channel values in [`SENSOR_CHANNELS`] order.
    pub fn channels(&self) -> [f64; 10] {
        [
            self.kiln_temperature,
            self.system_pressure,
            self.material_moisture,
            self.material_flow_rate,
            self.oxygen_level,
            self.co_level,
            self.nox_level,
            self.mill_vibration,
            self.kiln_vibration,
            self.energy_consumption,
        ]
    }

    pub fn channel(&self, name: &str) -> Option<f64> {
        SENSOR_CHANNELS
            .iter()
            .position(|c| *c == name)
            .map(|i| self.channels()[i])
    }
}

/// One raw-material composition and logistics reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSample {
    pub timestamp: DateTime<Utc>,
    pub limestone_percent: f64,
    pub clay_percent: f64,
    pub iron_ore_percent: f64,
    pub gypsum_percent: f64,
    pub cao_content: f64,
    pub sio2_content: f64,
    pub al2o3_content: f64,
    pub fe2o3_content: f64,
    pub truck_arrivals: u32,
    pub inventory_level: f64,
    pub supply_chain_delay: f64,
    pub limestone_quality: f64,
    pub clay_quality: f64,
}

impl MaterialSample {
    /// Column values in [`MATERIAL_COLUMNS`] order.
    pub fn columns(&self) -> [f64; 13] {
        [
            self.limestone_percent,
            self.clay_percent,
            self.iron_ore_percent,
            self.gypsum_percent,
            self.cao_content,
            self.sio2_content,
            self.al2o3_content,
            self.fe2o3_content,
            f64::from(self.truck_arrivals),
            self.inventory_level,
            self.supply_chain_delay,
            self.limestone_quality,
            self.clay_quality,
        ]
    }

    pub fn composition_total(&self) -> f64 {
        self.limestone_percent + self.clay_percent + self.iron_ore_percent + self.gypsum_percent
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        if let Some(i) = self.columns().iter().position(|v| !v.is_finite()) {
            return Err(AnalyticsError::malformed(format!(
                "material sample at {} has non-finite `{}`",
                self.timestamp, MATERIAL_COLUMNS[i]
            )));
        }
        let total = self.composition_total();
        if (total - 100.0).abs() > COMPOSITION_TOLERANCE {
            return Err(AnalyticsError::malformed(format!(
                "material sample at {} has composition total {total:.2} (expected 100)",
                self.timestamp
            )));
        }
        Ok(())
    }

    /// Return a copy that passes [`validate`](Self::validate).
    ///
    /// Non-finite fields become 0. A finite, non-negative composition with a
    /// positive total is rescaled to 100; anything else falls back to
    /// [`NOMINAL_COMPOSITION`]. Repairs are
    /// logged, never raised.
    pub fn repaired(&self) -> Self {
        let err = match self.validate() {
            Ok(()) => return self.clone(),
            Err(e) => e,
        };

        let mix_is_finite = [
            self.limestone_percent,
            self.clay_percent,
            self.iron_ore_percent,
            self.gypsum_percent,
        ]
        .iter()
        .all(|p| p.is_finite());

        let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
        let mut out = MaterialSample {
            timestamp: self.timestamp,
            limestone_percent: finite(self.limestone_percent),
            clay_percent: finite(self.clay_percent),
            iron_ore_percent: finite(self.iron_ore_percent),
            gypsum_percent: finite(self.gypsum_percent),
            cao_content: finite(self.cao_content),
            sio2_content: finite(self.sio2_content),
            al2o3_content: finite(self.al2o3_content),
            fe2o3_content: finite(self.fe2o3_content),
            truck_arrivals: self.truck_arrivals,
            inventory_level: finite(self.inventory_level),
            supply_chain_delay: finite(self.supply_chain_delay),
            limestone_quality: finite(self.limestone_quality),
            clay_quality: finite(self.clay_quality),
        };

        let parts = [
            out.limestone_percent,
            out.clay_percent,
            out.iron_ore_percent,
            out.gypsum_percent,
        ];
        let total = out.composition_total();
        let mix = if mix_is_finite && total > 0.0 && parts.iter().all(|p| *p >= 0.0) {
            parts.map(|p| p / total * 100.0)
        } else {
            NOMINAL_COMPOSITION
        };
        out.limestone_percent = mix[0];
        out.clay_percent = mix[1];
        out.iron_ore_percent = mix[2];
        out.gypsum_percent = mix[3];

        tracing::warn!(timestamp = %self.timestamp, error = %err, "repaired malformed material sample");
        out
    }
}

/// One laboratory quality measurement of finished product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySample {
    pub timestamp: DateTime<Utc>,
    pub fineness: f64,
    pub setting_time: f64,
    pub compressive_strength_3d: f64,
    pub compressive_strength_28d: f64,
    pub density: f64,
    pub specific_surface: f64,
    pub c3s_content: f64,
    pub c2s_content: f64,
    pub c3a_content: f64,
    pub c4af_content: f64,
}

impl QualitySample {
    /// Column values in [`QUALITY_COLUMNS`] order.
    pub fn columns(&self) -> [f64; 10] {
        [
            self.fineness,
            self.setting_time,
            self.compressive_strength_3d,
            self.compressive_strength_28d,
            self.density,
            self.specific_surface,
            self.c3s_content,
            self.c2s_content,
            self.c3a_content,
            self.c4af_content,
        ]
    }

    /// Grade from threshold bands on fineness, setting time and 28-day strength.
    pub fn grade(&self) -> QualityGrade {
        let outside = |v: f64, lo: f64, hi: f64| v < lo || v > hi;
        let (f, s, c) = (
            self.fineness,
            self.setting_time,
            self.compressive_strength_28d,
        );

        if outside(f, 300.0, 400.0) || outside(s, 120.0, 220.0) || c < 45.0 {
            QualityGrade::Poor
        } else if outside(f, 320.0, 380.0) || outside(s, 140.0, 200.0) || c < 50.0 {
            QualityGrade::Acceptable
        } else if outside(f, 340.0, 360.0) || outside(s, 150.0, 180.0) || c < 52.0 {
            QualityGrade::Good
        } else {
            QualityGrade::Excellent
        }
    }
}
