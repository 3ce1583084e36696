//! Pipeline configuration: per-component configs plus env overrides.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use kilnwatch_anomaly::AnomalyConfig;
use kilnwatch_core::{AnalyticsError, AnalyticsResult};
use kilnwatch_logistics::LogisticsConfig;
use kilnwatch_quality::QualityConfig;

pub const ENV_CONTAMINATION: &str = "KILNWATCH_CONTAMINATION";
pub const ENV_HORIZON_HOURS: &str = "KILNWATCH_HORIZON_HOURS";
pub const ENV_HISTORY_ROWS: &str = "KILNWATCH_HISTORY_ROWS";
pub const ENV_SEED: &str = "KILNWATCH_SEED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub anomaly: AnomalyConfig,
    pub quality: QualityConfig,
    pub logistics: LogisticsConfig,
    /// Trailing sensor rows scored by the detector each cycle.
    pub anomaly_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            anomaly: AnomalyConfig::default(),
            quality: QualityConfig::default(),
            logistics: LogisticsConfig::default(),
            anomaly_rows: 1,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(raw: &str) -> AnalyticsResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| AnalyticsError::invalid_config(format!("pipeline config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with process environment overrides applied.
    pub fn from_env() -> AnalyticsResult<Self> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Apply `KILNWATCH_*` overrides read through `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> AnalyticsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var::<f64, _>(&lookup, ENV_CONTAMINATION)? {
            self.anomaly.contamination = v;
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, ENV_HORIZON_HOURS)? {
            self.logistics.horizon_hours = v;
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, ENV_HISTORY_ROWS)? {
            self.logistics.sensor_history_rows = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, ENV_SEED)? {
            self.anomaly.seed = v;
            self.quality.seed = v;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        self.anomaly.validate()?;
        self.quality.validate()?;
        self.logistics.validate()?;
        if self.logistics.sensor_history_rows == 0 {
            return Err(AnalyticsError::invalid_config("history rows must be >= 1"));
        }
        if self.anomaly_rows == 0 {
            return Err(AnalyticsError::invalid_config("anomaly rows must be >= 1"));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> AnalyticsResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AnalyticsError::invalid_config(format!("{key}={raw}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn env_overrides_apply() {
        let cfg = PipelineConfig::default()
            .apply_env(env(&[
                (ENV_CONTAMINATION, "0.05"),
                (ENV_HORIZON_HOURS, "24"),
                (ENV_HISTORY_ROWS, "200"),
                (ENV_SEED, "7"),
            ]))
            .unwrap();
        assert_eq!(cfg.anomaly.contamination, 0.05);
        assert_eq!(cfg.logistics.horizon_hours, 24);
        assert_eq!(cfg.logistics.sensor_history_rows, 200);
        assert_eq!(cfg.anomaly.seed, 7);
        assert_eq!(cfg.quality.seed, 7);
    }

    #[test]
    fn out_of_range_override_is_rejected() {
        let err = PipelineConfig::default()
            .apply_env(env(&[(ENV_CONTAMINATION, "0.9")]))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidConfig(_)));

        let err = PipelineConfig::default()
            .apply_env(env(&[(ENV_HORIZON_HOURS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidConfig(msg) if msg.contains(ENV_HORIZON_HOURS)));
    }

    #[test]
    fn json_fills_in_defaults() {
        let cfg =
            PipelineConfig::from_json_str(r#"{"logistics": {"horizon_hours": 12}}"#).unwrap();
        assert_eq!(cfg.logistics.horizon_hours, 12);
        assert_eq!(cfg.logistics.rolling_window, 288);
        assert_eq!(cfg.anomaly, AnomalyConfig::default());

        assert!(PipelineConfig::from_json_str(r#"{"anomaly_rows": 0}"#).is_err());
        assert!(PipelineConfig::from_json_str("not json").is_err());
    }
}
