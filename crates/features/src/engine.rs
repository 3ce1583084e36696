//! Rolling-window feature engineering.

use chrono::{Datelike, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use kilnwatch_core::{AnalyticsError, AnalyticsResult};

use crate::frame::FeatureFrame;
use crate::rolling::{
    deviation_score, forward_fill, moving_average, moving_std, rate_of_change,
};

/// A declared product of two columns, e.g. `kiln_temperature × system_pressure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossFeature {
    pub name: String,
    pub left: String,
    pub right: String,
}

impl CrossFeature {
    pub fn new(name: impl Into<String>, left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            left: left.into(),
            right: right.into(),
        }
    }
}

/// Which pure functions of the timestamp to emit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeFeatures {
    pub hour: bool,
    pub minute: bool,
    pub day_of_week: bool,
    pub month: bool,
    pub is_weekend: bool,
}

impl TimeFeatures {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Stateless feature engine.
///
/// For every rolling column `c` it appends, in this order per column:
/// `c_ma`, `c_std`, `c_deviation`, then after all columns `c_rate_of_change`
/// per column, then declared cross products, then time features. Input
/// columns are carried through unchanged (apart from sanitising). Output row
/// count always equals input row count.
///
/// Every output column is sanitised: non-finite values are forward-filled
/// from the nearest prior finite value and default to `0.0` when no prior
/// value exists (start-of-window effect). This default is the documented
/// fallback; the number of filled slots is logged at debug level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEngine {
    window: usize,
    rolling_columns: Vec<String>,
    rate_of_change: bool,
    products: Vec<CrossFeature>,
    time: TimeFeatures,
}

impl FeatureEngine {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            rolling_columns: Vec::new(),
            rate_of_change: true,
            products: Vec::new(),
            time: TimeFeatures::none(),
        }
    }

    pub fn with_rolling_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rolling_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rate_of_change(mut self, enabled: bool) -> Self {
        self.rate_of_change = enabled;
        self
    }

    pub fn with_cross_feature(mut self, feature: CrossFeature) -> Self {
        self.products.push(feature);
        self
    }

    pub fn with_time_features(mut self, time: TimeFeatures) -> Self {
        self.time = time;
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn transform(&self, input: &FeatureFrame) -> AnalyticsResult<FeatureFrame> {
        if self.window == 0 {
            return Err(AnalyticsError::invalid_config("rolling window must be >= 1"));
        }

        let mut out = input.clone();

        for col in &self.rolling_columns {
            let values = input.require(col)?;
            let ma = moving_average(values, self.window);
            let sd = moving_std(values, self.window);
            let dev = deviation_score(values, &ma, &sd);
            out.insert(format!("{col}_ma"), ma)?;
            out.insert(format!("{col}_std"), sd)?;
            out.insert(format!("{col}_deviation"), dev)?;
        }

        if self.rate_of_change {
            for col in &self.rolling_columns {
                let values = input.require(col)?;
                out.insert(format!("{col}_rate_of_change"), rate_of_change(values))?;
            }
        }

        for p in &self.products {
            let left = input.require(&p.left)?;
            let right = input.require(&p.right)?;
            out.insert(
                p.name.clone(),
                left.iter().zip(right).map(|(a, b)| a * b).collect(),
            )?;
        }

        self.append_time_features(&mut out)?;

        let filled = sanitize(&mut out);
        if filled > 0 {
            tracing::debug!(rows = out.len(), filled, "forward-filled non-finite feature values");
        }
        Ok(out)
    }

    fn append_time_features(&self, out: &mut FeatureFrame) -> AnalyticsResult<()> {
        let ts = out.timestamps().to_vec();
        let t = self.time;
        if t.hour {
            out.insert("hour", ts.iter().map(|x| f64::from(x.hour())).collect())?;
        }
        if t.minute {
            out.insert("minute", ts.iter().map(|x| f64::from(x.minute())).collect())?;
        }
        if t.day_of_week {
            out.insert(
                "day_of_week",
                ts.iter()
                    .map(|x| f64::from(x.weekday().num_days_from_monday()))
                    .collect(),
            )?;
        }
        if t.month {
            out.insert("month", ts.iter().map(|x| f64::from(x.month())).collect())?;
        }
        if t.is_weekend {
            out.insert(
                "is_weekend",
                ts.iter()
                    .map(|x| match x.weekday() {
                        Weekday::Sat | Weekday::Sun => 1.0,
                        _ => 0.0,
                    })
                    .collect(),
            )?;
        }
        Ok(())
    }
}

/// Forward-fill then zero-default every column of `frame`.
pub fn sanitize(frame: &mut FeatureFrame) -> usize {
    (0..frame.names().len())
        .map(|i| forward_fill(frame.column_mut(i), 0.0))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn start() -> DateTime<Utc> {
        // A Friday.
        Utc.with_ymd_and_hms(2024, 3, 1, 22, 50, 0).unwrap()
    }

    fn frame_of(temps: &[f64], pressures: &[f64]) -> FeatureFrame {
        let ts = (0..temps.len())
            .map(|i| start() + Duration::hours(i as i64))
            .collect();
        let mut f = FeatureFrame::new(ts);
        f.insert("kiln_temperature", temps.to_vec()).unwrap();
        f.insert("system_pressure", pressures.to_vec()).unwrap();
        f
    }

    fn engine() -> FeatureEngine {
        FeatureEngine::new(3)
            .with_rolling_columns(["kiln_temperature"])
            .with_cross_feature(CrossFeature::new(
                "temp_pressure_correlation",
                "kiln_temperature",
                "system_pressure",
            ))
            .with_time_features(TimeFeatures {
                hour: true,
                minute: true,
                is_weekend: true,
                ..TimeFeatures::none()
            })
    }

    #[test]
    fn emits_declared_columns_in_order() {
        let out = engine()
            .transform(&frame_of(&[1000.0, 1010.0, 990.0], &[3.0, 3.1, 3.2]))
            .unwrap();
        let names: Vec<&str> = out.names().iter().map(String::as_str).collect();
        assert_eq!(
            names,
            vec![
                "kiln_temperature",
                "system_pressure",
                "kiln_temperature_ma",
                "kiln_temperature_std",
                "kiln_temperature_deviation",
                "kiln_temperature_rate_of_change",
                "temp_pressure_correlation",
                "hour",
                "minute",
                "is_weekend",
            ]
        );
    }

    #[test]
    fn start_of_window_gaps_default_to_zero() {
        let out = engine()
            .transform(&frame_of(&[1000.0, 1010.0], &[3.0, 3.0]))
            .unwrap();
        assert_eq!(out.value("kiln_temperature_std", 0), Some(0.0));
        assert_eq!(out.value("kiln_temperature_deviation", 0), Some(0.0));
        assert_eq!(out.value("kiln_temperature_rate_of_change", 0), Some(0.0));
        assert_eq!(out.value("kiln_temperature_rate_of_change", 1), Some(10.0));
    }

    #[test]
    fn non_finite_inputs_are_forward_filled() {
        let out = engine()
            .transform(&frame_of(&[1000.0, f64::NAN, 1020.0], &[3.0, 3.0, 3.0]))
            .unwrap();
        assert_eq!(out.value("kiln_temperature", 1), Some(1000.0));
        for name in out.names() {
            assert!(out.column(name).unwrap().iter().all(|v| v.is_finite()), "{name}");
        }
    }

    #[test]
    fn time_features_follow_the_timestamp() {
        let out = engine()
            .transform(&frame_of(&[1.0, 2.0, 3.0], &[1.0, 1.0, 1.0]))
            .unwrap();
        assert_eq!(out.column("hour").unwrap(), &[22.0, 23.0, 0.0]);
        assert_eq!(out.column("minute").unwrap(), &[50.0, 50.0, 50.0]);
        // Friday 22:50, Friday 23:50, Saturday 00:50.
        assert_eq!(out.column("is_weekend").unwrap(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn missing_rolling_column_is_an_error() {
        let f = FeatureFrame::new(vec![start()]);
        let err = engine().transform(&f).unwrap_err();
        assert_eq!(err, AnalyticsError::missing_column("kiln_temperature"));
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = FeatureEngine::new(0)
            .transform(&frame_of(&[1.0], &[1.0]))
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidConfig(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: output keeps every row and is identical across runs.
        #[test]
        fn transform_preserves_rows_and_is_idempotent(
            temps in prop::collection::vec(prop_oneof![
                9 => 500.0f64..1500.0,
                1 => Just(f64::NAN),
            ], 0..60),
        ) {
            let pressures = vec![3.2; temps.len()];
            let input = frame_of(&temps, &pressures);

            let a = engine().transform(&input).unwrap();
            let b = engine().transform(&input).unwrap();

            prop_assert_eq!(a.len(), input.len());
            prop_assert_eq!(&a, &b);
            for name in a.names() {
                prop_assert!(a.column(name).unwrap().iter().all(|v| v.is_finite()));
            }
        }
    }
}
