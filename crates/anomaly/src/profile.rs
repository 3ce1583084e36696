//! Per-feature normal operating ranges learned from non-anomalous rows.

use serde::{Deserialize, Serialize};

use kilnwatch_ai::{FeatureSchema, FeatureVector};
use kilnwatch_core::{AnalyticsError, AnalyticsResult};
use kilnwatch_features::rolling::{mean, sample_std};

/// Smallest spread used when building bounds, so `lower < mean < upper`
/// holds even for a constant feature.
pub const STD_FLOOR: f64 = 1e-6;

/// Added to the std when measuring z-deviation.
pub const Z_EPSILON: f64 = 0.001;

/// Division guard for `deviation_percent` when a mean is zero.
pub const PERCENT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub name: String,
    pub mean: f64,
    pub std: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl FeatureRange {
    fn new(name: String, mean: f64, std: f64, sigma: f64) -> Self {
        let spread = sigma * std.max(STD_FLOOR);
        Self {
            name,
            mean,
            std,
            lower_bound: mean - spread,
            upper_bound: mean + spread,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower_bound && value <= self.upper_bound
    }

    pub fn z_deviation(&self, value: f64) -> f64 {
        (value - self.mean).abs() / (self.std + Z_EPSILON)
    }

    /// `|value − mean| / |mean| × 100`.
    pub fn deviation_percent(&self, value: f64) -> f64 {
        (value - self.mean).abs() / self.mean.abs().max(PERCENT_EPSILON) * 100.0
    }
}

/// Outcome of the statistical scorer for one vector.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalVerdict {
    pub out_of_bounds: usize,
    pub fraction: f64,
    pub is_anomaly: bool,
    /// Mean absolute z-deviation across all tracked features.
    pub score: f64,
}

/// Ranges in schema order. Immutable once fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalRangeProfile {
    ranges: Vec<FeatureRange>,
    flag_fraction: f64,
}

impl NormalRangeProfile {
    /// Fit on row-major normal-only rows laid out in `schema` order.
    pub fn fit(
        schema: &FeatureSchema,
        rows: &[Vec<f64>],
        sigma: f64,
        flag_fraction: f64,
    ) -> AnalyticsResult<Self> {
        if rows.is_empty() {
            return Err(AnalyticsError::training(
                "normal range profile needs at least one normal row",
            ));
        }
        let ranges = schema
            .names()
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let column: Vec<f64> = rows.iter().map(|r| r.get(j).copied().unwrap_or(0.0)).collect();
                let m = mean(&column).unwrap_or(0.0);
                let sd = sample_std(&column).unwrap_or(0.0);
                FeatureRange::new(name.clone(), m, sd, sigma)
            })
            .collect();
        Ok(Self {
            ranges,
            flag_fraction,
        })
    }

    pub fn ranges(&self) -> &[FeatureRange] {
        &self.ranges
    }

    pub fn range(&self, name: &str) -> Option<&FeatureRange> {
        self.ranges.iter().find(|r| r.name == name)
    }

    /// Score an aligned vector against the bounds.
    pub fn evaluate(&self, vector: &FeatureVector) -> StatisticalVerdict {
        let tracked = self.ranges.len().max(1) as f64;
        let (out, z_total) = self
            .ranges
            .iter()
            .zip(vector.values())
            .fold((0usize, 0.0), |(out, z), (r, v)| {
                (out + usize::from(!r.contains(*v)), z + r.z_deviation(*v))
            });
        let fraction = out as f64 / tracked;
        StatisticalVerdict {
            out_of_bounds: out,
            fraction,
            is_anomaly: fraction > self.flag_fraction,
            score: z_total / tracked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(["a", "b"]).unwrap()
    }

    #[test]
    fn bounds_are_three_sigma() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0]];
        let p = NormalRangeProfile::fit(&schema(), &rows, 3.0, 0.2).unwrap();
        let a = p.range("a").unwrap();
        assert_eq!(a.mean, 2.0);
        let sd = 2.0_f64.sqrt();
        assert!((a.upper_bound - (2.0 + 3.0 * sd)).abs() < 1e-12);
        // Constant feature still has a strict interval.
        let b = p.range("b").unwrap();
        assert!(b.lower_bound < b.mean && b.mean < b.upper_bound);
    }

    #[test]
    fn flags_when_fraction_exceeds_threshold() {
        let rows = vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]];
        let p = NormalRangeProfile::fit(&schema(), &rows, 3.0, 0.2).unwrap();

        let inside = p.evaluate(&schema().vector(vec![1.0, 1.0]));
        assert_eq!(inside.out_of_bounds, 0);
        assert!(!inside.is_anomaly);

        let one_out = p.evaluate(&schema().vector(vec![100.0, 1.0]));
        assert_eq!(one_out.out_of_bounds, 1);
        assert_eq!(one_out.fraction, 0.5);
        assert!(one_out.is_anomaly);
        assert!(one_out.score > inside.score);
    }

    #[test]
    fn empty_normal_subset_is_a_training_error() {
        let err = NormalRangeProfile::fit(&schema(), &[], 3.0, 0.2).unwrap_err();
        assert!(matches!(err, AnalyticsError::Training(_)));
    }

    #[test]
    fn deviation_percent_is_relative_to_mean() {
        let r = FeatureRange::new("t".into(), 1000.0, 10.0, 3.0);
        assert!((r.deviation_percent(1250.0) - 25.0).abs() < 1e-12);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: lower < mean < upper for any finite normal data.
        #[test]
        fn bounds_strictly_bracket_the_mean(
            values in prop::collection::vec(-1.0e4f64..1.0e4, 1..40),
        ) {
            let s = FeatureSchema::new(["x"]).unwrap();
            let rows: Vec<Vec<f64>> = values.iter().map(|v| vec![*v]).collect();
            let p = NormalRangeProfile::fit(&s, &rows, 3.0, 0.2).unwrap();
            let r = &p.ranges()[0];
            prop_assert!(r.lower_bound < r.mean);
            prop_assert!(r.mean < r.upper_bound);
        }

        /// Property: a larger std never narrows the bounds.
        #[test]
        fn bounds_widen_with_std(mean in -100.0f64..100.0, sd in 0.0f64..50.0, extra in 0.0f64..50.0) {
            let narrow = FeatureRange::new("x".into(), mean, sd, 3.0);
            let wide = FeatureRange::new("x".into(), mean, sd + extra, 3.0);
            prop_assert!(wide.lower_bound <= narrow.lower_bound);
            prop_assert!(wide.upper_bound >= narrow.upper_bound);
        }
    }
}
