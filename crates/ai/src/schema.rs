//! Feature schemas: the ordered feature names a model was fit on.
//!
//! Column order is part of a model's identity. Vectors carry the names they
//! were built from and every prediction re-checks them against the schema;
//! a mismatch is a `FeatureAlignment` error, never a silent truncate/pad.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use kilnwatch_core::{AnalyticsError, AnalyticsResult};
use kilnwatch_features::FeatureFrame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Arc<[String]>,
}

impl FeatureSchema {
    /// Build a schema; names must be non-empty and unique.
    pub fn new<I, S>(names: I) -> AnalyticsResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(AnalyticsError::training("feature schema cannot be empty"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(AnalyticsError::training(format!(
                "duplicate feature `{dup}` in schema"
            )));
        }
        Ok(Self {
            names: names.into(),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Verify `vector` was built for exactly this schema.
    pub fn check(&self, model: &str, vector: &FeatureVector) -> AnalyticsResult<()> {
        if Arc::ptr_eq(&self.names, &vector.names) {
            return Ok(());
        }
        if vector.names.len() != self.names.len() {
            return Err(AnalyticsError::alignment(
                model,
                format!(
                    "expected {} features, got {}",
                    self.names.len(),
                    vector.names.len()
                ),
            ));
        }
        if let Some((i, (want, got))) = self
            .names
            .iter()
            .zip(vector.names.iter())
            .enumerate()
            .find(|(_, (a, b))| a != b)
        {
            return Err(AnalyticsError::alignment(
                model,
                format!("position {i}: expected `{want}`, got `{got}`"),
            ));
        }
        Ok(())
    }

    /// Row-major training matrix in schema order.
    pub fn matrix(&self, frame: &FeatureFrame) -> AnalyticsResult<Vec<Vec<f64>>> {
        frame.select(&self.names)
    }

    /// Vector for one frame row. Missing columns are an alignment error.
    pub fn vector_from_frame(&self, frame: &FeatureFrame, row: usize) -> AnalyticsResult<FeatureVector> {
        let values = self
            .names
            .iter()
            .map(|n| {
                frame.value(n, row).ok_or_else(|| {
                    AnalyticsError::alignment("frame", format!("no value for `{n}` at row {row}"))
                })
            })
            .collect::<AnalyticsResult<Vec<f64>>>()?;
        Ok(self.vector(values))
    }

    /// Vector from a name → value map.
    ///
    /// Missing names default to `0.0`; this is the documented fallback for
    /// partial live state, not an error. Returns the vector and the missing
    /// names.
    pub fn vector_from_map(&self, state: &BTreeMap<String, f64>) -> (FeatureVector, Vec<String>) {
        let mut missing = Vec::new();
        let values = self
            .names
            .iter()
            .map(|n| match state.get(n) {
                Some(v) => *v,
                None => {
                    missing.push(n.clone());
                    0.0
                }
            })
            .collect();
        (self.vector(values), missing)
    }

    /// Wrap raw values that are already in schema order.
    ///
    /// Non-finite values are replaced with `0.0` (logged) so they never
    /// reach a model.
    pub fn vector(&self, mut values: Vec<f64>) -> FeatureVector {
        let mut repaired = 0usize;
        for v in values.iter_mut() {
            if !v.is_finite() {
                *v = 0.0;
                repaired += 1;
            }
        }
        if repaired > 0 {
            tracing::warn!(repaired, "non-finite feature values replaced with 0.0");
        }
        FeatureVector {
            names: Arc::clone(&self.names),
            values,
        }
    }
}

/// Feature values tagged with the names they were built for.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// A vector with an explicit name list (used by callers that assemble
    /// vectors outside a schema; alignment is checked at prediction time).
    pub fn with_names(names: Vec<String>, values: Vec<f64>) -> Self {
        Self {
            names: names.into(),
            values,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(["a", "b", "c"]).unwrap()
    }

    #[test]
    fn duplicate_names_are_rejected() {
        assert!(FeatureSchema::new(["a", "a"]).is_err());
        assert!(FeatureSchema::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn reordered_vector_fails_alignment() {
        let v = FeatureVector::with_names(
            vec!["a".into(), "c".into(), "b".into()],
            vec![1.0, 2.0, 3.0],
        );
        let err = schema().check("m", &v).unwrap_err();
        match err {
            AnalyticsError::FeatureAlignment { model, reason } => {
                assert_eq!(model, "m");
                assert!(reason.contains("position 1"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_vector_fails_alignment() {
        let v = FeatureVector::with_names(vec!["a".into(), "b".into()], vec![1.0, 2.0]);
        assert!(matches!(
            schema().check("m", &v),
            Err(AnalyticsError::FeatureAlignment { .. })
        ));
    }

    #[test]
    fn equal_names_from_elsewhere_align() {
        let v = FeatureVector::with_names(
            vec!["a".into(), "b".into(), "c".into()],
            vec![1.0, 2.0, 3.0],
        );
        assert!(schema().check("m", &v).is_ok());
    }

    #[test]
    fn map_vector_zero_fills_missing_names() {
        let mut state = BTreeMap::new();
        state.insert("b".to_string(), 2.0);
        state.insert("extra".to_string(), 9.0);
        let (v, missing) = schema().vector_from_map(&state);
        assert_eq!(v.values(), &[0.0, 2.0, 0.0]);
        assert_eq!(missing, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn non_finite_values_never_survive() {
        let v = schema().vector(vec![f64::NAN, f64::INFINITY, 1.0]);
        assert_eq!(v.values(), &[0.0, 0.0, 1.0]);
    }
}
