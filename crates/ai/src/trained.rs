//! A fitted model bundled with the schema it was fit on.

use chrono::{DateTime, Utc};

use kilnwatch_core::AnalyticsResult;

use crate::learner::{OutlierScorer, Regressor};
use crate::schema::{FeatureSchema, FeatureVector};

#[derive(Debug)]
pub struct TrainedModel<M: ?Sized> {
    pub name: String,
    pub schema: FeatureSchema,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
    pub model: Box<M>,
}

impl<M: ?Sized> TrainedModel<M> {
    pub fn new(
        name: impl Into<String>,
        schema: FeatureSchema,
        training_rows: usize,
        model: Box<M>,
    ) -> Self {
        Self {
            name: name.into(),
            schema,
            trained_at: Utc::now(),
            training_rows,
            model,
        }
    }
}

impl TrainedModel<dyn Regressor> {
    pub fn predict(&self, vector: &FeatureVector) -> AnalyticsResult<f64> {
        self.schema.check(&self.name, vector)?;
        Ok(self.model.predict(vector.values()))
    }
}

impl TrainedModel<dyn OutlierScorer> {
    /// `(score, is_outlier)` for one aligned vector.
    pub fn score(&self, vector: &FeatureVector) -> AnalyticsResult<(f64, bool)> {
        self.schema.check(&self.name, vector)?;
        let score = self.model.score(vector.values());
        Ok((score, score > self.model.threshold()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kilnwatch_core::AnalyticsError;

    #[derive(Debug)]
    struct SumRegressor;

    impl Regressor for SumRegressor {
        fn predict(&self, row: &[f64]) -> f64 {
            row.iter().sum()
        }
    }

    #[test]
    fn predict_checks_alignment_first() {
        let schema = FeatureSchema::new(["a", "b"]).unwrap();
        let model: TrainedModel<dyn Regressor> =
            TrainedModel::new("sum", schema.clone(), 10, Box::new(SumRegressor));

        let ok = schema.vector(vec![1.0, 2.0]);
        assert_eq!(model.predict(&ok).unwrap(), 3.0);

        let wrong = FeatureVector::with_names(vec!["b".into(), "a".into()], vec![1.0, 2.0]);
        assert!(matches!(
            model.predict(&wrong),
            Err(AnalyticsError::FeatureAlignment { .. })
        ));
    }
}
