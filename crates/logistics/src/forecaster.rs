//! Hour-ahead material-flow forecasting.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use kilnwatch_ai::{
    FeatureSchema, RegressionMetrics, Regressor, RegressorLearner, RidgeLearner, TrainedModel,
    split,
};
use kilnwatch_core::{
    AnalyticsError, AnalyticsResult, MaterialSample, ModelSlot, ModelState, SensorSample,
    TrainingRunId,
};
use kilnwatch_features::FeatureFrame;

use crate::features::{FORECAST_FEATURES, logistics_frame};
use crate::scheduler::{PEAK_HOURS, SAFETY_FACTOR, TRUCK_CAPACITY};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticsConfig {
    /// Window of the 24 h flow statistics, in five-minute rows.
    pub rolling_window: usize,
    pub horizon_hours: usize,
    /// How far ahead the training target sits, in rows.
    pub lead_rows: usize,
    pub test_fraction: f64,
    pub ridge_alpha: f64,
    pub truck_capacity: f64,
    pub safety_factor: f64,
    pub peak_hours: usize,
    /// Rows averaged by the advisor.
    pub trailing_rows: usize,
    /// Live sensor rows fed to the forecaster each cycle.
    pub sensor_history_rows: usize,
    /// Live material rows fed to the forecaster each cycle.
    pub material_history_rows: usize,
}

impl Default for LogisticsConfig {
    fn default() -> Self {
        Self {
            rolling_window: 288,
            horizon_hours: 48,
            lead_rows: 12,
            test_fraction: 0.2,
            ridge_alpha: 1.0,
            truck_capacity: TRUCK_CAPACITY,
            safety_factor: SAFETY_FACTOR,
            peak_hours: PEAK_HOURS,
            trailing_rows: 100,
            sensor_history_rows: 100,
            material_history_rows: 50,
        }
    }
}

impl LogisticsConfig {
    pub fn with_horizon_hours(mut self, hours: usize) -> Self {
        self.horizon_hours = hours;
        self
    }

    pub fn with_rolling_window(mut self, window: usize) -> Self {
        self.rolling_window = window;
        self
    }

    pub fn with_lead_rows(mut self, rows: usize) -> Self {
        self.lead_rows = rows;
        self
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.rolling_window == 0 {
            return Err(AnalyticsError::invalid_config("rolling window must be >= 1"));
        }
        if self.horizon_hours == 0 {
            return Err(AnalyticsError::invalid_config("forecast horizon must be >= 1 hour"));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(AnalyticsError::invalid_config(format!(
                "test fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if !(self.truck_capacity > 0.0) {
            return Err(AnalyticsError::invalid_config("truck capacity must be positive"));
        }
        if !(self.safety_factor >= 1.0) {
            return Err(AnalyticsError::invalid_config("safety factor must be >= 1"));
        }
        if self.trailing_rows == 0 {
            return Err(AnalyticsError::invalid_config("trailing rows must be >= 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastTrainingReport {
    pub run_id: TrainingRunId,
    pub generation: u64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub metrics: RegressionMetrics,
}

/// Predicted hourly demand starting at `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandForecast {
    pub start: DateTime<Utc>,
    pub hourly_demand: Vec<f64>,
}

impl DemandForecast {
    pub fn len(&self) -> usize {
        self.hourly_demand.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hourly_demand.is_empty()
    }
}

#[derive(Debug)]
pub struct DemandForecaster {
    config: LogisticsConfig,
    learner: Arc<dyn RegressorLearner>,
    slot: ModelSlot<TrainedModel<dyn Regressor>>,
}

impl DemandForecaster {
    pub const MODEL_NAME: &'static str = "demand_forecaster";

    pub fn new(config: LogisticsConfig) -> AnalyticsResult<Self> {
        let learner = Arc::new(RidgeLearner::new(config.ridge_alpha));
        Self::with_learner(config, learner)
    }

    pub fn with_learner(
        config: LogisticsConfig,
        learner: Arc<dyn RegressorLearner>,
    ) -> AnalyticsResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            learner,
            slot: ModelSlot::new(Self::MODEL_NAME),
        })
    }

    pub fn config(&self) -> &LogisticsConfig {
        &self.config
    }

    pub fn state(&self) -> ModelState {
        self.slot.state()
    }

    pub fn is_trained(&self) -> bool {
        self.slot.is_trained()
    }

    pub fn train(
        &self,
        sensor: &[SensorSample],
        material: &[MaterialSample],
    ) -> AnalyticsResult<ForecastTrainingReport> {
        if sensor.is_empty() || material.is_empty() {
            return Err(AnalyticsError::training(
                "demand forecasting needs sensor and material history",
            ));
        }
        let frame = logistics_frame(sensor, material, self.config.rolling_window)?;
        self.train_on_frame(&frame)
    }

    /// Fit on a prepared logistics frame. The target is the flow rate
    /// `lead_rows` ahead; trailing rows without a target are dropped.
    pub fn train_on_frame(&self, frame: &FeatureFrame) -> AnalyticsResult<ForecastTrainingReport> {
        let schema = FeatureSchema::new(FORECAST_FEATURES)?;
        let flow = frame.require("material_flow_rate")?;
        let usable = frame.len().saturating_sub(self.config.lead_rows);
        if usable < 2 {
            return Err(AnalyticsError::training(format!(
                "need more than {} rows to build an hour-ahead target, got {}",
                self.config.lead_rows + 1,
                frame.len()
            )));
        }

        let mut rows = schema.matrix(frame)?;
        rows.truncate(usable);
        let targets = &flow[self.config.lead_rows..];

        let halves = split::chronological(usable, self.config.test_fraction)?;
        let train_rows = split::take(&rows, &halves.train);
        let test_rows = split::take(&rows, &halves.test);
        let y_train = split::take(targets, &halves.train);
        let y_test = split::take(targets, &halves.test);

        let fitted = self.learner.fit(&train_rows, &y_train)?;
        let predicted: Vec<f64> = test_rows.iter().map(|r| fitted.predict(r)).collect();
        let metrics = RegressionMetrics::evaluate(&predicted, &y_test)
            .ok_or_else(|| AnalyticsError::training("empty forecast test split"))?;
        tracing::info!(
            model = Self::MODEL_NAME,
            mse = metrics.mse,
            mae = metrics.mae,
            r2 = metrics.r2,
            "demand forecaster evaluated"
        );

        let run_id = TrainingRunId::new();
        let model = TrainedModel::new(Self::MODEL_NAME, schema, train_rows.len(), fitted);
        let committed = self.slot.commit(run_id, model);
        Ok(ForecastTrainingReport {
            run_id,
            generation: committed.generation,
            train_rows: halves.train.len(),
            test_rows: halves.test.len(),
            metrics,
        })
    }

    /// Roll the latest row of `frame` forward one hour at a time, replacing
    /// only the time features, and predict demand for each hour.
    pub fn forecast(&self, frame: &FeatureFrame, hours: usize) -> AnalyticsResult<DemandForecast> {
        let committed = self.slot.current()?;
        let last = frame
            .len()
            .checked_sub(1)
            .ok_or_else(|| AnalyticsError::malformed("no logistics rows to forecast from"))?;
        let start = frame.timestamps()[last];
        let mut state = frame.row_map(last);
        self.forecast_from_state(&committed, &mut state, start, hours)
    }

    fn forecast_from_state(
        &self,
        model: &TrainedModel<dyn Regressor>,
        state: &mut BTreeMap<String, f64>,
        start: DateTime<Utc>,
        hours: usize,
    ) -> AnalyticsResult<DemandForecast> {
        let mut hourly_demand = Vec::with_capacity(hours);
        for offset in 0..hours {
            let at = start + Duration::hours(offset as i64);
            state.insert("hour".to_owned(), f64::from(at.hour()));
            state.insert(
                "day_of_week".to_owned(),
                f64::from(at.weekday().num_days_from_monday()),
            );
            state.insert("month".to_owned(), f64::from(at.month()));

            let (vector, missing) = model.schema.vector_from_map(state);
            if offset == 0 && !missing.is_empty() {
                tracing::debug!(missing = missing.len(), "forecast features zero-filled");
            }
            hourly_demand.push(model.predict(&vector)?);
        }
        Ok(DemandForecast {
            start,
            hourly_demand,
        })
    }
}
