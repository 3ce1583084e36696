//! Logistics recommendations: truck schedule plus supply-chain health.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use kilnwatch_core::{AnalyticsResult, MaterialSample, SensorSample};
use kilnwatch_features::FeatureFrame;
use kilnwatch_features::rolling::mean;

use crate::features::logistics_frame;
use crate::forecaster::{DemandForecast, DemandForecaster, LogisticsConfig};
use crate::scheduler::{TruckSchedule, TruckScheduler};

pub const LOW_EFFICIENCY_ADVISORY: &str =
    "Supply chain efficiency is below 80%. Consider optimizing delivery routes.";
pub const LOW_TURNOVER_ADVISORY: &str =
    "Low inventory turnover detected. Consider implementing just-in-time delivery.";

const EFFICIENCY_FLOOR: f64 = 0.8;
const TURNOVER_FLOOR: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticsMetrics {
    /// Mean supply efficiency over the trailing rows.
    pub current_supply_efficiency: f64,
    /// `Σflow / mean(inventory)`; absent when mean inventory is zero.
    pub inventory_turnover: Option<f64>,
    pub average_delay: f64,
}

impl LogisticsMetrics {
    pub fn from_frame(frame: &FeatureFrame, trailing_rows: usize) -> AnalyticsResult<Self> {
        let recent = frame.tail(trailing_rows);
        let efficiency = recent.require("supply_efficiency")?;
        let delay = recent.require("supply_chain_delay")?;
        let flow = frame.require("material_flow_rate")?;
        let inventory = frame.require("inventory_level")?;

        let inventory_turnover = mean(inventory)
            .filter(|m| *m != 0.0)
            .map(|m| flow.iter().sum::<f64>() / m);
        Ok(Self {
            current_supply_efficiency: mean(efficiency).unwrap_or(0.0),
            inventory_turnover,
            average_delay: mean(delay).unwrap_or(0.0),
        })
    }

    pub fn improvement_opportunities(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.current_supply_efficiency < EFFICIENCY_FLOOR {
            out.push(LOW_EFFICIENCY_ADVISORY.to_owned());
        }
        if self.inventory_turnover.is_some_and(|t| t < TURNOVER_FLOOR) {
            out.push(LOW_TURNOVER_ADVISORY.to_owned());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticsRecommendations {
    pub truck_scheduling: TruckSchedule,
    pub predicted_demand: DemandForecast,
    pub performance_metrics: LogisticsMetrics,
    pub improvement_opportunities: Vec<String>,
}

/// Ties the forecaster, scheduler, and supply metrics together for one cycle.
#[derive(Debug, Clone)]
pub struct LogisticsAdvisor {
    forecaster: Arc<DemandForecaster>,
    scheduler: TruckScheduler,
}

impl LogisticsAdvisor {
    pub fn new(forecaster: Arc<DemandForecaster>) -> Self {
        let config = forecaster.config();
        let scheduler = TruckScheduler::greedy(config.truck_capacity, config.safety_factor)
            .with_peak_hours(config.peak_hours);
        Self {
            forecaster,
            scheduler,
        }
    }

    pub fn config(&self) -> &LogisticsConfig {
        self.forecaster.config()
    }

    pub fn forecaster(&self) -> &Arc<DemandForecaster> {
        &self.forecaster
    }

    /// Forecast, schedule, and assess supply health from recent history.
    ///
    /// Only the configured tails of each history are used.
    pub fn recommend(
        &self,
        sensor: &[SensorSample],
        material: &[MaterialSample],
    ) -> AnalyticsResult<LogisticsRecommendations> {
        let config = self.config();
        let sensor = tail(sensor, config.sensor_history_rows);
        let material = tail(material, config.material_history_rows);
        let frame = logistics_frame(sensor, material, config.rolling_window)?;
        self.recommend_from_frame(&frame)
    }

    pub fn recommend_from_frame(
        &self,
        frame: &FeatureFrame,
    ) -> AnalyticsResult<LogisticsRecommendations> {
        let config = self.config();
        let predicted_demand = self.forecaster.forecast(frame, config.horizon_hours)?;
        let inventory = frame
            .column("inventory_level")
            .and_then(|c| c.last().copied())
            .unwrap_or(0.0);
        let truck_scheduling = self
            .scheduler
            .schedule(&predicted_demand.hourly_demand, inventory);

        let performance_metrics = LogisticsMetrics::from_frame(frame, config.trailing_rows)?;
        let improvement_opportunities = performance_metrics.improvement_opportunities();
        tracing::info!(
            total_trucks = truck_scheduling.total_trucks,
            efficiency = performance_metrics.current_supply_efficiency,
            advisories = improvement_opportunities.len(),
            "logistics recommendations ready"
        );

        Ok(LogisticsRecommendations {
            truck_scheduling,
            predicted_demand,
            performance_metrics,
            improvement_opportunities,
        })
    }
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}
