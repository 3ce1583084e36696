//! `kilnwatch-logistics`
//!
//! **Responsibility:** forecast raw-material demand and turn it into a truck
//! replenishment plan.
//!
//! - `DemandForecaster`: hour-ahead flow regression, rolled over a horizon.
//! - `TruckScheduler`: greedy per-hour booking behind `ReplenishmentPolicy`.
//! - `LogisticsAdvisor`: forecast + schedule + supply-chain health metrics.

pub mod advisor;
pub mod features;
pub mod forecaster;
pub mod scheduler;

pub use advisor::{
    LOW_EFFICIENCY_ADVISORY, LOW_TURNOVER_ADVISORY, LogisticsAdvisor, LogisticsMetrics,
    LogisticsRecommendations,
};
pub use features::{FORECAST_FEATURES, TIME_FEATURES, logistics_frame, supply_efficiency};
pub use forecaster::{DemandForecast, DemandForecaster, ForecastTrainingReport, LogisticsConfig};
pub use scheduler::{
    GreedyReplenishment, PEAK_HOURS, ReplenishmentPolicy, SAFETY_FACTOR, ScheduleEntry,
    TRUCK_CAPACITY, TruckSchedule, TruckScheduler, peak_hours,
};
