//! Greedy truck replenishment over a demand horizon.
//!
//! The scheduler walks the forecast hour by hour and asks a
//! [`ReplenishmentPolicy`] how many trucks to book against the shortfall.
//! Inventory is projected after every hour and never goes below zero: demand
//! beyond on-hand stock is unmet, not borrowed.

use serde::{Deserialize, Serialize};

/// Tons delivered per truck.
pub const TRUCK_CAPACITY: f64 = 25.0;

/// Multiplier applied to the shortage-driven truck count.
pub const SAFETY_FACTOR: f64 = 1.2;

/// Number of highest-demand hours reported.
pub const PEAK_HOURS: usize = 5;

/// Decides how many trucks to book for one hour.
pub trait ReplenishmentPolicy: Send + Sync + std::fmt::Debug {
    fn trucks_for(&self, demand: f64, inventory: f64) -> u32;
}

/// One-step greedy policy: cover this hour's shortage, plus a safety margin.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreedyReplenishment {
    pub truck_capacity: f64,
    pub safety_factor: f64,
}

impl Default for GreedyReplenishment {
    fn default() -> Self {
        Self {
            truck_capacity: TRUCK_CAPACITY,
            safety_factor: SAFETY_FACTOR,
        }
    }
}

impl ReplenishmentPolicy for GreedyReplenishment {
    fn trucks_for(&self, demand: f64, inventory: f64) -> u32 {
        let shortage = (clean(demand) - clean(inventory)).max(0.0);
        if shortage <= 0.0 || self.truck_capacity <= 0.0 {
            return 0;
        }
        let trucks = (shortage / self.truck_capacity).ceil();
        // Truncated after scaling: 4 trucks stay 4, 5 become 6.
        (trucks * self.safety_factor.max(1.0)) as u32
    }
}

/// Negative and non-finite quantities count as zero.
fn clean(x: f64) -> f64 {
    if x.is_finite() { x.max(0.0) } else { 0.0 }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub hour_offset: usize,
    pub predicted_demand: f64,
    pub trucks_scheduled: u32,
    pub projected_inventory_after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruckSchedule {
    pub entries: Vec<ScheduleEntry>,
    pub total_trucks: u32,
    /// Hour offsets of the highest predicted demand, highest first.
    pub peak_demand_hours: Vec<usize>,
}

impl TruckSchedule {
    /// Tons booked across the whole horizon.
    pub fn total_tonnage(&self, truck_capacity: f64) -> f64 {
        f64::from(self.total_trucks) * truck_capacity
    }
}

#[derive(Debug, Clone)]
pub struct TruckScheduler<P = GreedyReplenishment> {
    policy: P,
    truck_capacity: f64,
    peak_hours: usize,
}

impl Default for TruckScheduler {
    fn default() -> Self {
        Self::new(GreedyReplenishment::default())
    }
}

impl TruckScheduler {
    pub fn greedy(truck_capacity: f64, safety_factor: f64) -> Self {
        Self::new(GreedyReplenishment {
            truck_capacity,
            safety_factor,
        })
        .with_truck_capacity(truck_capacity)
    }
}

impl<P: ReplenishmentPolicy> TruckScheduler<P> {
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            truck_capacity: TRUCK_CAPACITY,
            peak_hours: PEAK_HOURS,
        }
    }

    pub fn with_truck_capacity(mut self, truck_capacity: f64) -> Self {
        self.truck_capacity = truck_capacity;
        self
    }

    pub fn with_peak_hours(mut self, peak_hours: usize) -> Self {
        self.peak_hours = peak_hours;
        self
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn schedule(&self, demand: &[f64], starting_inventory: f64) -> TruckSchedule {
        let mut inventory = clean(starting_inventory);
        let mut entries = Vec::with_capacity(demand.len());
        let mut total_trucks = 0u32;

        for (hour_offset, &predicted_demand) in demand.iter().enumerate() {
            let trucks = self.policy.trucks_for(predicted_demand, inventory);
            inventory = (inventory + f64::from(trucks) * self.truck_capacity
                - clean(predicted_demand))
            .max(0.0);
            total_trucks = total_trucks.saturating_add(trucks);
            entries.push(ScheduleEntry {
                hour_offset,
                predicted_demand,
                trucks_scheduled: trucks,
                projected_inventory_after: inventory,
            });
        }

        let schedule = TruckSchedule {
            peak_demand_hours: peak_hours(demand, self.peak_hours),
            entries,
            total_trucks,
        };
        tracing::debug!(
            hours = demand.len(),
            total_trucks = schedule.total_trucks,
            "truck schedule built"
        );
        schedule
    }
}

/// Offsets of the `n` largest demands, descending; ties keep the earlier hour.
pub fn peak_hours(demand: &[f64], n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..demand.len()).collect();
    order.sort_by(|&a, &b| demand[b].total_cmp(&demand[a]).then(a.cmp(&b)));
    order.truncate(n);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn flat_demand_books_trucks_only_on_shortfall_hours() {
        let demand = vec![100.0; 48];
        let schedule = TruckScheduler::default().schedule(&demand, 500.0);

        for entry in &schedule.entries[..5] {
            assert_eq!(entry.trucks_scheduled, 0, "hour {}", entry.hour_offset);
        }
        assert_eq!(schedule.entries[4].projected_inventory_after, 0.0);
        for entry in &schedule.entries[5..] {
            assert_eq!(entry.trucks_scheduled, 4, "hour {}", entry.hour_offset);
            assert_eq!(entry.projected_inventory_after, 0.0);
        }
        assert_eq!(schedule.total_trucks, 172);

        let total_demand: f64 = demand.iter().sum();
        assert!(schedule.total_tonnage(TRUCK_CAPACITY) >= total_demand - 500.0);
    }

    #[test]
    fn safety_factor_truncates_after_scaling() {
        let policy = GreedyReplenishment::default();
        assert_eq!(policy.trucks_for(100.0, 0.0), 4);
        assert_eq!(policy.trucks_for(125.0, 0.0), 6);
        assert_eq!(policy.trucks_for(10.0, 0.0), 1);
        assert_eq!(policy.trucks_for(10.0, 10.0), 0);
        assert_eq!(policy.trucks_for(f64::NAN, 0.0), 0);
        assert_eq!(policy.trucks_for(-5.0, 0.0), 0);
    }

    #[test]
    fn surplus_carries_over() {
        let schedule = TruckScheduler::default().schedule(&[125.0, 10.0], 0.0);
        assert_eq!(schedule.entries[0].trucks_scheduled, 6);
        assert_eq!(schedule.entries[0].projected_inventory_after, 25.0);
        assert_eq!(schedule.entries[1].trucks_scheduled, 0);
        assert_eq!(schedule.entries[1].projected_inventory_after, 15.0);
    }

    #[test]
    fn peaks_are_descending_with_earlier_ties_first() {
        let demand = [5.0, 9.0, 7.0, 9.0, 1.0, 8.0, 3.0];
        assert_eq!(peak_hours(&demand, 5), vec![1, 3, 5, 2, 0]);
        assert_eq!(peak_hours(&demand[..2], 5), vec![1, 0]);
    }

    #[test]
    fn empty_horizon_is_empty_schedule() {
        let schedule = TruckScheduler::default().schedule(&[], 100.0);
        assert!(schedule.entries.is_empty());
        assert_eq!(schedule.total_trucks, 0);
        assert!(schedule.peak_demand_hours.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: projected inventory is never negative.
        #[test]
        fn inventory_never_goes_negative(
            demand in proptest::collection::vec(0.0f64..1.0e4, 0..96),
            start in 0.0f64..1.0e5,
        ) {
            let schedule = TruckScheduler::default().schedule(&demand, start);
            prop_assert_eq!(schedule.entries.len(), demand.len());
            for entry in &schedule.entries {
                prop_assert!(entry.projected_inventory_after >= 0.0);
            }
        }

        /// Property: every hour with a shortfall is covered.
        #[test]
        fn shortfall_hours_are_covered(
            demand in proptest::collection::vec(0.0f64..1.0e3, 1..48),
            start in 0.0f64..1.0e3,
        ) {
            let schedule = TruckScheduler::default().schedule(&demand, start);
            let mut before = start;
            for entry in &schedule.entries {
                let delivered = f64::from(entry.trucks_scheduled) * TRUCK_CAPACITY;
                prop_assert!(before + delivered >= entry.predicted_demand - 1e-9);
                before = entry.projected_inventory_after;
            }
        }
    }
}
