//! Train/test row splits.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use kilnwatch_core::{AnalyticsError, AnalyticsResult};

/// Row indices for the two halves of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn train_len(rows: usize, test_fraction: f64) -> AnalyticsResult<usize> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(AnalyticsError::invalid_config(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    if rows < 2 {
        return Err(AnalyticsError::training(format!(
            "need at least 2 rows to split, got {rows}"
        )));
    }
    let train = ((rows as f64) * (1.0 - test_fraction)).floor() as usize;
    Ok(train.clamp(1, rows - 1))
}

/// First `1 - test_fraction` of the rows train, the rest test. Order is kept.
pub fn chronological(rows: usize, test_fraction: f64) -> AnalyticsResult<Split> {
    let cut = train_len(rows, test_fraction)?;
    Ok(Split {
        train: (0..cut).collect(),
        test: (cut..rows).collect(),
    })
}

/// Seeded shuffle, then split.
pub fn shuffled(rows: usize, test_fraction: f64, seed: u64) -> AnalyticsResult<Split> {
    let cut = train_len(rows, test_fraction)?;
    let mut order: Vec<usize> = (0..rows).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let test = order.split_off(cut);
    Ok(Split { train: order, test })
}

/// Pick rows by index.
pub fn take<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().filter_map(|&i| items.get(i).cloned()).collect()
}
