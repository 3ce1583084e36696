//! Seeded isolation forest.
//!
//! Each tree isolates points by recursive random axis-aligned splits on a
//! random subsample. Anomalies isolate in fewer splits, so the normalised
//! score `2^(-E[h(x)] / c(ψ))` is larger for them. The decision threshold is
//! the training-score quantile at `1 - contamination`.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use kilnwatch_core::{AnalyticsError, AnalyticsResult};

use crate::learner::{OutlierLearner, OutlierScorer, check_rows};

const EULER_GAMMA: f64 = 0.577_215_664_9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestLearner {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForestLearner {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
        }
    }
}

impl IsolationForestLearner {
    pub fn new(contamination: f64) -> Self {
        Self {
            contamination,
            ..Self::default()
        }
    }

    pub fn with_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(AnalyticsError::invalid_config(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_estimators == 0 {
            return Err(AnalyticsError::invalid_config("n_estimators must be >= 1"));
        }
        if self.max_samples == 0 {
            return Err(AnalyticsError::invalid_config("max_samples must be >= 1"));
        }
        Ok(())
    }

    pub fn fit_forest(&self, rows: &[Vec<f64>]) -> AnalyticsResult<IsolationForest> {
        self.validate()?;
        check_rows(rows)?;

        let n = rows.len();
        let psi = self.max_samples.min(n);
        let height_limit = (psi.max(2) as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let trees = (0..self.n_estimators)
            .map(|_| {
                let sample = rand::seq::index::sample(&mut rng, n, psi).into_vec();
                let mut builder = TreeBuilder {
                    rows,
                    rng: &mut rng,
                    height_limit,
                    nodes: Vec::new(),
                };
                builder.build(sample, 0);
                IsolationTree {
                    nodes: builder.nodes,
                }
            })
            .collect();

        let mut forest = IsolationForest {
            trees,
            normaliser: average_path_length(psi),
            threshold: 0.0,
        };

        let mut scores: Vec<f64> = rows.iter().map(|r| forest.score(r)).collect();
        scores.sort_by(f64::total_cmp);
        forest.threshold = quantile_sorted(&scores, 1.0 - self.contamination);

        tracing::debug!(
            trees = self.n_estimators,
            subsample = psi,
            threshold = forest.threshold,
            "isolation forest fitted"
        );
        Ok(forest)
    }
}

impl OutlierLearner for IsolationForestLearner {
    fn fit(&self, rows: &[Vec<f64>]) -> AnalyticsResult<Box<dyn OutlierScorer>> {
        Ok(Box::new(self.fit_forest(rows)?))
    }
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    normaliser: f64,
    threshold: f64,
}

impl IsolationForest {
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn mean_path_length(&self, row: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.path_length(row)).sum();
        total / self.trees.len() as f64
    }
}

impl OutlierScorer for IsolationForest {
    fn score(&self, row: &[f64]) -> f64 {
        if self.normaliser <= 0.0 {
            return 0.5;
        }
        2f64.powf(-self.mean_path_length(row) / self.normaliser)
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { size: usize },
    Split { feature: usize, at: f64, left: usize, right: usize },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn path_length(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        let mut depth = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { size } => return depth as f64 + average_path_length(*size),
                Node::Split { feature, at, left, right } => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if v < *at { *left } else { *right };
                    depth += 1;
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    rng: &'a mut StdRng,
    height_limit: usize,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    /// Builds the subtree for `sample` and returns its node index.
    fn build(&mut self, sample: Vec<usize>, depth: usize) -> usize {
        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf { size: sample.len() });

        if depth >= self.height_limit || sample.len() <= 1 {
            return slot;
        }

        let width = self.rows[sample[0]].len();
        let ranges: Vec<(usize, f64, f64)> = (0..width)
            .filter_map(|f| {
                let (lo, hi) = sample.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    let v = self.rows[i][f];
                    (lo.min(v), hi.max(v))
                });
                (lo < hi).then_some((f, lo, hi))
            })
            .collect();

        let Some(&(feature, lo, hi)) = ranges.choose(&mut *self.rng) else {
            return slot;
        };
        let at = self.rng.gen_range(lo..hi);

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            sample.into_iter().partition(|&i| self.rows[i][feature] < at);

        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);
        self.nodes[slot] = Node::Split { feature, at, left, right };
        slot
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let m = (n - 1) as f64;
            2.0 * (m.ln() + EULER_GAMMA) - 2.0 * m / n as f64
        }
    }
}

/// Linear-interpolated quantile of an ascending slice.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}
