//! Train/commit state machine for learned artifacts.
//!
//! Every trained artifact (outlier model + normal-range profile, quality
//! regressors, demand forecaster) lives in a [`ModelSlot`]. A slot starts
//! `Untrained` and only moves to `Trained` through [`ModelSlot::commit`],
//! which swaps in a fully-built value in a single write. Readers clone the
//! `Arc` and keep using the generation they observed even if a retrain
//! commits a replacement meanwhile.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::id::TrainingRunId;

/// Observable state of a slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ModelState {
    Untrained,
    Trained {
        generation: u64,
        run_id: TrainingRunId,
        committed_at: DateTime<Utc>,
    },
}

impl ModelState {
    pub fn is_trained(&self) -> bool {
        matches!(self, ModelState::Trained { .. })
    }
}

/// A committed artifact together with its provenance.
#[derive(Debug)]
pub struct Committed<T> {
    pub generation: u64,
    pub run_id: TrainingRunId,
    pub committed_at: DateTime<Utc>,
    pub value: T,
}

impl<T> core::ops::Deref for Committed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Atomically swappable holder for one trained artifact.
#[derive(Debug)]
pub struct ModelSlot<T> {
    name: &'static str,
    inner: RwLock<Option<Arc<Committed<T>>>>,
}

impl<T> ModelSlot<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Publish a fully-built artifact, replacing any previous generation.
    ///
    /// Generations increase by one per commit.
    pub fn commit(&self, run_id: TrainingRunId, value: T) -> Arc<Committed<T>> {
        let mut guard = self.inner.write();
        let generation = guard.as_ref().map_or(1, |c| c.generation + 1);
        let committed = Arc::new(Committed {
            generation,
            run_id,
            committed_at: Utc::now(),
            value,
        });
        *guard = Some(Arc::clone(&committed));
        drop(guard);

        tracing::info!(model = self.name, generation, run = %run_id, "model committed");
        committed
    }

    /// The current generation, or `UntrainedModel` if nothing was committed.
    pub fn current(&self) -> AnalyticsResult<Arc<Committed<T>>> {
        self.inner
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| AnalyticsError::untrained(self.name))
    }

    pub fn state(&self) -> ModelState {
        match self.inner.read().as_ref() {
            None => ModelState::Untrained,
            Some(c) => ModelState::Trained {
                generation: c.generation,
                run_id: c.run_id,
                committed_at: c.committed_at,
            },
        }
    }

    pub fn is_trained(&self) -> bool {
        self.inner.read().is_some()
    }
}
