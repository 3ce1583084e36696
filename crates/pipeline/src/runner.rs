use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

use kilnwatch_core::AnalyticsResult;

use crate::orchestrator::{AnalysisOrchestrator, CycleInput};
use crate::result::AnalysisResult;

/// Where each cycle's recent history comes from.
pub trait CycleSource: Send + Sync + 'static {
    fn next_input(&self) -> AnalyticsResult<CycleInput>;
}

/// Sink for cycle results.
pub trait AnalysisSink: Send + Sync + 'static {
    fn emit(&self, result: AnalysisResult);
}

/// In-memory sink for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAnalysisSink {
    inner: Mutex<Vec<AnalysisResult>>,
}

impl InMemoryAnalysisSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<AnalysisResult> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl AnalysisSink for InMemoryAnalysisSink {
    fn emit(&self, result: AnalysisResult) {
        self.inner.lock().push(result);
    }
}

/// Config for the background analysis runner.
#[derive(Debug, Clone)]
pub struct AnalysisRunner {
    pub interval: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for AnalysisRunner {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_retries: 5,
            base_backoff: Duration::from_millis(250),
        }
    }
}

impl AnalysisRunner {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }
}

/// Handle for the running analysis runner (shutdown + trigger hook).
#[derive(Debug)]
pub struct AnalysisRunnerHandle {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl AnalysisRunnerHandle {
    /// Request a cycle now (e.g. after new readings arrive).
    ///
    /// Triggers are coalesced: if a cycle is already pending this is a no-op.
    pub fn trigger(&self) {
        // Capacity 1; ignore if already full.
        let _ = self.trigger.try_send(());
    }

    /// Gracefully stop the runner thread.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl AnalysisRunner {
    /// Spawn the runner thread.
    ///
    /// - Schedule: runs once on startup, then every `interval`
    /// - Trigger: `handle.trigger()` requests an extra cycle
    /// - Source failures: logged + retried with bounded exponential backoff
    pub fn spawn<S, K>(
        &self,
        name: &'static str,
        orchestrator: Arc<AnalysisOrchestrator>,
        source: Arc<S>,
        sink: Arc<K>,
    ) -> std::io::Result<AnalysisRunnerHandle>
    where
        S: CycleSource,
        K: AnalysisSink,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);

        let cfg = self.clone();
        let join = thread::Builder::new().name(name.to_string()).spawn(move || {
            runner_loop(name, cfg, shutdown_rx, trigger_rx, orchestrator, source, sink)
        })?;

        Ok(AnalysisRunnerHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            join: Some(join),
        })
    }
}

fn runner_loop<S, K>(
    name: &'static str,
    cfg: AnalysisRunner,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    orchestrator: Arc<AnalysisOrchestrator>,
    source: Arc<S>,
    sink: Arc<K>,
) where
    S: CycleSource,
    K: AnalysisSink,
{
    info!(runner = name, "analysis runner started");

    let mut next_tick = Instant::now() + cfg.interval;
    let mut pending = true; // run once on startup
    let mut failures: u32 = 0;
    let mut backoff_until: Option<Instant> = None;

    loop {
        // Shutdown has priority.
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            // Keep a stable cadence even if we were delayed.
            while next_tick <= now {
                next_tick += cfg.interval;
            }
        }

        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        if let Some(until) = backoff_until {
            if Instant::now() < until {
                thread::sleep(Duration::from_millis(20));
                continue;
            }
            backoff_until = None;
        }

        if !pending {
            let sleep_for = next_tick
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(50));
            thread::sleep(sleep_for);
            continue;
        }

        pending = false;

        let input = match source.next_input() {
            Ok(input) => input,
            Err(e) => {
                warn!(runner = name, error = %e, attempt = failures + 1, "failed to read cycle input");
                failures += 1;
                if failures <= cfg.max_retries {
                    pending = true;
                    backoff_until = Some(Instant::now() + backoff(cfg.base_backoff, failures));
                } else {
                    failures = 0;
                }
                continue;
            }
        };

        failures = 0;
        sink.emit(orchestrator.run_cycle(&input));
    }

    info!(runner = name, "analysis runner stopped");
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    // base * 2^(attempt-1), capped at 10s.
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(pow as u128);
    Duration::from_millis(ms.min(10_000) as u64)
}
