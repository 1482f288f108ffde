//! Periodic health probing on independent cadences.
//!
//! Every `start()` allocates a fresh run context (cancellation token, task
//! tracker, result channel); `stop()` cancels it and waits until every task
//! it spawned has exited. Results flow through one channel into a single
//! applying task, which is the only writer to the [`StatusAggregator`] while
//! the scheduler runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::aggregator::StatusAggregator;
use crate::health::{HealthCheckResult, ProbeTarget};
use crate::probe::HealthProbe;
use crate::source::SourceStatus;
use crate::sync::lock;

const RESULT_CHANNEL_SIZE: usize = 64;

/// Slack on top of a target's own timeout before the scheduler stops waiting on a probe.
const PROBE_GRACE: Duration = Duration::from_millis(500);

const MIN_PERIOD: Duration = Duration::from_millis(10);

/// One periodic schedule and the targets it probes each cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Cadence {
    pub name: String,
    pub initial_delay: Duration,
    pub period: Duration,
    pub targets: Vec<ProbeTarget>,
}

impl Cadence {
    pub fn new(
        name: impl Into<String>,
        initial_delay: Duration,
        period: Duration,
        targets: Vec<ProbeTarget>,
    ) -> Self {
        Self { name: name.into(), initial_delay, period, targets }
    }
}

/// Handles needed to launch probe cycles inside one run context.
#[derive(Debug, Clone)]
struct Dispatcher {
    probe: Arc<dyn HealthProbe>,
    cycle: Arc<AtomicU64>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    results: mpsc::Sender<HealthCheckResult>,
}

impl Dispatcher {
    /// Fan out one task per target; none waits on another.
    fn spawn_cycle(&self, cadence: &Cadence) {
        let cycle = next_cycle(&self.cycle);
        debug!(cadence = %cadence.name, cycle, targets = cadence.targets.len(), "probe cycle");

        for target in &cadence.targets {
            let this = self.clone();
            let target = target.clone();

            self.tracker.spawn(async move {
                tokio::select! {
                    biased;
                    _ = this.cancel.cancelled() => {}
                    result = run_probe(this.probe.as_ref(), &target, cycle) => {
                        // Receiver is gone only after stop; the result is discarded.
                        let _ = this.results.send(result).await;
                    }
                }
            });
        }
    }
}

#[derive(Debug)]
struct RunContext {
    dispatcher: Dispatcher,
}

/// Drives [`HealthProbe`] over a set of [`Cadence`]s and feeds the results
/// into a [`StatusAggregator`].
#[derive(Debug)]
pub struct HealthScheduler {
    probe: Arc<dyn HealthProbe>,
    aggregator: Arc<StatusAggregator>,
    cadences: Vec<Cadence>,
    cycle: Arc<AtomicU64>,
    running: Mutex<Option<RunContext>>,
}

impl HealthScheduler {
    pub fn new(
        probe: Arc<dyn HealthProbe>,
        aggregator: Arc<StatusAggregator>,
        cadences: Vec<Cadence>,
    ) -> Self {
        Self {
            probe,
            aggregator,
            cadences,
            cycle: Arc::new(AtomicU64::new(0)),
            running: Mutex::new(None),
        }
    }

    pub fn cadences(&self) -> &[Cadence] {
        &self.cadences
    }

    pub fn is_running(&self) -> bool {
        lock(&self.running).is_some()
    }

    /// Start every cadence. No-op if already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut running = lock(&self.running);
        if running.is_some() {
            debug!("health scheduler already running");
            return;
        }

        let (results, rx) = mpsc::channel(RESULT_CHANNEL_SIZE);
        let dispatcher = Dispatcher {
            probe: self.probe.clone(),
            cycle: self.cycle.clone(),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            results,
        };

        dispatcher.tracker.spawn(apply_results(
            self.aggregator.clone(),
            rx,
            dispatcher.cancel.clone(),
        ));

        for cadence in &self.cadences {
            dispatcher
                .tracker
                .spawn(run_cadence(dispatcher.clone(), cadence.clone()));
        }

        *running = Some(RunContext { dispatcher });
        info!(cadences = self.cadences.len(), "health scheduler started");
    }

    /// Cancel all scheduled work and wait for the run context to retire.
    ///
    /// Once this returns no further result reaches the aggregator from the
    /// stopped run. In-flight probes are abandoned, not awaited to completion.
    pub async fn stop(&self) {
        let Some(ctx) = lock(&self.running).take() else {
            return;
        };

        let tracker = ctx.dispatcher.tracker.clone();
        ctx.dispatcher.cancel.cancel();
        drop(ctx);

        tracker.close();
        tracker.wait().await;
        info!("health scheduler stopped");
    }

    /// Run every cadence once, outside the periodic schedule.
    ///
    /// While running, the extra cycles are dispatched into the live run
    /// context and this returns immediately. While stopped, the probes run
    /// here and this returns once every result has been applied.
    pub async fn refresh_now(&self) {
        let dispatcher = lock(&self.running).as_ref().map(|ctx| ctx.dispatcher.clone());

        if let Some(dispatcher) = dispatcher {
            info!("dispatching out-of-band refresh");
            for cadence in &self.cadences {
                dispatcher.spawn_cycle(cadence);
            }
            return;
        }

        info!("running one-shot refresh");
        let mut probes = JoinSet::new();
        for cadence in &self.cadences {
            let cycle = next_cycle(&self.cycle);
            for target in &cadence.targets {
                let probe = self.probe.clone();
                let target = target.clone();
                probes.spawn(async move { run_probe(probe.as_ref(), &target, cycle).await });
            }
        }

        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(result) => self.aggregator.apply_result(result),
                Err(err) => warn!(error = %err, "probe task failed"),
            }
        }
    }
}

impl Drop for HealthScheduler {
    fn drop(&mut self) {
        if let Some(ctx) = lock(&self.running).take() {
            ctx.dispatcher.cancel.cancel();
        }
    }
}

fn next_cycle(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

/// Probe one target, bounding the call even if the probe ignores its timeout.
async fn run_probe(probe: &dyn HealthProbe, target: &ProbeTarget, cycle: u64) -> HealthCheckResult {
    let deadline = target.timeout + PROBE_GRACE;

    match tokio::time::timeout(deadline, probe.probe(target, target.timeout)).await {
        Ok(result) => {
            debug!(
                probe = %result.target,
                reachable = result.reachable,
                status = %result.status,
                latency_ms = result.latency.map(|l| l.as_millis() as u64),
                cycle,
                "probe finished"
            );
            result.with_cycle(cycle)
        }
        Err(_) => {
            warn!(probe = %target.id, ?deadline, "probe exceeded its deadline");
            HealthCheckResult::failed(target, SourceStatus::Offline).with_cycle(cycle)
        }
    }
}

async fn run_cadence(dispatcher: Dispatcher, cadence: Cadence) {
    let start = Instant::now() + cadence.initial_delay;
    let mut ticker = tokio::time::interval_at(start, cadence.period.max(MIN_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = dispatcher.cancel.cancelled() => break,
            _ = ticker.tick() => dispatcher.spawn_cycle(&cadence),
        }
    }

    debug!(cadence = %cadence.name, "cadence stopped");
}

/// The single writer while running: drains probe results into the aggregator.
async fn apply_results(
    aggregator: Arc<StatusAggregator>,
    mut rx: mpsc::Receiver<HealthCheckResult>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Some(result) => aggregator.apply_result(result),
                None => break,
            },
        }
    }
}
