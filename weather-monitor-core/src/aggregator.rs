//! Single read/write point for source status and the network snapshot.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, RwLock};
use tokio::sync::watch;
use tracing::debug;

use crate::error::RegistryError;
use crate::health::{HealthCheckResult, NetworkSnapshot, TargetRole};
use crate::registry::SourceRegistry;
use crate::source::Source;
use crate::sync::{lock, read, wait, write};

/// Callbacks for a presentation layer. Every method defaults to a no-op.
///
/// Callbacks run on whichever task applied the change (the scheduler's
/// result task, or the caller of [`StatusAggregator::select`]); they must not
/// block and must not call back into the aggregator's write path. Callbacks
/// are delivered one change at a time, in the order the changes were applied,
/// even when several writers race.
pub trait SourceObserver: Send + Sync {
    fn on_source_changed(&self, _source: &Source) {}
    fn on_source_status_changed(&self, _source: &Source) {}
    fn on_snapshot(&self, _snapshot: &NetworkSnapshot) {}
}

type ResultKey = (TargetRole, String);

#[derive(Debug)]
struct State {
    registry: SourceRegistry,
    latest: HashMap<ResultKey, HealthCheckResult>,
    /// Issued under the state lock, so tickets follow apply order.
    next_ticket: u64,
}

impl State {
    fn issue_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }
}

/// Owns the source registry and the current [`NetworkSnapshot`].
///
/// Status writes and selection changes share one critical section, so a
/// reader never sees a half-applied update.
pub struct StatusAggregator {
    state: Mutex<State>,
    snapshot: watch::Sender<Arc<NetworkSnapshot>>,
    observers: RwLock<Vec<Arc<dyn SourceObserver>>>,
    /// Ticket whose callbacks may run next.
    serving: Mutex<u64>,
    turn: Condvar,
}

impl StatusAggregator {
    pub fn new(registry: SourceRegistry) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(NetworkSnapshot::default()));

        Self {
            state: Mutex::new(State { registry, latest: HashMap::new(), next_ticket: 0 }),
            snapshot,
            observers: RwLock::new(Vec::new()),
            serving: Mutex::new(0),
            turn: Condvar::new(),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn SourceObserver>) {
        write(&self.observers).push(observer);
    }

    /// Latest best-known view. Values persist until superseded.
    pub fn snapshot(&self) -> Arc<NetworkSnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Receiver that wakes whenever a new snapshot is published.
    pub fn subscribe(&self) -> watch::Receiver<Arc<NetworkSnapshot>> {
        self.snapshot.subscribe()
    }

    pub fn all_sources(&self) -> Vec<Source> {
        lock(&self.state).registry.all().to_vec()
    }

    pub fn active_source(&self) -> Option<Source> {
        lock(&self.state).registry.active().cloned()
    }

    pub fn source(&self, name: &str) -> Option<Source> {
        lock(&self.state).registry.find(name).cloned()
    }

    /// Latest result applied for a target, if any.
    pub fn latest(&self, role: TargetRole, target: &str) -> Option<HealthCheckResult> {
        lock(&self.state).latest.get(&(role, target.to_string())).cloned()
    }

    pub fn select(&self, index: usize) -> Result<Source, RegistryError> {
        let mut state = lock(&self.state);
        let selected = state.registry.select(index)?.clone();
        let ticket = state.issue_ticket();
        drop(state);

        let _turn = self.wait_turn(ticket);
        self.notify(|o| o.on_source_changed(&selected));
        Ok(selected)
    }

    pub fn select_by_name(&self, name: &str) -> Result<Source, RegistryError> {
        let mut state = lock(&self.state);
        let selected = state.registry.select_by_name(name)?.clone();
        let ticket = state.issue_ticket();
        drop(state);

        let _turn = self.wait_turn(ticket);
        self.notify(|o| o.on_source_changed(&selected));
        Ok(selected)
    }

    /// Overwrite the latest result for `result.target`.
    ///
    /// Applying the same result twice is harmless. A scheduler result from an
    /// older cycle than the one already stored is dropped. Ad-hoc results
    /// (cycle 0) always apply and take over the stored cycle number, so a
    /// late scheduler result cannot undo them.
    pub fn apply_result(&self, mut result: HealthCheckResult) {
        let mut state = lock(&self.state);
        let key = (result.role, result.target.clone());

        if let Some(previous) = state.latest.get(&key) {
            if result.cycle == 0 {
                result.cycle = previous.cycle;
            } else if result.cycle < previous.cycle {
                debug!(
                    probe = %result.target,
                    cycle = result.cycle,
                    newer = previous.cycle,
                    "dropping stale probe result"
                );
                return;
            }
        }

        let updated_source = match result.role {
            TargetRole::Source => state
                .registry
                .record_status(&result.target, result.status, result.checked_at)
                .cloned(),
            _ => None,
        };
        let network_role = result.role != TargetRole::Source;

        state.latest.insert(key, result);

        let published = network_role.then(|| {
            let snapshot = Arc::new(build_snapshot(&state.latest));
            // Published under the state lock so snapshots go out in apply order.
            self.snapshot.send_replace(snapshot.clone());
            snapshot
        });

        let ticket = state.issue_ticket();
        drop(state);

        let _turn = self.wait_turn(ticket);

        if let Some(source) = updated_source {
            self.notify(|o| o.on_source_status_changed(&source));
        }
        if let Some(snapshot) = published {
            self.notify(|o| o.on_snapshot(&snapshot));
        }
    }

    /// Block until every earlier change has been delivered.
    fn wait_turn(&self, ticket: u64) -> Turn<'_> {
        let mut serving = lock(&self.serving);
        while *serving != ticket {
            serving = wait(&self.turn, serving);
        }
        Turn { aggregator: self }
    }

    fn notify(&self, f: impl Fn(&dyn SourceObserver)) {
        let observers = read(&self.observers).clone();
        for observer in &observers {
            f(observer.as_ref());
        }
    }
}

/// Passes delivery to the next ticket when dropped, even if a callback panics.
struct Turn<'a> {
    aggregator: &'a StatusAggregator,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        *lock(&self.aggregator.serving) += 1;
        self.aggregator.turn.notify_all();
    }
}

impl std::fmt::Debug for StatusAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusAggregator")
            .field("state", &*lock(&self.state))
            .field("observers", &read(&self.observers).len())
            .finish()
    }
}

fn build_snapshot(latest: &HashMap<ResultKey, HealthCheckResult>) -> NetworkSnapshot {
    let mut snapshot = NetworkSnapshot::default();
    let mut updated_at: Option<DateTime<Utc>> = None;

    for ((role, target), result) in latest {
        match role {
            TargetRole::Connectivity => {
                if result.reachable {
                    snapshot.internet = true;
                    snapshot.latency = match (snapshot.latency, result.latency) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    };
                }
            }
            TargetRole::Ipv6 => snapshot.ipv6 |= result.reachable,
            TargetRole::ApiServer => {
                snapshot.api_servers.insert(target.clone(), result.reachable);
            }
            TargetRole::Source => continue,
        }

        updated_at = updated_at.max(Some(result.checked_at));
    }

    snapshot.updated_at = updated_at;
    snapshot
}
