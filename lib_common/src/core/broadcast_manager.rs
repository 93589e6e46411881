//! # Broadcast Manager
//!
//! Owns the live price list, the set of active subscriptions and the single
//! periodic task that moves one price per tick and pushes it to everybody.
//!
//! ## Core Design Principles:
//!
//! 1.  **One lock, one owner**: records, subscriptions, the id counter and the
//!     random sources sit behind a single mutex. Subscribe, unsubscribe and the
//!     mutation half of a tick are serialized by it.
//!
//! 2.  **Zero-copy fan-out**: the updated record is encoded once into `Bytes`
//!     and every subscriber gets a clone of the same buffer. The subscriber set
//!     is snapshotted under the lock and written to after releasing it, so a
//!     sink may call back into the manager.
//!
//! 3.  **Failure isolation**: a failed write is logged and skipped. A sink that
//!     reports `Closed` is pruned once the fan-out is over; removal is
//!     idempotent, so the transport's own closure notification is harmless.
//!
//! 4.  **Jittered, lazily started scheduler**: the task starts on the first
//!     subscription and sleeps a fresh random delay before every tick. Under
//!     [`SchedulerPolicy::StopWhenIdle`] it stops with the last subscriber and
//!     restarts with the next one; under [`SchedulerPolicy::KeepAlive`] it runs
//!     for the life of the manager and ticks with nobody listening are no-ops.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tokio_util::sync::CancellationToken;

use crate::core::event_frame::encode_frame;
use crate::core::subscription::{EventSink, SinkError, Subscription, SubscriptionId};
use crate::markets::stocks::{identity_transform, PriceModel, RecordTransform, StockRecord};
use crate::utils::random::{RandomIntInRange, SeededSequence};

/// Shortest delay between two ticks.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(5_000);
/// Upper (exclusive) bound of the delay between two ticks.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);

/// Errors raised by the broadcast manager.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// `subscribe` was called outside a tokio runtime, so the scheduler could
    /// not be spawned.
    #[error("no tokio runtime available to drive the broadcast scheduler: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

/// What the scheduler does once the last subscriber leaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SchedulerPolicy {
    /// Stop the task when the subscriber set becomes empty and restart it on
    /// the next subscription. Prices are frozen while idle.
    #[default]
    StopWhenIdle,
    /// Once started, keep ticking forever; ticks with no subscribers neither
    /// mutate nor send anything.
    KeepAlive,
}

/// Lifecycle of the periodic task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    /// No task running.
    Idle,
    /// The task is sleeping towards its next tick.
    Active,
}

/// Bounds of the per-tick random delay, `[min_delay, max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSchedule {
    min_delay: Duration,
    max_delay: Duration,
}

impl TickSchedule {
    /// Creates a schedule. A `max_delay` not above `min_delay` is raised to
    /// `min_delay + 1ms`.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        let floor = min_delay + Duration::from_millis(1);
        Self {
            min_delay,
            max_delay: max_delay.max(floor),
        }
    }

    /// Shortest delay.
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Exclusive upper bound of the delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    fn millis(&self) -> (f64, f64) {
        // Inclusive integer interval [min, max - 1].
        let min = self.min_delay.as_millis() as f64;
        let max = self.max_delay.as_millis() as f64 - 1.0;
        (min, max)
    }
}

impl Default for TickSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELAY, DEFAULT_MAX_DELAY)
    }
}

/// Construction options besides the dataset and the transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Delay bounds between ticks.
    pub schedule: TickSchedule,
    /// Scheduler behaviour with no subscribers.
    pub policy: SchedulerPolicy,
    /// When set, record selection and tick delays come from seeded sequences
    /// so a run can be replayed.
    pub seed: Option<i64>,
}

/// Point-in-time counters, for the status endpoint and for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManagerStats {
    /// Number of live subscriptions.
    pub subscribers: usize,
    /// Ticks fired since construction, including no-op ticks.
    pub ticks: u64,
    /// Current scheduler state.
    pub scheduler: SchedulerState,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// The scheduler was stopped while this tick was pending.
    Cancelled,
    /// Nobody to send to (or nothing to update): no mutation happened.
    Skipped,
    /// One record was updated and offered to this many subscribers.
    Delivered(usize),
}

/// The running scheduler task. `epoch` tells a task apart from its successor.
struct SchedulerHandle {
    epoch: u64,
    token: CancellationToken,
}

struct ManagerState {
    records: Vec<StockRecord>,
    // Ordered by id so fan-out follows subscription order; removal is O(log n).
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    next_id: SubscriptionId,
    scheduler: Option<SchedulerHandle>,
    next_epoch: u64,
    picker: RandomIntInRange,
    jitter: RandomIntInRange,
}

struct Shared {
    state: Mutex<ManagerState>,
    transform: Arc<dyn RecordTransform>,
    policy: SchedulerPolicy,
    seeded: bool,
    ticks: AtomicU64,
}

/// # Broadcast Manager
///
/// Cheap to clone; all clones share the same dataset, subscribers and
/// scheduler. Construct one per process and hand clones to whatever needs it.
#[derive(Clone)]
pub struct BroadcastManager {
    shared: Arc<Shared>,
}

impl BroadcastManager {
    /// Creates a manager over `records` with default options.
    ///
    /// Without a `transform` the identity transform is used, so ticks still
    /// fan out but prices never move.
    pub fn new(records: Vec<StockRecord>, transform: Option<Arc<dyn RecordTransform>>) -> Self {
        Self::with_options(records, transform, ManagerOptions::default())
    }

    /// Creates a manager with explicit schedule, policy and seed.
    pub fn with_options(
        records: Vec<StockRecord>,
        transform: Option<Arc<dyn RecordTransform>>,
        options: ManagerOptions,
    ) -> Self {
        let transform = transform.unwrap_or_else(|| Arc::new(identity_transform) as Arc<dyn RecordTransform>);
        // Record selection and delays get distinct seeds even when the given
        // seed normalizes to 1 (0, -1, 1).
        let picker_seed = SeededSequence::new(options.seed.unwrap_or(1));
        let jitter_seed = picker_seed.split();
        let last_index = records.len().saturating_sub(1) as f64;
        let (min_ms, max_ms) = options.schedule.millis();

        let state = ManagerState {
            records,
            subscriptions: BTreeMap::new(),
            next_id: 0,
            scheduler: None,
            next_epoch: 0,
            picker: RandomIntInRange::new(0.0, last_index, i64::from(picker_seed.state())),
            jitter: RandomIntInRange::new(min_ms, max_ms, i64::from(jitter_seed.state())),
        };

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                transform,
                policy: options.policy,
                seeded: options.seed.is_some(),
                ticks: AtomicU64::new(0),
            }),
        }
    }

    /// # Subscribe
    ///
    /// Registers `sink` under the next identifier and starts the scheduler if
    /// it is idle. Never blocks on the sink.
    pub fn subscribe<S: EventSink + 'static>(&self, sink: S) -> Result<SubscriptionId, BroadcastError> {
        self.subscribe_shared(Arc::new(sink))
    }

    /// [`subscribe`](Self::subscribe) for a sink that is already shared.
    pub fn subscribe_shared(&self, sink: Arc<dyn EventSink>) -> Result<SubscriptionId, BroadcastError> {
        // Checked before touching state so a failure leaves nothing behind.
        let runtime = Handle::try_current()?;

        let mut state = self.shared.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.subscriptions.insert(id, Subscription::new(id, sink));
        log::info!("Subscription {} added ({} active)", id, state.subscriptions.len());

        if state.scheduler.is_none() {
            start_scheduler(&self.shared, &mut state, &runtime);
        }

        Ok(id)
    }

    /// Like [`subscribe`](Self::subscribe), but returns a guard that
    /// unsubscribes when dropped. Transports tie the guard to the lifetime of
    /// the client stream so disconnects clean up by themselves.
    pub fn subscribe_guarded<S: EventSink + 'static>(&self, sink: S) -> Result<SubscriptionGuard, BroadcastError> {
        let id = self.subscribe(sink)?;
        Ok(SubscriptionGuard {
            shared: Arc::downgrade(&self.shared),
            id,
        })
    }

    /// # Unsubscribe
    ///
    /// Removes the subscription with `id`. Unknown ids are a no-op. Returns
    /// whether something was removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.remove(id)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().subscriptions.len()
    }

    /// Current scheduler state.
    pub fn scheduler_state(&self) -> SchedulerState {
        self.shared.lock().scheduler_state()
    }

    /// Counters for monitoring.
    pub fn stats(&self) -> ManagerStats {
        let state = self.shared.lock();
        ManagerStats {
            subscribers: state.subscriptions.len(),
            ticks: self.shared.ticks.load(Ordering::Relaxed),
            scheduler: state.scheduler_state(),
        }
    }

    /// Copy of the current records.
    pub fn records(&self) -> Vec<StockRecord> {
        self.shared.lock().records.clone()
    }

    /// Copy of the current records as a price model.
    pub fn price_model(&self) -> PriceModel {
        PriceModel {
            pricelist: self.records(),
        }
    }
}

/// Unsubscribes its subscription on drop.
#[derive(Debug)]
pub struct SubscriptionGuard {
    shared: Weak<Shared>,
    id: SubscriptionId,
}

impl SubscriptionGuard {
    /// The guarded subscription's id.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.remove(self.id);
        }
    }
}

impl ManagerState {
    fn scheduler_state(&self) -> SchedulerState {
        if self.scheduler.is_some() {
            SchedulerState::Active
        } else {
            SchedulerState::Idle
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut state = self.lock();
        if state.subscriptions.remove(&id).is_none() {
            return false;
        }
        log::info!("Subscription {} removed ({} active)", id, state.subscriptions.len());

        if state.subscriptions.is_empty() && self.policy == SchedulerPolicy::StopWhenIdle {
            if let Some(handle) = state.scheduler.take() {
                handle.token.cancel();
                log::info!("No subscribers left, broadcast scheduler stopped");
            }
        }
        true
    }

    fn next_delay(&self) -> Duration {
        let seeded = self.seeded;
        let millis = self.lock().jitter.generate(seeded);
        Duration::from_millis(u64::try_from(millis).unwrap_or(0))
    }

    /// Picks a record, transforms it and pushes it to every subscriber
    /// present when the tick started.
    fn tick(&self, token: &CancellationToken) -> TickOutcome {
        let (symbol, frame, recipients) = {
            let mut state = self.lock();
            if token.is_cancelled() {
                return TickOutcome::Cancelled;
            }
            self.ticks.fetch_add(1, Ordering::Relaxed);

            if state.subscriptions.is_empty() || state.records.is_empty() {
                log::debug!("Tick with nothing to do, skipping update");
                return TickOutcome::Skipped;
            }

            let last = state.records.len() - 1;
            let drawn = state.picker.generate(self.seeded);
            let index = usize::try_from(drawn).unwrap_or(0).min(last);

            let current = &state.records[index];
            let transform = &self.transform;
            let updated = match panic::catch_unwind(AssertUnwindSafe(|| transform.transform(current))) {
                Ok(updated) => updated,
                Err(_) => {
                    log::error!("Price transform panicked on {}, record left unchanged", current.symbol);
                    return TickOutcome::Skipped;
                }
            };
            let frame = match encode_frame(&updated) {
                Ok(frame) => frame,
                Err(e) => {
                    log::error!("Failed to encode update for {}: {}", updated.symbol, e);
                    return TickOutcome::Skipped;
                }
            };
            let symbol = updated.symbol.clone();
            state.records[index] = updated;

            let recipients: Vec<Subscription> = state.subscriptions.values().cloned().collect();
            (symbol, frame, recipients)
        };

        log::debug!("New price update for {}, pushing to {} subscribers", symbol, recipients.len());
        self.fan_out(&frame, &recipients);
        TickOutcome::Delivered(recipients.len())
    }

    fn fan_out(&self, frame: &Bytes, recipients: &[Subscription]) {
        let mut closed = Vec::new();
        for subscription in recipients {
            let sent = panic::catch_unwind(AssertUnwindSafe(|| subscription.send_event(frame)))
                .unwrap_or_else(|_| Err(SinkError::Write("sink panicked".to_string())));
            if let Err(e) = sent {
                log::warn!("Failed to push update to subscription {}: {}", subscription.id(), e);
                if e == SinkError::Closed {
                    closed.push(subscription.id());
                }
            }
        }

        for id in closed {
            self.remove(id);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = state.scheduler.take() {
            handle.token.cancel();
        }
    }
}

fn start_scheduler(shared: &Arc<Shared>, state: &mut ManagerState, runtime: &Handle) {
    let epoch = state.next_epoch;
    state.next_epoch += 1;
    let token = CancellationToken::new();
    state.scheduler = Some(SchedulerHandle {
        epoch,
        token: token.clone(),
    });

    let exit = SchedulerExit {
        shared: Arc::downgrade(shared),
        epoch,
        finished: false,
    };
    runtime.spawn(run_scheduler(Arc::downgrade(shared), token, exit));
    log::info!("Broadcast scheduler started");
}

/// Lives inside the scheduler task. If the task goes away without finishing
/// normally (a panic, or the runtime dropping it) while it is still the
/// registered scheduler, the registration is cleared so the state reads
/// `Idle` and the next `subscribe` starts a new task.
struct SchedulerExit {
    shared: Weak<Shared>,
    epoch: u64,
    finished: bool,
}

impl Drop for SchedulerExit {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let Some(shared) = self.shared.upgrade() else { return };
        let mut state = shared.lock();
        if state.scheduler.as_ref().is_some_and(|handle| handle.epoch == self.epoch) {
            if let Some(handle) = state.scheduler.take() {
                handle.token.cancel();
            }
            log::error!("Broadcast scheduler task ended unexpectedly, marked idle");
        }
    }
}

/// The periodic task. Holds only a weak reference so it never keeps a
/// dropped manager alive.
async fn run_scheduler(shared: Weak<Shared>, token: CancellationToken, mut exit: SchedulerExit) {
    loop {
        let delay = match shared.upgrade() {
            Some(strong) => strong.next_delay(),
            None => break,
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let Some(strong) = shared.upgrade() else { break };
        if strong.tick(&token) == TickOutcome::Cancelled {
            break;
        }
    }
    exit.finished = true;
    log::debug!("Broadcast scheduler task exited");
}
