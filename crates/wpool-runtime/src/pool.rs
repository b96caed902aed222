//! Lifecycle (C6) and the public pool surface.
//!
//! `PoolInner` is the single owned record of a pool's shared state: the
//! census, blocker, tracker, queue, cancellation token, management ticker,
//! and the set of live worker handles. Workers hold a plain `Arc` clone
//! back to it (not a cycle: the pool's own handle to a worker is a
//! `JoinHandle`, not a reference-counted pointer, so nothing points back
//! through `PoolInner` at itself). The management ticker's callback closure
//! holds only a `Weak` reference — a non-owning callback deregistered on
//! `Stopped` — so the ticker thread notices the pool is gone and stops on
//! its own if `stop()` was never called.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wpool_core::{wwarn, CancellationToken, Census, PartialBlocker};
use wpool_core::error::{PoolError, PoolResult};
use wpool_core::state::PoolState;

use crate::queue::WorkQueue;
use crate::ticker::ManagementTicker;
use crate::tracker::ThroughputTracker;

/// A unit of work submitted to the pool.
pub type WorkItem = Box<dyn FnOnce() + Send + 'static>;

/// Recognised construction options.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Idle time after which a surplus worker may self-retire. Negative
    /// disables trimming (workers never retire below `min_workers` purely
    /// from idleness). Default 300_000 (5 minutes).
    pub trim_period_ms: i64,
    /// Timeout for the short poll issued once a worker's local view of
    /// `active` exceeds `reasonable_workers`. Default 2_000.
    pub steal_awake_period_ms: u64,
    /// Maximum cumulative growth of a bounded queue's capacity over its
    /// base capacity. Default 256.
    pub max_queue_extension: usize,
    /// Minimum spacing between management ticks. Default 500.
    pub management_period_ms: u64,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            trim_period_ms: wpool_core::env_get("WPOOL_TRIM_PERIOD_MS", 300_000),
            steal_awake_period_ms: wpool_core::env_get("WPOOL_STEAL_AWAKE_PERIOD_MS", 2_000),
            max_queue_extension: wpool_core::env_get("WPOOL_MAX_QUEUE_EXTENSION", 256),
            management_period_ms: wpool_core::env_get("WPOOL_MANAGEMENT_PERIOD_MS", 500),
        }
    }
}

impl PoolOptions {
    pub(crate) fn trim_period(&self) -> Option<Duration> {
        if self.trim_period_ms < 0 {
            None
        } else {
            Some(Duration::from_millis(self.trim_period_ms as u64))
        }
    }

    pub(crate) fn steal_awake_period(&self) -> Duration {
        Duration::from_millis(self.steal_awake_period_ms)
    }

    pub(crate) fn management_period(&self) -> Duration {
        Duration::from_millis(self.management_period_ms)
    }

    fn validate(&self) -> PoolResult<()> {
        if self.management_period_ms == 0 {
            return Err(PoolError::InvalidArgument(
                "management_period_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(0);

pub(crate) struct PoolInner {
    pub(crate) pool_id: u32,
    pub(crate) name: String,
    pub(crate) is_daemon: bool,
    pub(crate) min_workers: u32,
    pub(crate) max_workers: u32,
    /// Preferred steady-state ceiling ("reasonable workers", default ≈
    /// `processor_count`, clamped into `[min_workers, max_workers]`).
    pub(crate) reasonable_workers: u32,
    /// Ceiling below which submission-time fast-spawn is attempted.
    pub(crate) fast_spawn_limit: u32,
    pub(crate) options: PoolOptions,

    pub(crate) census: Census,
    pub(crate) blocker: PartialBlocker,
    pub(crate) tracker: ThroughputTracker,
    pub(crate) queue: WorkQueue<WorkItem>,
    pub(crate) cancel: CancellationToken,

    pub(crate) state: AtomicU8,
    /// Set by a worker whenever it completes a work item since the last
    /// management tick was cleared; read and reset by the manager.
    pub(crate) saw_work: AtomicBool,
    /// Workers currently inside `run()`, a portable approximation of
    /// "OS-level running" on platforms with no cheap native equivalent.
    pub(crate) running_count: AtomicU32,
    /// Whether items still queued at `stop()` time should be executed
    /// (`true`) or dropped uncalled (`false`).
    pub(crate) let_finish: AtomicBool,

    pub(crate) next_worker_id: AtomicU32,
    pub(crate) workers: Mutex<Vec<JoinHandle<()>>>,
    pub(crate) ticker: Mutex<Option<ManagementTicker>>,
}

impl PoolInner {
    fn reasonable_and_fast_spawn(min_workers: u32, max_workers: u32) -> (u32, u32) {
        let cpus = thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1);
        let reasonable = cpus.clamp(min_workers.max(1), max_workers);
        let fast_spawn = (cpus / 2).max(1).clamp(min_workers.max(1), max_workers);
        (reasonable, fast_spawn)
    }

    /// `addOrActivate(cap)`: cheap unpark first, full spawn on failure.
    /// Returns whether a worker became (or already was about to become)
    /// active.
    pub(crate) fn add_or_activate(self: &Arc<Self>, cap: u32) -> bool {
        if self.census.inc_active() {
            // Census updated before the blocker releases the parked
            // worker, so a spuriously-woken waiter always sees accurate
            // demand on re-check.
            self.blocker.sub_expected(1);
            return true;
        }
        if self.census.inc_total(cap) {
            if self.spawn_worker().is_err() {
                self.census.dec_total(0);
                return false;
            }
            return true;
        }
        false
    }

    fn spawn_worker(self: &Arc<Self>) -> std::io::Result<()> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let pool = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(format!("{}-{id}", self.name))
            .spawn(move || crate::worker_loop::run(pool, id))?;
        self.workers.lock().unwrap().push(handle);
        Ok(())
    }

    /// `maybeSpawn()` — fast-spawn on enqueue.
    pub(crate) fn maybe_spawn(self: &Arc<Self>) {
        let active = self.census.snapshot().active;
        let queue_size = self.queue.size() as u32;
        if active < self.fast_spawn_limit && active < queue_size.saturating_add(2) {
            self.add_or_activate(self.fast_spawn_limit);
        }
    }

    pub(crate) fn set_state(&self, state: PoolState) {
        self.state.store(u8::from(state), Ordering::Release);
    }

    pub(crate) fn state(&self) -> PoolState {
        PoolState::from(self.state.load(Ordering::Acquire))
    }
}

/// A self-tuning worker pool.
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// `new(minWorkers, maxWorkers, queueCapacity, name, isDaemon, options)`.
    ///
    /// `queue_capacity = None` constructs an unbounded queue, disabling the
    /// queue-capacity growth/extension triggers.
    pub fn new(
        min_workers: u32,
        max_workers: u32,
        queue_capacity: Option<usize>,
        name: impl Into<String>,
        is_daemon: bool,
        options: PoolOptions,
    ) -> PoolResult<Self> {
        if max_workers < 1 || max_workers > wpool_core::constants::MAX_WORKERS {
            return Err(PoolError::InvalidArgument(format!(
                "max_workers must be in [1, {}], got {max_workers}",
                wpool_core::constants::MAX_WORKERS
            )));
        }
        if max_workers < min_workers {
            return Err(PoolError::InvalidArgument(
                "max_workers must be >= min_workers".into(),
            ));
        }
        options.validate()?;

        let (reasonable_workers, fast_spawn_limit) =
            PoolInner::reasonable_and_fast_spawn(min_workers, max_workers);

        let inner = Arc::new(PoolInner {
            pool_id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            is_daemon,
            min_workers,
            max_workers,
            reasonable_workers,
            fast_spawn_limit,
            census: Census::new(max_workers),
            blocker: PartialBlocker::new(),
            tracker: ThroughputTracker::new(min_workers, max_workers),
            queue: WorkQueue::new(max_workers as usize, queue_capacity),
            cancel: CancellationToken::new(),
            state: AtomicU8::new(u8::from(PoolState::Created)),
            saw_work: AtomicBool::new(false),
            running_count: AtomicU32::new(0),
            let_finish: AtomicBool::new(true),
            next_worker_id: AtomicU32::new(0),
            workers: Mutex::new(Vec::new()),
            ticker: Mutex::new(None),
            options,
        });

        Ok(Self { inner })
    }

    /// `min_workers` (read-only).
    pub fn min_workers(&self) -> u32 {
        self.inner.min_workers
    }

    /// `max_workers` (read-only).
    pub fn max_workers(&self) -> u32 {
        self.inner.max_workers
    }

    /// `active_workers` (read-only).
    pub fn active_workers(&self) -> u32 {
        self.inner.census.snapshot().active
    }

    /// Total workers currently tracked (active + parked).
    pub fn total_workers(&self) -> u32 {
        self.inner.census.snapshot().total
    }

    /// Approximate queue depth.
    pub fn queue_size(&self) -> usize {
        self.inner.queue.size()
    }

    /// `Created -> Running`: starts the management ticker and prewarms to
    /// `min_workers`. A no-op if the pool is already running or past it.
    pub fn start(&self) {
        if self.inner.state() != PoolState::Created {
            return;
        }
        self.inner.set_state(PoolState::Running);
        self.start_ticker();
        self.prewarm(self.inner.min_workers);
    }

    fn start_ticker(&self) {
        let period = self.inner.options.management_period();
        let ticker = ManagementTicker::start(&self.inner.name, period);
        let weak: Weak<PoolInner> = Arc::downgrade(&self.inner);
        ticker.register(move |elapsed: Duration| match weak.upgrade() {
            Some(pool) => crate::manager::tick(&pool, elapsed),
            None => false,
        });
        *self.inner.ticker.lock().unwrap() = Some(ticker);
    }

    /// `prewarm(n)`: repeatedly `addOrActivate` until at least `n` workers
    /// are tracked (bounded by `max_workers`).
    pub fn prewarm(&self, n: u32) {
        let target = n.min(self.inner.max_workers);
        while self.inner.census.snapshot().total < target {
            if !self.inner.add_or_activate(self.inner.max_workers) {
                break;
            }
        }
    }

    /// `submit(item)`: like `try_submit`, but a full bounded queue blocks
    /// the caller (briefly backing off and retrying the same item) instead
    /// of rejecting outright. Returns `Closed` once `stop()` has been
    /// called, or if it closes while this call is backing off.
    pub fn submit(&self, item: impl FnOnce() + Send + 'static) -> PoolResult<()> {
        let mut boxed: WorkItem = Box::new(item);
        loop {
            if self.inner.state() == PoolState::Created {
                self.start();
            }
            if !self.inner.state().accepts_submissions() {
                return Err(PoolError::Closed);
            }
            match self.inner.queue.try_add_return(boxed) {
                None => {
                    self.inner.maybe_spawn();
                    return Ok(());
                }
                Some(rejected) => {
                    boxed = rejected;
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }

    /// `trySubmit(item) -> bool`: never blocks. `false` on a closed pool or
    /// a full bounded queue — never raised as an error.
    pub fn try_submit(&self, item: impl FnOnce() + Send + 'static) -> bool {
        if self.inner.state() == PoolState::Created {
            self.start();
        }
        if !self.inner.state().accepts_submissions() {
            return false;
        }
        let boxed: WorkItem = Box::new(item);
        if self.inner.queue.try_add_return(boxed).is_some() {
            return false;
        }
        self.inner.maybe_spawn();
        true
    }

    /// `stop(letFinish)`: `Running -> StopRequested -> Stopped`. Cancels
    /// every worker, joins all worker handles, and (per `let_finish`)
    /// either drains remaining queued items by running them or drops them
    /// uncalled. Idempotent.
    pub fn stop(&self, let_finish: bool) {
        let prior = self.inner.state();
        if prior == PoolState::Stopped {
            return;
        }
        self.inner.let_finish.store(let_finish, Ordering::Release);
        self.inner.set_state(PoolState::StopRequested);
        self.inner.cancel.cancel();
        self.inner.blocker.wake_all();
        self.inner.queue.wake_all();

        if let Some(mut ticker) = self.inner.ticker.lock().unwrap().take() {
            ticker.shutdown();
            ticker.join();
        }

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.workers.lock().unwrap());
        for h in handles {
            if h.join().is_err() {
                wwarn!("worker thread panicked during join");
            }
        }

        self.inner.set_state(PoolState::Stopped);
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if self.inner.state() != PoolState::Stopped {
            self.stop(self.inner.let_finish.load(Ordering::Acquire));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::time::Instant;

    #[test]
    fn test_validation_rejects_bad_max_workers() {
        assert!(Pool::new(0, 0, None, "t", false, PoolOptions::default()).is_err());
        assert!(Pool::new(2, 1, None, "t", false, PoolOptions::default()).is_err());
        assert!(Pool::new(0, wpool_core::constants::MAX_WORKERS + 1, None, "t", false, PoolOptions::default()).is_err());
    }

    #[test]
    fn test_max_workers_at_census_ceiling_is_accepted() {
        // 4095 is representable in the census's 12-bit `total` field and is
        // spec-legal (`maxWorkers ∈ [1, 4095]`); only values past it must
        // be rejected.
        assert!(Pool::new(0, wpool_core::constants::MAX_WORKERS, None, "t", false, PoolOptions::default()).is_ok());
    }

    #[test]
    fn test_scenario_one_item_scales_up_then_trims() {
        let opts = PoolOptions {
            trim_period_ms: 200,
            ..PoolOptions::default()
        };
        let pool = Pool::new(0, 4, None, "t1", false, opts).unwrap();
        pool.start();
        let done = Arc::new(AtomicBool::new(false));
        let d = Arc::clone(&done);
        pool.submit(move || {
            thread::sleep(Duration::from_millis(50));
            d.store(true, Ordering::SeqCst);
        })
        .unwrap();

        let start = Instant::now();
        while !done.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(done.load(Ordering::SeqCst));
        pool.stop(true);
    }

    #[test]
    fn test_scenario_many_items_peak_bounded_by_max() {
        let pool = Pool::new(0, 8, None, "t2", false, PoolOptions::default()).unwrap();
        pool.start();
        let completed = Arc::new(AtomicU64::new(0));
        for _ in 0..1000 {
            let c = Arc::clone(&completed);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(1));
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        let start = Instant::now();
        while completed.load(Ordering::SeqCst) < 1000 && start.elapsed() < Duration::from_secs(10) {
            thread::sleep(Duration::from_millis(10));
            assert!(pool.total_workers() <= 8);
        }
        assert_eq!(completed.load(Ordering::SeqCst), 1000);
        pool.stop(true);
    }

    #[test]
    fn test_scenario_stop_let_finish_runs_everything() {
        let pool = Pool::new(2, 2, None, "t3", false, PoolOptions::default()).unwrap();
        pool.start();
        let completed = Arc::new(AtomicU64::new(0));
        for _ in 0..100 {
            let c = Arc::clone(&completed);
            pool.submit(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.stop(true);
        assert_eq!(completed.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_stop_without_let_finish_drops_remaining_but_closes() {
        let pool = Pool::new(1, 1, None, "t4", false, PoolOptions::default()).unwrap();
        pool.start();
        for _ in 0..20 {
            let _ = pool.submit(|| {
                thread::sleep(Duration::from_millis(10));
            });
        }
        pool.stop(false);
        assert!(!pool.try_submit(|| {}), "submissions after stop must be rejected");
    }

    #[test]
    fn test_trim_disabled_keeps_workers() {
        let opts = PoolOptions {
            trim_period_ms: -1,
            ..PoolOptions::default()
        };
        let pool = Pool::new(0, 2, None, "t5", false, opts).unwrap();
        pool.start();
        pool.submit(|| thread::sleep(Duration::from_millis(20))).unwrap();
        pool.submit(|| thread::sleep(Duration::from_millis(20))).unwrap();
        thread::sleep(Duration::from_millis(300));
        // With trimming disabled workers never self-retire from idleness;
        // total should not have dropped below what was spawned to serve
        // the two items.
        assert!(pool.total_workers() >= 1);
        pool.stop(true);
    }
}
