//! WorkerLoop (C4): per-thread state machine.
//!
//! ```text
//! Idle-Parked --(blocker released)--> Polling
//! Polling     --(timeout, die slot claimed)--> Retiring
//! Polling     --(timeout, no slot)--> Idle-Parked
//! Polling     --(item taken)--> Running
//! Running     --(item done)--> Polling
//! any state   --(cancel)--> drain/discard then exit
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use wpool_core::state::WorkerLoopState;
use wpool_core::{kprint, werror, wtrace};

use crate::pool::{PoolInner, WorkItem};

/// Entry point run on a dedicated OS thread, one per live worker.
pub(crate) fn run(pool: Arc<PoolInner>, id: u32) {
    kprint::set_pool_id(pool.pool_id);
    kprint::set_worker_id(id);
    let worker_index = (id as usize) % pool.max_workers.max(1) as usize;

    let mut state = WorkerLoopState::IdleParked;
    loop {
        if pool.cancel.is_cancelled() {
            drain_and_exit(&pool, worker_index);
            return;
        }
        state = match state {
            WorkerLoopState::IdleParked => match park_wait(&pool) {
                ParkOutcome::Released => WorkerLoopState::Polling,
                ParkOutcome::Retire => {
                    retire(&pool);
                    kprint::clear_pool_id();
                    kprint::clear_worker_id();
                    return;
                }
                ParkOutcome::ResumePolling => WorkerLoopState::Polling,
                ParkOutcome::Cancelled => {
                    drain_and_exit(&pool, worker_index);
                    return;
                }
            },
            WorkerLoopState::Polling => poll(&pool, worker_index),
            WorkerLoopState::Running => unreachable!("poll() resolves Running synchronously"),
            WorkerLoopState::Retiring => unreachable!("handled inline in park_wait"),
        };
    }
}

enum ParkOutcome {
    Released,
    Retire,
    ResumePolling,
    Cancelled,
}

/// Step 1, "Park wait": `blocker.wait(trimPeriod)`.
fn park_wait(pool: &PoolInner) -> ParkOutcome {
    let woke = pool.blocker.wait(pool.options.trim_period(), &pool.cancel);
    if pool.cancel.is_cancelled() {
        return ParkOutcome::Cancelled;
    }
    if woke {
        return ParkOutcome::Released;
    }
    // Timed out with no parking demand placed on us.
    if pool.census.request_die_slot(pool.min_workers, pool.max_workers) {
        ParkOutcome::Retire
    } else {
        pool.census.inc_active(); // no-op if already active
        ParkOutcome::ResumePolling
    }
}

/// Step 2, "Poll": non-blocking `tryTake`, then a long or short poll on
/// miss depending on how many workers are currently active.
fn poll(pool: &Arc<PoolInner>, worker_index: usize) -> WorkerLoopState {
    if let Some(item) = pool.queue.try_take(worker_index, None, &pool.cancel, false) {
        run_item(pool, item);
        return WorkerLoopState::Polling;
    }

    let seen_active = pool.census.snapshot().active;
    let long_poll = seen_active <= pool.reasonable_workers;
    let timeout = if long_poll {
        pool.options.trim_period()
    } else {
        Some(pool.options.steal_awake_period())
    };

    match pool.queue.try_take(worker_index, timeout, &pool.cancel, true) {
        Some(item) => {
            run_item(pool, item);
            WorkerLoopState::Polling
        }
        None => {
            if pool.cancel.is_cancelled() {
                return WorkerLoopState::Polling; // outer loop observes cancellation next
            }
            if !long_poll {
                let floor = if seen_active > pool.reasonable_workers {
                    pool.reasonable_workers
                } else if pool.census.snapshot().total > pool.fast_spawn_limit {
                    pool.fast_spawn_limit
                } else {
                    pool.min_workers
                };
                if pool.census.dec_active(floor) {
                    pool.blocker.add_expected(1);
                }
            }
            WorkerLoopState::IdleParked
        }
    }
}

/// Step 3, "Run": execute the item, registering completion with the
/// throughput tracker and the running-worker approximation counter.
fn run_item(pool: &Arc<PoolInner>, item: WorkItem) {
    pool.running_count.fetch_add(1, Ordering::AcqRel);
    let result = panic::catch_unwind(AssertUnwindSafe(item));
    pool.running_count.fetch_sub(1, Ordering::AcqRel);
    if let Err(payload) = result {
        werror!("work item panicked: {}", panic_message(&payload));
    }
    pool.tracker.register_execution();
    pool.saw_work.store(true, Ordering::Release);
    wtrace!("worker completed item");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Step 4, "Shutdown drain": run or discard whatever is left in the queue,
/// per the pool's `let_finish` policy, then retire.
fn drain_and_exit(pool: &Arc<PoolInner>, worker_index: usize) {
    let let_finish = pool.let_finish.load(Ordering::Acquire);
    while let Some(item) = pool.queue.try_take(worker_index, None, &pool.cancel, false) {
        if let_finish {
            run_item(pool, item);
        }
        // else: drop the item uncalled (cancelled-shutdown draining).
    }
    retire(pool);
}

fn retire(pool: &PoolInner) {
    pool.census.retire_cascade();
    wtrace!("worker retired");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Pool, PoolOptions};
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_panic_in_item_does_not_kill_pool() {
        let pool = Pool::new(1, 1, None, "wl1", false, PoolOptions::default()).unwrap();
        pool.start();
        pool.submit(|| panic!("boom")).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&done);
        pool.submit(move || {
            d.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let start = std::time::Instant::now();
        while done.load(Ordering::SeqCst) == 0 && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(done.load(Ordering::SeqCst), 1);
        pool.stop(true);
    }
}
