//! PoolManager (C5): the periodic controller invoked by the management
//! ticker. `tick` runs, in order: stopped check, rate limit, starvation
//! rescue, normal growth, queue extension, critical spawn, tuning
//! adjustment, clear `sawWork`.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use wpool_core::state::PoolState;
use wpool_core::{wdebug, winfo};

use crate::pool::PoolInner;

/// Ratio of queued items to live workers past which normal growth kicks in
/// ("workItemsPerWorker"): the common thread-pool heuristic of one extra
/// worker per couple of backlogged items per existing worker.
const WORK_ITEMS_PER_WORKER_HINT: u32 = 2;

/// Runs one management tick. Returns `false` to deregister the ticker
/// callback (the pool is `Stopped`).
pub(crate) fn tick(pool: &Arc<PoolInner>, elapsed: Duration) -> bool {
    // 1. Stopped check.
    if pool.state() == PoolState::Stopped {
        return false;
    }

    // 2. Rate limit.
    if elapsed < pool.options.management_period() {
        return true;
    }

    let snap = pool.census.snapshot();
    let queue_size = pool.queue.size() as u32;

    // 3. Starvation rescue.
    if snap.active == 0 && queue_size > 0 {
        pool.add_or_activate(1);
    }

    // 4. Normal growth.
    let mut growth_attempted = false;
    loop {
        let snap = pool.census.snapshot();
        if snap.active >= pool.reasonable_workers {
            break;
        }
        let bounded_full = match pool.queue.capacity() {
            Some(cap) => pool.queue.size() >= cap,
            None => false,
        };
        let over_ratio = pool.queue.size() as u32 > WORK_ITEMS_PER_WORKER_HINT * snap.total.max(1);
        if !(over_ratio || bounded_full) {
            break;
        }
        growth_attempted = true;
        if !pool.add_or_activate(pool.reasonable_workers) {
            break;
        }
    }

    // 5. Queue extension.
    let saw_work = pool.saw_work.swap(false, Ordering::AcqRel);
    if let Some(extended_cap) = pool.queue.capacity() {
        if !saw_work
            && pool.queue.size() >= extended_cap
            && pool.queue.extension() < pool.options.max_queue_extension
        {
            // Spec §4.5 step 5: `queue.extendCapacity(total + 1)`.
            let new_cap = pool.census.snapshot().total as usize + 1;
            if pool.queue.extend_capacity(new_cap) {
                winfo!(
                    "queue stalled with {} items queued; extended capacity to {}",
                    pool.queue.size(),
                    new_cap
                );
            }
        }
    }

    // 6. Critical spawn.
    let mut critical = false;
    let snap = pool.census.snapshot();
    if growth_attempted && snap.total >= pool.reasonable_workers {
        let running = pool.running_count.load(Ordering::Acquire);
        let stalled = running <= 1 || (!saw_work && running < pool.reasonable_workers);
        if stalled {
            critical = true;
            for _ in 0..2 {
                pool.add_or_activate(pool.max_workers);
            }
            wdebug!(
                "critical spawn: running={} total={} reasonable={}",
                running,
                pool.census.snapshot().total,
                pool.reasonable_workers
            );
        }
    }

    // 7. Tuning adjustment.
    let snap = pool.census.snapshot();
    let needs_adjustment = snap.total < pool.max_workers && pool.queue.size() > 0;
    let delta = pool
        .tracker
        .register_and_suggest(snap.active, needs_adjustment, critical);
    if delta > 0 {
        for _ in 0..delta {
            if !pool.add_or_activate(pool.max_workers) {
                break;
            }
        }
    } else if delta < 0 {
        for _ in 0..delta.unsigned_abs() {
            if !pool.census.dec_active(pool.reasonable_workers) {
                break;
            }
            pool.blocker.add_expected(1);
        }
    }

    true
}
