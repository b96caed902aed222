//! Work queue (C7): per-worker local queues + a global overflow queue with
//! steal-on-miss, backed by `crossbeam_queue`.
//!
//! Each worker gets a lock-free local `SegQueue`, backed by a shared global
//! overflow queue (`SegQueue` when unbounded, `ArrayQueue` when bounded).
//! `try_take` checks local queue, then global queue, then (if allowed) a
//! parked wait before one more global attempt — cross-worker local-to-local
//! stealing is intentionally left out in favour of this simpler contract.

use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

use crossbeam_queue::{ArrayQueue, SegQueue};

use wpool_core::cancel::CancellationToken;

enum GlobalQueue<T> {
    Unbounded(SegQueue<T>),
    Bounded(RwLock<Arc<ArrayQueue<T>>>),
}

/// The work queue shared by a pool and its workers.
///
/// `queue_capacity <= 0` at construction selects the unbounded variant,
/// disabling the capacity-extension path entirely.
pub struct WorkQueue<T> {
    global: GlobalQueue<T>,
    locals: Vec<SegQueue<T>>,
    base_capacity: usize,
    /// Guards the park/wake predicate — the approximate combined length of
    /// every local queue plus the global queue — together with `park_cond`,
    /// per the standard condvar discipline: every mutation of the
    /// predicate and every wait on it happens under this one lock, so a
    /// producer's increment-then-notify can never land in the gap between a
    /// parking worker's predicate check and its `wait` registering — that
    /// gap is exactly where a bare-atomic counter loses wakeups.
    park_lock: Mutex<usize>,
    park_cond: Condvar,
}

impl<T: Send + 'static> WorkQueue<T> {
    /// `capacity == None` creates an unbounded queue. `num_workers` sizes
    /// the local-queue array; worker ids outside that range fall back to
    /// the global queue only.
    pub fn new(num_workers: usize, capacity: Option<usize>) -> Self {
        let global = match capacity {
            Some(cap) => GlobalQueue::Bounded(RwLock::new(Arc::new(ArrayQueue::new(cap.max(1))))),
            None => GlobalQueue::Unbounded(SegQueue::new()),
        };
        Self {
            global,
            locals: (0..num_workers).map(|_| SegQueue::new()).collect(),
            base_capacity: capacity.unwrap_or(0),
            park_lock: Mutex::new(0),
            park_cond: Condvar::new(),
        }
    }

    /// Increment the length predicate and wake one parked waiter, both
    /// under `park_lock` so the wake can never be missed.
    fn inc_len_and_wake(&self) {
        let mut len = self.park_lock.lock().unwrap();
        *len += 1;
        self.park_cond.notify_one();
    }

    /// Decrement the length predicate under `park_lock`.
    fn dec_len(&self) {
        let mut len = self.park_lock.lock().unwrap();
        *len = len.saturating_sub(1);
    }

    /// Push to the global overflow queue. Returns the item back on a full
    /// bounded queue; an unbounded queue always accepts.
    fn push_global(&self, item: T) -> Option<T> {
        let rejected = match &self.global {
            GlobalQueue::Unbounded(q) => {
                q.push(item);
                None
            }
            GlobalQueue::Bounded(slot) => {
                let arr = slot.read().unwrap().clone();
                arr.push(item).err()
            }
        };
        if rejected.is_none() {
            self.inc_len_and_wake();
        }
        rejected
    }

    /// `tryAdd(item)` — non-blocking add honouring bounded capacity.
    pub fn try_add(&self, item: T) -> bool {
        self.push_global(item).is_none()
    }

    /// Like `try_add`, but on rejection (full bounded queue) hands the
    /// item back to the caller instead of dropping it, so a blocking
    /// `submit()` can retry the same item.
    pub fn try_add_return(&self, item: T) -> Option<T> {
        self.push_global(item)
    }

    /// Push with an optional worker hint; hinted items land in that
    /// worker's local queue (always succeeds — local queues are
    /// unbounded `SegQueue`s) and only fall back to the global queue if the
    /// hint is out of range.
    pub fn push_hint(&self, item: T, hint_worker: Option<usize>) {
        if let Some(w) = hint_worker {
            if let Some(local) = self.locals.get(w) {
                local.push(item);
                self.inc_len_and_wake();
                return;
            }
        }
        // Unbounded push for the no-hint / fast-spawn path: the queue is
        // logically unbounded from the local-queue side; only the global
        // overflow queue enforces `queueCapacity`.
        self.push_global(item);
    }

    fn pop_global(&self) -> Option<T> {
        let item = match &self.global {
            GlobalQueue::Unbounded(q) => q.pop(),
            GlobalQueue::Bounded(slot) => {
                let arr = slot.read().unwrap().clone();
                arr.pop()
            }
        };
        if item.is_some() {
            self.dec_len();
        }
        item
    }

    /// `tryTake(localCtx, timeout, cancel, stealAllowed)` — local queue
    /// first, then global, then (if `steal_allowed`) park for `timeout`
    /// before one more global attempt.
    pub fn try_take(
        &self,
        worker: usize,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
        steal_allowed: bool,
    ) -> Option<T> {
        if let Some(local) = self.locals.get(worker) {
            if let Some(item) = local.pop() {
                self.dec_len();
                return Some(item);
            }
        }
        if let Some(item) = self.pop_global() {
            return Some(item);
        }
        if !steal_allowed {
            return None;
        }
        self.park(timeout, cancel);
        self.pop_global()
    }

    /// Park until the length predicate is nonzero, `cancel` fires, or
    /// `timeout` elapses. The predicate is re-checked under `park_lock`
    /// after every wake (spurious or real), matching [`crate::tracker`]'s
    /// and [`wpool_core::blocker::PartialBlocker::wait`]'s wait/re-check
    /// loop shape.
    fn park(&self, timeout: Option<Duration>, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut len = self.park_lock.lock().unwrap();
        loop {
            if *len != 0 || cancel.is_cancelled() {
                return;
            }
            match deadline {
                None => {
                    len = self.park_cond.wait(len).unwrap();
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return;
                    }
                    let (guard, _timeout_result) =
                        self.park_cond.wait_timeout(len, deadline - now).unwrap();
                    len = guard;
                }
            }
        }
    }

    /// Wake every worker parked on the queue (used on pool shutdown).
    pub fn wake_all(&self) {
        let _guard = self.park_lock.lock().unwrap();
        self.park_cond.notify_all();
    }

    /// Approximate total size (local queues + global). A hint, not
    /// linearised against concurrent pushes/pops.
    pub fn size(&self) -> usize {
        *self.park_lock.lock().unwrap()
    }

    /// Configured capacity of the global queue, or `None` if unbounded.
    pub fn capacity(&self) -> Option<usize> {
        match &self.global {
            GlobalQueue::Unbounded(_) => None,
            GlobalQueue::Bounded(slot) => Some(slot.read().unwrap().capacity()),
        }
    }

    /// Current extension over the base capacity this queue was constructed
    /// with (0 for an unbounded queue, or one never extended).
    pub fn extension(&self) -> usize {
        match self.capacity() {
            Some(cap) => cap.saturating_sub(self.base_capacity),
            None => 0,
        }
    }

    /// `extendCapacity(n)` — reallocate a larger bounded `ArrayQueue` of
    /// capacity `n` and migrate items across. No-op (returns `false`) on an
    /// unbounded queue or if `n` does not grow the current capacity.
    pub fn extend_capacity(&self, n: usize) -> bool {
        let GlobalQueue::Bounded(slot) = &self.global else {
            return false;
        };
        let mut slot = slot.write().unwrap();
        if n <= slot.capacity() {
            return false;
        }
        let new_arr = ArrayQueue::new(n);
        while let Some(item) = slot.pop() {
            // capacity only grew, this cannot fail
            let _ = new_arr.push(item);
        }
        *slot = Arc::new(new_arr);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_hint_roundtrip() {
        let q: WorkQueue<u32> = WorkQueue::new(2, None);
        q.push_hint(10, Some(0));
        q.push_hint(20, Some(1));
        let cancel = CancellationToken::new();

        assert_eq!(q.try_take(0, Some(Duration::from_millis(10)), &cancel, false), Some(10));
        assert_eq!(q.try_take(1, Some(Duration::from_millis(10)), &cancel, false), Some(20));
    }

    #[test]
    fn test_global_fallback_and_steal() {
        let q: WorkQueue<u32> = WorkQueue::new(2, None);
        assert!(q.try_add(1));
        let cancel = CancellationToken::new();
        // worker 0's local queue is empty; falls through to global.
        assert_eq!(q.try_take(0, Some(Duration::from_millis(10)), &cancel, true), Some(1));
    }

    #[test]
    fn test_bounded_capacity_rejects_when_full() {
        let q: WorkQueue<u32> = WorkQueue::new(1, Some(2));
        assert!(q.try_add(1));
        assert!(q.try_add(2));
        assert!(!q.try_add(3), "bounded queue must reject once full");
    }

    #[test]
    fn test_extend_capacity_grows_and_preserves_items() {
        let q: WorkQueue<u32> = WorkQueue::new(1, Some(2));
        q.try_add(1);
        q.try_add(2);
        assert!(q.extend_capacity(4));
        assert_eq!(q.capacity(), Some(4));
        assert!(q.try_add(3));
        let cancel = CancellationToken::new();
        let mut seen = Vec::new();
        while let Some(v) = q.try_take(0, Some(Duration::from_millis(1)), &cancel, false) {
            seen.push(v);
        }
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_try_take_times_out_with_no_work() {
        let q: WorkQueue<u32> = WorkQueue::new(1, None);
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let item = q.try_take(0, Some(Duration::from_millis(30)), &cancel, true);
        assert!(item.is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_infinite_park_wakes_on_later_push() {
        // Regression test: a worker parked with no timeout (the shape
        // `trim_period() == None` takes when trimming is disabled) must
        // still be woken by a push that lands after the worker has checked
        // the predicate and is about to wait, not just one that lands
        // before. A push racing the checkpoint-vs-wait window must never be
        // a lost wakeup.
        use std::sync::Arc;
        use std::thread;

        let q: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::new(1, None));
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        let q2 = Arc::clone(&q);

        let handle = thread::spawn(move || q2.try_take(0, None, &cancel2, true));

        // Give the taker a chance to reach the park predicate check before
        // the item is pushed, matching the tight race the lost-wakeup bug
        // depended on.
        thread::sleep(Duration::from_millis(20));
        assert!(q.try_add(7));

        let result = handle.join().unwrap();
        assert_eq!(result, Some(7), "push after park must still be observed, not lost");
    }
}
