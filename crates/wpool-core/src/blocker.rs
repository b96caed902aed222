//! Partial blocker: a gated park/release primitive.
//!
//! Generalizes a Condvar-based fallback-parking scheme (a single
//! pending-wake flag) into a counted gate: `addExpected(n)` records that
//! `n` more workers are about to park, `subExpected(n)` both lowers that
//! count and releases exactly `n` currently-parked workers (or banks the
//! release for the next `wait()` call if fewer than `n` are parked right
//! now — callers re-check demand on every wake, so a banked release simply
//! lets that next `wait()` return immediately instead of blocking).

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::cancel::CancellationToken;

struct Inner {
    /// `expected_parked` — how many workers the manager currently intends
    /// to keep parked.
    demand: u32,
    /// Release signals banked by `sub_expected` that have not yet been
    /// claimed by a `wait()` call.
    permits: u32,
}

/// A counting gate that parks up to `demand` threads and releases them on
/// demand, exactly `n` at a time.
pub struct PartialBlocker {
    inner: Mutex<Inner>,
    condvar: Condvar,
}

impl PartialBlocker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                demand: 0,
                permits: 0,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Current value of the `expected_parked` gauge (hint).
    pub fn expected_parked(&self) -> u32 {
        self.inner.lock().unwrap().demand
    }

    /// `addExpected(n)` — schedule `n` additional parked workers. Does not
    /// wake anyone; it only raises the demand gauge that `wait()` honours.
    pub fn add_expected(&self, n: u32) {
        if n == 0 {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.demand = inner.demand.saturating_add(n);
    }

    /// `subExpected(n)` — lower demand by `n` and release exactly `n`
    /// parked workers (banking the release if fewer than `n` are currently
    /// waiting).
    pub fn sub_expected(&self, n: u32) {
        if n == 0 {
            return;
        }
        {
            let mut inner = self.inner.lock().unwrap();
            inner.demand = inner.demand.saturating_sub(n);
            inner.permits = inner.permits.saturating_add(n);
        }
        self.condvar.notify_all();
    }

    /// Block the caller while there is no banked release for it, honouring
    /// `timeout` (`None` = infinite) and `cancel`. Returns `true` if a
    /// release was observed and claimed, `false` on timeout or
    /// cancellation. Spurious wake-ups are possible; callers that get
    /// `false` back should re-check whether they still need to park.
    pub fn wait(&self, timeout: Option<Duration>, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.permits > 0 {
                inner.permits -= 1;
                return true;
            }
            if cancel.is_cancelled() {
                return false;
            }
            match deadline {
                None => {
                    inner = self.condvar.wait(inner).unwrap();
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (guard, timeout_result) =
                        self.condvar.wait_timeout(inner, deadline - now).unwrap();
                    inner = guard;
                    if timeout_result.timed_out() && inner.permits == 0 {
                        return false;
                    }
                }
            }
        }
    }

    /// Force every current waiter to wake and re-check (used on shutdown,
    /// alongside cancelling the shared [`CancellationToken`]).
    pub fn wake_all(&self) {
        self.condvar.notify_all();
    }
}

impl Default for PartialBlocker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_times_out_without_release() {
        let b = PartialBlocker::new();
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let woke = b.wait(Some(Duration::from_millis(30)), &cancel);
        assert!(!woke);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_sub_expected_releases_exactly_one_of_many() {
        let b = Arc::new(PartialBlocker::new());
        let cancel = CancellationToken::new();
        b.add_expected(3);

        let mut handles = Vec::new();
        for _ in 0..3 {
            let b = Arc::clone(&b);
            let cancel = cancel.clone();
            handles.push(thread::spawn(move || {
                b.wait(Some(Duration::from_millis(400)), &cancel)
            }));
        }

        thread::sleep(Duration::from_millis(50));
        b.sub_expected(1);

        let woke: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&released| released)
            .count();
        assert_eq!(woke, 1, "subExpected(1) must release exactly one waiter");
    }

    #[test]
    fn test_cancel_unblocks_immediately() {
        let b = Arc::new(PartialBlocker::new());
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        let b2 = Arc::clone(&b);
        let handle = thread::spawn(move || b2.wait(Some(Duration::from_secs(30)), &cancel2));

        thread::sleep(Duration::from_millis(30));
        cancel.cancel();
        b.wake_all();

        let woke = handle.join().unwrap();
        assert!(!woke);
    }

    #[test]
    fn test_expected_parked_gauge() {
        let b = PartialBlocker::new();
        b.add_expected(2);
        assert_eq!(b.expected_parked(), 2);
        b.sub_expected(1);
        assert_eq!(b.expected_parked(), 1);
    }
}
