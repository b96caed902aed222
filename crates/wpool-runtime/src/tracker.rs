//! Throughput tracker (C3): observes completed work per interval and
//! suggests a bounded ±Δ change to the active-worker count.
//!
//! `register_execution` is the hot path (called once per completed work
//! item, from any worker thread) and is a single relaxed counter bump.
//! `register_and_suggest` is called once per management tick and does the
//! actual direction heuristic under a small mutex — tick frequency is
//! `management_period_ms`-bounded, so this is never contended with the hot
//! path in practice.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

struct History {
    /// Completions observed during the previous tick's interval.
    last_interval_completions: u64,
    /// Sign of the last Δ actually applied: -1, 0, or +1.
    last_delta_sign: i8,
    /// Ticks remaining to hold before a direction reversal is allowed.
    hold_ticks: u8,
}

/// Per-pool completion counter plus the growth/shrink direction heuristic.
pub struct ThroughputTracker {
    completions_since_tick: AtomicU64,
    history: Mutex<History>,
    min_workers: u32,
    max_workers: u32,
}

impl ThroughputTracker {
    pub fn new(min_workers: u32, max_workers: u32) -> Self {
        Self {
            completions_since_tick: AtomicU64::new(0),
            history: Mutex::new(History {
                last_interval_completions: 0,
                last_delta_sign: 0,
                hold_ticks: 0,
            }),
            min_workers,
            max_workers,
        }
    }

    /// Called by a worker on every completed work item.
    #[inline]
    pub fn register_execution(&self) {
        self.completions_since_tick.fetch_add(1, Ordering::Relaxed);
    }

    /// Called once per management tick. `critical` forces immediate growth
    /// regardless of history; otherwise the interval throughput is compared
    /// against the previous interval to decide a direction.
    pub fn register_and_suggest(
        &self,
        current_active: u32,
        needs_adjustment: bool,
        critical: bool,
    ) -> i32 {
        let interval_completions = self.completions_since_tick.swap(0, Ordering::AcqRel);

        if critical {
            let delta = if current_active == 0 { 2 } else { 1 };
            let mut history = self.history.lock().unwrap();
            history.last_interval_completions = interval_completions;
            history.last_delta_sign = 1;
            history.hold_ticks = 0;
            return self.clamp(current_active, delta);
        }

        let mut history = self.history.lock().unwrap();

        if !needs_adjustment {
            history.last_interval_completions = interval_completions;
            return 0;
        }

        let proposed_sign: i8 = if interval_completions > history.last_interval_completions {
            1
        } else if interval_completions < history.last_interval_completions {
            -1
        } else {
            0
        };

        let reversal = proposed_sign != 0
            && history.last_delta_sign != 0
            && proposed_sign != history.last_delta_sign;

        let delta = if reversal && history.hold_ticks == 0 {
            // Dampen oscillation: hold one tick before accepting a reversal.
            history.hold_ticks = 1;
            0
        } else {
            if history.hold_ticks > 0 {
                history.hold_ticks -= 1;
            }
            if proposed_sign != 0 {
                history.last_delta_sign = proposed_sign;
            }
            proposed_sign as i32
        };

        history.last_interval_completions = interval_completions;
        self.clamp(current_active, delta)
    }

    fn clamp(&self, current_active: u32, delta: i32) -> i32 {
        let proposed = current_active as i64 + delta as i64;
        let clamped = proposed.clamp(self.min_workers as i64, self.max_workers as i64);
        (clamped - current_active as i64) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_from_zero_requests_two() {
        let t = ThroughputTracker::new(0, 8);
        assert_eq!(t.register_and_suggest(0, true, true), 2);
    }

    #[test]
    fn test_critical_nonzero_requests_one() {
        let t = ThroughputTracker::new(0, 8);
        assert_eq!(t.register_and_suggest(3, true, true), 1);
    }

    #[test]
    fn test_no_adjustment_returns_zero() {
        let t = ThroughputTracker::new(0, 8);
        for _ in 0..10 {
            t.register_execution();
        }
        assert_eq!(t.register_and_suggest(2, false, false), 0);
    }

    #[test]
    fn test_clamped_to_max_workers() {
        let t = ThroughputTracker::new(0, 4);
        // Force a positive direction: rising throughput between ticks.
        for _ in 0..5 {
            t.register_execution();
        }
        t.register_and_suggest(4, true, false); // seeds last_interval_completions
        for _ in 0..10 {
            t.register_execution();
        }
        let delta = t.register_and_suggest(4, true, false);
        assert!(4 + delta <= 4);
    }

    #[test]
    fn test_clamped_to_min_workers() {
        let t = ThroughputTracker::new(2, 8);
        let delta = t.register_and_suggest(2, true, false);
        assert!(2 + delta >= 2);
    }

    #[test]
    fn test_reversal_is_held_for_one_tick() {
        let t = ThroughputTracker::new(0, 16);

        // Establish a rising interval so the tracker locks in a +1 direction.
        for _ in 0..10 {
            t.register_execution();
        }
        let d1 = t.register_and_suggest(4, true, false);
        assert_eq!(d1, 1);

        // Next interval has fewer completions -> proposes a reversal to -1,
        // which must be held (delta 0) for exactly one tick.
        let d2 = t.register_and_suggest(5, true, false);
        assert_eq!(d2, 0);

        // The tick after the hold is free to apply the reversal.
        let d3 = t.register_and_suggest(5, true, false);
        assert!(d3 <= 0);
    }

    proptest::proptest! {
        #[test]
        fn prop_delta_keeps_active_in_bounds(
            active in 0u32..20,
            completions in proptest::collection::vec(0u32..50, 0..30),
        ) {
            let t = ThroughputTracker::new(2, 16);
            let mut current = active.clamp(2, 16);
            for c in completions {
                for _ in 0..c {
                    t.register_execution();
                }
                let delta = t.register_and_suggest(current, true, false);
                let next = current as i64 + delta as i64;
                prop_assert!(next >= 2 && next <= 16);
                current = next as u32;
            }
        }
    }
}
