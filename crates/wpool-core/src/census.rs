//! Packed atomic worker census.
//!
//! A single `AtomicU32` partitioned into three bitfields:
//!
//! ```text
//! bits [0..12)  total      — workers tracked by the pool (active + parked)
//! bits [12..24) active     — workers eligible to run (not parked)
//! bits [24..32) die_slots  — outstanding self-retirement permissions
//! ```
//!
//! Every mutator is a bounded-backoff compare-and-swap over the packed word
//! so the four cross-field invariants (see module docs on [`Census`]) hold
//! at every observable instant without taking a lock.

use core::sync::atomic::{AtomicU32, Ordering};

/// `total` occupies the low 12 bits: up to 4095 workers.
const TOTAL_BITS: u32 = 12;
const ACTIVE_BITS: u32 = 12;
const DIE_SLOTS_BITS: u32 = 8;

const TOTAL_MASK: u32 = (1 << TOTAL_BITS) - 1;
const ACTIVE_MASK: u32 = (1 << ACTIVE_BITS) - 1;
const DIE_SLOTS_MASK: u32 = (1 << DIE_SLOTS_BITS) - 1;

const ACTIVE_SHIFT: u32 = TOTAL_BITS;
const DIE_SLOTS_SHIFT: u32 = TOTAL_BITS + ACTIVE_BITS;

/// Ceiling enforced on `total` regardless of any caller-supplied cap:
/// the field only has 12 bits of storage.
pub const MAX_TOTAL: u32 = TOTAL_MASK;

/// Ceiling on `die_slots`: the field only has 8 bits of storage.
pub const MAX_DIE_SLOTS: u32 = DIE_SLOTS_MASK;

/// A point-in-time read of the packed word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CensusSnapshot {
    pub total: u32,
    pub active: u32,
    pub die_slots: u32,
}

impl CensusSnapshot {
    #[inline]
    pub const fn parked(&self) -> u32 {
        self.total - self.active
    }

    #[inline]
    pub const fn projected_alive(&self) -> u32 {
        self.total - self.die_slots
    }

    #[inline]
    fn pack(&self) -> u32 {
        self.total | (self.active << ACTIVE_SHIFT) | (self.die_slots << DIE_SLOTS_SHIFT)
    }

    #[inline]
    fn unpack(word: u32) -> Self {
        Self {
            total: word & TOTAL_MASK,
            active: (word >> ACTIVE_SHIFT) & ACTIVE_MASK,
            die_slots: (word >> DIE_SLOTS_SHIFT) & DIE_SLOTS_MASK,
        }
    }
}

/// Outcome of [`Census::retire_cascade`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetireOutcome {
    /// Whether `active` was decremented as part of this retirement (true
    /// iff `active == total` at the moment the cascade was applied).
    pub active_was_decremented: bool,
    /// Whether a die slot was consumed (it may already have been zero, in
    /// which case a worker is retiring without having claimed a slot —
    /// callers should not normally do this, but the cascade tolerates it).
    pub die_slot_consumed: bool,
}

/// The packed worker census. Lock-free; every mutator is a CAS loop with
/// exponential backoff, matching the spin discipline of
/// [`crate::spinlock::SpinLock`].
pub struct Census {
    word: AtomicU32,
    max_workers: u32,
}

impl Census {
    /// Create a new census with zero workers, clamping `max_workers` to the
    /// field width.
    pub fn new(max_workers: u32) -> Self {
        Self {
            word: AtomicU32::new(0),
            max_workers: max_workers.min(MAX_TOTAL),
        }
    }

    #[inline]
    pub fn max_workers(&self) -> u32 {
        self.max_workers
    }

    /// Read the current census. Not linearised with any subsequent mutator
    /// call by the caller — use the returned snapshot only as a hint unless
    /// externally synchronised.
    #[inline]
    pub fn snapshot(&self) -> CensusSnapshot {
        CensusSnapshot::unpack(self.word.load(Ordering::Acquire))
    }

    /// Spin-CAS helper: repeatedly applies `f` to the current snapshot until
    /// either `f` returns `None` (mutator declines) or the CAS succeeds.
    /// Returns whether the mutator applied.
    fn mutate(&self, mut f: impl FnMut(CensusSnapshot) -> Option<CensusSnapshot>) -> bool {
        let mut spin = 0u32;
        loop {
            let old = self.word.load(Ordering::Acquire);
            let snap = CensusSnapshot::unpack(old);
            let Some(new_snap) = f(snap) else {
                return false;
            };
            let new = new_snap.pack();
            match self
                .word
                .compare_exchange_weak(old, new, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return true,
                Err(_) => {
                    spin = spin.wrapping_add(1);
                    for _ in 0..spin.min(64) {
                        core::hint::spin_loop();
                    }
                }
            }
        }
    }

    /// `incTotal(cap)` — succeeds iff `total < min(cap, max_workers)`.
    pub fn inc_total(&self, cap: u32) -> bool {
        let effective_cap = cap.min(self.max_workers);
        self.mutate(|mut s| {
            if s.total >= effective_cap {
                return None;
            }
            s.total += 1;
            Some(s)
        })
    }

    /// `decTotal(floor)` — succeeds iff `total > floor`.
    pub fn dec_total(&self, floor: u32) -> bool {
        self.mutate(|mut s| {
            if s.total <= floor {
                return None;
            }
            s.total -= 1;
            if s.active > s.total {
                s.active = s.total;
            }
            Some(s)
        })
    }

    /// `incActive()` — succeeds iff `active < total`.
    pub fn inc_active(&self) -> bool {
        self.mutate(|mut s| {
            if s.active >= s.total {
                return None;
            }
            s.active += 1;
            Some(s)
        })
    }

    /// `decActive(floor)` — succeeds iff `active > floor`.
    pub fn dec_active(&self, floor: u32) -> bool {
        self.mutate(|mut s| {
            if s.active <= floor {
                return None;
            }
            s.active -= 1;
            Some(s)
        })
    }

    /// `requestDieSlot(floor, ceil)` — succeeds iff `projected_alive >
    /// floor`, `total <= ceil`, and `die_slots < 255`.
    pub fn request_die_slot(&self, floor: u32, ceil: u32) -> bool {
        self.mutate(|mut s| {
            if s.projected_alive() <= floor || s.total > ceil || s.die_slots >= MAX_DIE_SLOTS {
                return None;
            }
            s.die_slots += 1;
            Some(s)
        })
    }

    /// `retireCascade()` — atomic composite used exactly once by a retiring
    /// worker: consumes a die slot if one is outstanding, decrements
    /// `active` iff `active == total` at the moment the cascade applies,
    /// then decrements `total`. Always succeeds (a worker that is retiring
    /// is by definition being removed).
    pub fn retire_cascade(&self) -> RetireOutcome {
        let mut outcome = RetireOutcome {
            active_was_decremented: false,
            die_slot_consumed: false,
        };
        self.mutate(|mut s| {
            let die_slot_consumed = s.die_slots > 0;
            if die_slot_consumed {
                s.die_slots -= 1;
            }
            let active_was_decremented = s.active == s.total && s.total > 0;
            if active_was_decremented {
                s.active -= 1;
            }
            if s.total > 0 {
                s.total -= 1;
            }
            outcome = RetireOutcome {
                active_was_decremented,
                die_slot_consumed,
            };
            Some(s)
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack_roundtrip() {
        let snap = CensusSnapshot {
            total: 10,
            active: 4,
            die_slots: 2,
        };
        let word = snap.pack();
        assert_eq!(CensusSnapshot::unpack(word), snap);
    }

    #[test]
    fn test_inc_dec_total() {
        let c = Census::new(4);
        assert!(c.inc_total(4));
        assert!(c.inc_total(4));
        assert_eq!(c.snapshot().total, 2);
        assert!(c.dec_total(0));
        assert_eq!(c.snapshot().total, 1);
        assert!(!c.dec_total(1));
    }

    #[test]
    fn test_inc_total_respects_max_workers() {
        let c = Census::new(2);
        assert!(c.inc_total(10));
        assert!(c.inc_total(10));
        assert!(!c.inc_total(10), "max_workers ceiling must win over a looser cap");
    }

    #[test]
    fn test_active_bounded_by_total() {
        let c = Census::new(4);
        assert!(!c.inc_active(), "cannot activate with total == 0");
        c.inc_total(4);
        assert!(c.inc_active());
        assert!(!c.inc_active(), "active cannot exceed total");
        assert!(c.dec_active(0));
        assert!(!c.dec_active(0));
    }

    #[test]
    fn test_dec_total_clamps_active() {
        let c = Census::new(4);
        c.inc_total(4);
        c.inc_active();
        // active == total == 1; decrementing total must also decrement active
        assert!(c.dec_total(0));
        let snap = c.snapshot();
        assert_eq!(snap.total, 0);
        assert_eq!(snap.active, 0);
    }

    #[test]
    fn test_request_die_slot_bounds() {
        let c = Census::new(4);
        c.inc_total(4);
        c.inc_total(4);
        // projected_alive = 2, floor = 1 -> ok
        assert!(c.request_die_slot(1, 4));
        assert_eq!(c.snapshot().die_slots, 1);
        // projected_alive now 1, floor = 1 -> must not succeed (not > floor)
        assert!(!c.request_die_slot(1, 4));
    }

    #[test]
    fn test_retire_cascade_decrements_active_when_fully_active() {
        let c = Census::new(4);
        c.inc_total(4);
        c.inc_active();
        c.request_die_slot(0, 4);
        let outcome = c.retire_cascade();
        assert!(outcome.active_was_decremented);
        assert!(outcome.die_slot_consumed);
        let snap = c.snapshot();
        assert_eq!(snap.total, 0);
        assert_eq!(snap.active, 0);
        assert_eq!(snap.die_slots, 0);
    }

    #[test]
    fn test_retire_cascade_leaves_active_when_parked() {
        let c = Census::new(4);
        c.inc_total(4);
        c.inc_total(4);
        c.inc_active();
        // total=2, active=1: one parked worker retires without being active
        let outcome = c.retire_cascade();
        assert!(!outcome.active_was_decremented);
        let snap = c.snapshot();
        assert_eq!(snap.total, 1);
        assert_eq!(snap.active, 1);
    }

    #[test]
    fn test_concurrent_inc_dec_total_preserves_invariants() {
        use std::sync::Arc;
        use std::thread;

        let c = Arc::new(Census::new(64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = Arc::clone(&c);
            handles.push(thread::spawn(move || {
                for _ in 0..2000 {
                    let _ = c.inc_total(64);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let snap = c.snapshot();
        assert!(snap.total <= 64);
        assert!(snap.active <= snap.total);
    }

    proptest::proptest! {
        #[test]
        fn prop_census_invariants_hold(ops in proptest::collection::vec(0u8..6, 0..500)) {
            let c = Census::new(64);
            for op in ops {
                match op {
                    0 => { c.inc_total(64); },
                    1 => { c.dec_total(0); },
                    2 => { c.inc_active(); },
                    3 => { c.dec_active(0); },
                    4 => { c.request_die_slot(0, 64); },
                    5 => { c.retire_cascade(); },
                    _ => unreachable!(),
                }
                let s = c.snapshot();
                prop_assert!(s.active <= s.total);
                prop_assert!(s.total <= 64);
                prop_assert!(s.die_slots <= MAX_DIE_SLOTS);
            }
        }
    }
}
