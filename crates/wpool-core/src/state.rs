//! Worker loop state and pool lifecycle state

use core::fmt;

/// State of a single worker's run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerLoopState {
    /// Parked on the blocker, not polling the queue.
    IdleParked = 0,

    /// Checking the queue for work (long or short poll).
    Polling = 1,

    /// Executing a work item.
    Running = 2,

    /// Claimed a die slot and is exiting via the retire cascade.
    Retiring = 3,
}

impl WorkerLoopState {
    #[inline]
    pub const fn is_parked(&self) -> bool {
        matches!(self, WorkerLoopState::IdleParked)
    }

    #[inline]
    pub const fn is_active(&self) -> bool {
        matches!(self, WorkerLoopState::Polling | WorkerLoopState::Running)
    }
}

impl fmt::Display for WorkerLoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerLoopState::IdleParked => write!(f, "idle-parked"),
            WorkerLoopState::Polling => write!(f, "polling"),
            WorkerLoopState::Running => write!(f, "running"),
            WorkerLoopState::Retiring => write!(f, "retiring"),
        }
    }
}

/// Lifecycle state of the pool as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
    /// Constructed but not yet started.
    Created = 0,

    /// Accepting submissions, workers may be spawned/parked/retired.
    Running = 1,

    /// `stop()` was called; no further submissions accepted, workers
    /// cancelled, draining in progress.
    StopRequested = 2,

    /// All worker handles joined and the queue drained per `let_finish`.
    Stopped = 3,
}

impl PoolState {
    /// Whether census mutations are still permitted in this state.
    ///
    /// Once `Stopped`, no census mutations are permitted.
    #[inline]
    pub const fn allows_census_mutation(&self) -> bool {
        !matches!(self, PoolState::Stopped)
    }

    #[inline]
    pub const fn accepts_submissions(&self) -> bool {
        matches!(self, PoolState::Created | PoolState::Running)
    }
}

impl From<u8> for PoolState {
    fn from(v: u8) -> Self {
        match v {
            0 => PoolState::Created,
            1 => PoolState::Running,
            2 => PoolState::StopRequested,
            _ => PoolState::Stopped,
        }
    }
}

impl From<PoolState> for u8 {
    fn from(s: PoolState) -> u8 {
        s as u8
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolState::Created => write!(f, "created"),
            PoolState::Running => write!(f, "running"),
            PoolState::StopRequested => write!(f, "stop-requested"),
            PoolState::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_loop_state() {
        assert!(WorkerLoopState::IdleParked.is_parked());
        assert!(!WorkerLoopState::Running.is_parked());
        assert!(WorkerLoopState::Running.is_active());
        assert!(WorkerLoopState::Polling.is_active());
        assert!(!WorkerLoopState::Retiring.is_active());
    }

    #[test]
    fn test_pool_state_transitions() {
        assert!(PoolState::Created.accepts_submissions());
        assert!(PoolState::Running.accepts_submissions());
        assert!(!PoolState::StopRequested.accepts_submissions());
        assert!(!PoolState::Stopped.accepts_submissions());

        assert!(PoolState::Running.allows_census_mutation());
        assert!(PoolState::StopRequested.allows_census_mutation());
        assert!(!PoolState::Stopped.allows_census_mutation());
    }

    #[test]
    fn test_pool_state_roundtrip() {
        for raw in 0u8..4 {
            let s = PoolState::from(raw);
            assert_eq!(u8::from(s), raw);
        }
    }
}
