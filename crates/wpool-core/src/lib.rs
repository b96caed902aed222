//! # wpool-core
//!
//! Core, platform-agnostic primitives for the self-tuning worker pool.
//!
//! This crate contains no OS-specific code and no knowledge of how work is
//! actually dispatched or executed; that orchestration lives in
//! `wpool-runtime`. What lives here are the pieces the pool's invariants are
//! built on:
//!
//! ## Modules
//!
//! - `id` - worker identifier type
//! - `state` - worker loop state and pool lifecycle state enums
//! - `census` - packed atomic worker census (total/active/die-slot bookkeeping)
//! - `blocker` - counted park/release gate used by the management loop
//! - `cancel` - cancellation token for cooperative shutdown
//! - `error` - error types
//! - `spinlock` - internal spinlock primitive
//! - `kprint` - kernel-style debug printing macros
//! - `env` - environment variable utilities

#![allow(dead_code)]

pub mod id;
pub mod state;
pub mod census;
pub mod blocker;
pub mod cancel;
pub mod error;
pub mod spinlock;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::WorkerId;
pub use state::{PoolState, WorkerLoopState};
pub use census::{Census, CensusSnapshot, RetireOutcome};
pub use blocker::PartialBlocker;
pub use cancel::CancellationToken;
pub use error::{PoolError, PoolResult};
pub use spinlock::SpinLock;
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};

/// Hard ceilings imposed by the packed census layout and other fixed-width
/// bookkeeping used throughout the pool.
pub mod constants {
    /// Ceiling on `total`/`active`: the census packs each into 12 bits.
    pub const MAX_WORKERS: u32 = crate::census::MAX_TOTAL;

    /// Ceiling on outstanding die-slots: the census packs this into 8 bits.
    pub const MAX_DIE_SLOTS: u32 = crate::census::MAX_DIE_SLOTS;

    /// Cache line size for alignment of hot shared counters.
    pub const CACHE_LINE_SIZE: usize = 64;
}
