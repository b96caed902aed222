//! # wpool — a self-tuning worker pool
//!
//! A thread pool that grows and shrinks itself in response to queue
//! pressure and measured throughput, instead of running at a fixed size.
//!
//! ## Quick start
//!
//! ```no_run
//! use wpool::{Pool, PoolOptions};
//!
//! let pool = Pool::new(2, 8, Some(1024), "workers", false, PoolOptions::default())
//!     .expect("valid pool configuration");
//! pool.start();
//!
//! pool.submit(|| {
//!     println!("running on a pool worker");
//! }).expect("pool is open");
//!
//! pool.stop(true);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │                  submit(), try_submit()                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PoolManager (C5)                         │
//! │   starvation rescue, growth, queue extension, tuning Δ      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────────┐
//!    │  Worker   │      │  Worker   │      │  Management   │
//!    │  Thread   │      │  Thread   │      │  Ticker       │
//!    └───────────┘      └───────────┘      └───────────────┘
//!          │                   │                   │
//!          └───────────────────┼───────────────────┘
//!                              ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │              Census (C1) + PartialBlocker (C2)           │
//!    │         packed atomic counts, counted park/release       │
//!    └─────────────────────────────────────────────────────────┘
//! ```

// Re-export the public pool surface.
pub use wpool_runtime::{Pool, PoolOptions, WorkItem};

// Re-export error types.
pub use wpool_core::{PoolError, PoolResult};

// Re-export logging macros for callers who want the same contextual
// tagging the pool uses internally.
pub use wpool_core::{wdebug, werror, winfo, wtrace, wwarn};
pub use wpool_core::kprint::{init as init_logging, set_flush_enabled, set_log_level, set_time_enabled, LogLevel};

// Re-export env utilities so callers can read the same `WPOOL_*` overrides.
pub use wpool_core::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};
