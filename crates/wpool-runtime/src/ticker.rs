//! Management ticker (C8): a dedicated OS thread that invokes a registered
//! callback on a fixed period until the callback returns `false` or the
//! ticker is shut down.
//!
//! A shutdown `AtomicBool` plus a condvar-parked sleep, joined on drop —
//! the same start/shutdown/join shape used for other dedicated background
//! threads in this workspace, minus any preemption-specific bookkeeping,
//! since only `register`/`unregister`/shutdown are needed here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type Callback = Box<dyn FnMut(Duration) -> bool + Send>;

struct Shared {
    shutdown: AtomicBool,
    wake_lock: Mutex<()>,
    wake_cond: Condvar,
    callback: Mutex<Option<Callback>>,
}

/// Drives a registered callback at `period`, passing the actual elapsed time
/// since the previous invocation. Stops early if the callback returns
/// `false`, requesting its own removal.
pub struct ManagementTicker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl ManagementTicker {
    /// Spawn the ticker thread, named `{pool_name}-ticker`, invoking
    /// whatever callback is registered every `period`.
    pub fn start(pool_name: &str, period: Duration) -> Self {
        let shared = Arc::new(Shared {
            shutdown: AtomicBool::new(false),
            wake_lock: Mutex::new(()),
            wake_cond: Condvar::new(),
            callback: Mutex::new(None),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("{pool_name}-ticker"))
            .spawn(move || ticker_loop(thread_shared, period))
            .expect("failed to spawn management ticker thread");

        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// `register(callback)` — install (replacing any previous) callback.
    pub fn register(&self, callback: impl FnMut(Duration) -> bool + Send + 'static) {
        *self.shared.callback.lock().unwrap() = Some(Box::new(callback));
    }

    /// `unregister` — remove the callback without stopping the thread.
    pub fn unregister(&self) {
        *self.shared.callback.lock().unwrap() = None;
    }

    /// Request the ticker thread to stop and wake it immediately.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        let _guard = self.shared.wake_lock.lock().unwrap();
        self.shared.wake_cond.notify_all();
    }

    /// Block until the ticker thread has exited.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ManagementTicker {
    fn drop(&mut self) {
        self.shutdown();
        self.join();
    }
}

fn ticker_loop(shared: Arc<Shared>, period: Duration) {
    let mut last_tick = Instant::now();
    loop {
        {
            let guard = shared.wake_lock.lock().unwrap();
            if !shared.shutdown.load(Ordering::Acquire) {
                let _ = shared.wake_cond.wait_timeout(guard, period).unwrap();
            }
        }
        if shared.shutdown.load(Ordering::Acquire) {
            return;
        }
        let now = Instant::now();
        let elapsed = now.duration_since(last_tick);
        last_tick = now;

        let mut slot = shared.callback.lock().unwrap();
        let keep_going = match slot.as_mut() {
            Some(cb) => cb(elapsed),
            None => true,
        };
        if !keep_going {
            *slot = None;
            return;
        }
    }
}
