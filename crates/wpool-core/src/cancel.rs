//! Cancellation token for cooperative shutdown
//!
//! The pool hands every worker a clone of one shared token. `stop()` cancels
//! it once; every worker observes cancellation on its next check and exits
//! its loop instead of re-parking. Tokens can be linked to form parent-child
//! relationships, though the pool itself only ever uses a single flat token.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{PoolError, PoolResult};

/// Token for checking and triggering cooperative cancellation.
#[derive(Clone)]
pub struct CancellationToken {
    inner: CancellationInner,
}

#[derive(Clone)]
enum CancellationInner {
    Owned(Arc<OwnedCancellation>),
    /// A token that never cancels, for contexts with no lifecycle to track.
    Dummy,
}

struct OwnedCancellation {
    cancelled: AtomicBool,
    parent: Option<CancellationToken>,
}

impl CancellationToken {
    /// Create a new independent cancellation token.
    pub fn new() -> Self {
        Self {
            inner: CancellationInner::Owned(Arc::new(OwnedCancellation {
                cancelled: AtomicBool::new(false),
                parent: None,
            })),
        }
    }

    /// Create a dummy token that never cancels.
    pub fn dummy() -> Self {
        Self {
            inner: CancellationInner::Dummy,
        }
    }

    /// Create a child token linked to this one.
    ///
    /// If this token is cancelled, checking the child also reports
    /// cancelled.
    pub fn child(&self) -> Self {
        Self {
            inner: CancellationInner::Owned(Arc::new(OwnedCancellation {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            })),
        }
    }

    /// Check if cancellation was requested, including via the parent chain.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        match &self.inner {
            CancellationInner::Owned(arc) => {
                if arc.cancelled.load(Ordering::Acquire) {
                    return true;
                }
                match &arc.parent {
                    Some(parent) => parent.is_cancelled(),
                    None => false,
                }
            }
            CancellationInner::Dummy => false,
        }
    }

    /// Request cancellation. Only sets this token's own flag; child tokens
    /// observe it through the parent chain, not the reverse.
    pub fn cancel(&self) {
        if let CancellationInner::Owned(arc) = &self.inner {
            arc.cancelled.store(true, Ordering::Release);
        }
    }

    /// Check cancellation and return an error if cancelled.
    #[inline]
    pub fn check(&self) -> PoolResult<()> {
        if self.is_cancelled() {
            Err(PoolError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cancellation() {
        let token = CancellationToken::new();

        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        token.cancel();

        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(PoolError::Cancelled)));
    }

    #[test]
    fn test_child_token() {
        let parent = CancellationToken::new();
        let child = parent.child();

        assert!(!child.is_cancelled());

        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_independent_cancel() {
        let parent = CancellationToken::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_deep_hierarchy() {
        let root = CancellationToken::new();
        let level1 = root.child();
        let level2 = level1.child();
        let level3 = level2.child();

        assert!(!level3.is_cancelled());

        root.cancel();
        assert!(level1.is_cancelled());
        assert!(level2.is_cancelled());
        assert!(level3.is_cancelled());
    }

    #[test]
    fn test_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_dummy_token() {
        let token = CancellationToken::dummy();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(!token.is_cancelled());
    }
}
