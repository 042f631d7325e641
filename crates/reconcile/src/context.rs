//! Call context and cancellation
//!
//! The engine imposes no timeouts of its own. Callers that need one hold a
//! [`CancelToken`] and cancel it; every observer and executor method takes a
//! [`CallContext`] and checks it before each external call. Backends receive
//! the raw flag so they can abort in-flight I/O.

use crate::error::{Error, Result};
use crate::identity::{ResourceIdentity, ResourceKind};
use crate::types::{Action, ApplyResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every call holding this token
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The raw flag, for backends that poll while waiting on I/O
    pub fn flag(&self) -> &AtomicBool {
        &self.flag
    }
}

/// Context threaded through every observer and executor call
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancelToken,
}

impl CallContext {
    /// A context that is never cancelled unless its token is
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self { cancel }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Interrupt flag to hand to blocking backend calls
    pub fn interrupt(&self) -> &AtomicBool {
        self.cancel.flag()
    }

    /// Fail with [`Error::Cancelled`] once cancellation was requested
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Receives progress while a plan is applied
pub trait ProgressCallback {
    /// A kind's batch is about to run with `total` changing entries
    fn on_batch_start(&mut self, _kind: ResourceKind, _total: usize) {}

    fn on_entry_start(&mut self, _identity: &ResourceIdentity, _action: Action) {}

    fn on_entry_complete(&mut self, _result: &ApplyResult) {}

    fn on_batch_complete(&mut self, _kind: ResourceKind) {}
}

/// Progress callback that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressCallback for NoProgress {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_passes_until_cancelled() {
        let token = CancelToken::new();
        let ctx = CallContext::with_cancel(token.clone());
        assert!(ctx.checkpoint().is_ok());

        token.cancel();
        assert!(matches!(ctx.checkpoint(), Err(Error::Cancelled)));
        assert!(ctx.interrupt().load(Ordering::SeqCst));
    }

    #[test]
    fn test_clones_share_the_flag() {
        let ctx = CallContext::new();
        let other = ctx.clone();
        ctx.cancel_token().cancel();
        assert!(other.is_cancelled());
    }
}
