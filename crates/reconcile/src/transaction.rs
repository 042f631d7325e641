//! Scoped package transaction
//!
//! `Idle -> Initialized -> Staged* -> Prepared -> Committed`, with
//! `Released` reachable from every state. The handle is released when the
//! guard is dropped, so every exit path (success, error, cancellation or a
//! panic unwinding through the executor) gives it back exactly once.

use crate::backend::{EntryError, PackageBackend, PackageTransaction};
use crate::context::CallContext;
use crate::error::{Error, Result, TransactionStage};
use crate::types::ObservedPackage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Initialized,
    Staged(usize),
    Prepared,
    Committed,
    Released,
}

pub struct Transaction<'a> {
    handle: Option<Box<dyn PackageTransaction + 'a>>,
    state: TransactionState,
    /// Names staged so far; the first one is blamed when the backend
    /// cannot say which entry failed
    staged: Vec<String>,
    batch_head: String,
}

impl<'a> Transaction<'a> {
    /// Acquire the handle for a batch whose first entry is `batch_head`
    pub fn begin(
        backend: &'a dyn PackageBackend,
        ctx: &CallContext,
        batch_head: &str,
    ) -> Result<Self> {
        ctx.checkpoint()?;
        let handle = backend
            .begin(ctx)
            .map_err(|e| classify(TransactionStage::Init, ctx, e, batch_head))?;
        log::debug!("Package transaction initialized");

        Ok(Self {
            handle: Some(handle),
            state: TransactionState::Initialized,
            staged: Vec::new(),
            batch_head: batch_head.to_string(),
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn stage(&mut self, ctx: &CallContext, package: &ObservedPackage) -> Result<()> {
        ctx.checkpoint()?;
        let handle = self.handle_mut()?;
        handle
            .stage(ctx, package)
            .map_err(|e| classify(TransactionStage::Stage, ctx, e, &package.name))?;

        self.staged.push(package.name.clone());
        self.state = TransactionState::Staged(self.staged.len());
        log::debug!("Staged {} {}", package.qualified_name(), package.version);
        Ok(())
    }

    pub fn prepare(&mut self, ctx: &CallContext) -> Result<()> {
        ctx.checkpoint()?;
        let blame = self.blame().to_string();
        let handle = self.handle_mut()?;
        handle
            .prepare(ctx)
            .map_err(|e| classify(TransactionStage::Prepare, ctx, e, &blame))?;

        self.state = TransactionState::Prepared;
        log::debug!("Package transaction prepared ({} entries)", self.staged.len());
        Ok(())
    }

    /// Commit the batch
    ///
    /// Cancellation is checked once before the commit starts. After that the
    /// commit runs to completion and its own outcome is reported.
    pub fn commit(&mut self, ctx: &CallContext) -> Result<()> {
        ctx.checkpoint()?;
        let blame = self.blame().to_string();
        let handle = self.handle_mut()?;
        handle.commit(ctx).map_err(|e| {
            classify(TransactionStage::Commit, &CallContext::new(), e, &blame)
        })?;

        self.state = TransactionState::Committed;
        log::info!("Committed {} package(s)", self.staged.len());
        Ok(())
    }

    /// Release the handle now rather than at drop
    pub fn release(mut self) {
        self.release_handle();
    }

    fn release_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
            if self.state != TransactionState::Committed {
                log::debug!("Package transaction released in state {:?}", self.state);
            }
            self.state = TransactionState::Released;
        }
    }

    fn handle_mut(&mut self) -> Result<&mut Box<dyn PackageTransaction + 'a>> {
        let stage = match self.state {
            TransactionState::Initialized | TransactionState::Staged(_) => TransactionStage::Stage,
            _ => TransactionStage::Commit,
        };
        let head = self.batch_head.clone();
        self.handle.as_mut().ok_or_else(|| Error::TransactionFailed {
            stage,
            entry: head,
            message: "transaction handle already released".to_string(),
        })
    }

    fn blame(&self) -> &str {
        self.staged.first().unwrap_or(&self.batch_head)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.release_handle();
    }
}

/// Classify a failure at `stage`
///
/// Typed engine errors pass through; a backend [`EntryError`] names the
/// failing entry; anything else is blamed on `fallback`.
fn classify(
    stage: TransactionStage,
    ctx: &CallContext,
    err: anyhow::Error,
    fallback: &str,
) -> Error {
    if ctx.is_cancelled() {
        return Error::Cancelled;
    }
    let err = match err.downcast::<Error>() {
        Ok(typed) => return typed,
        Err(other) => other,
    };
    match err.downcast::<EntryError>() {
        Ok(entry) => Error::TransactionFailed {
            stage,
            entry: entry.name,
            message: entry.message,
        },
        Err(other) => Error::TransactionFailed {
            stage,
            entry: fallback.to_string(),
            message: format!("{other:#}"),
        },
    }
}
