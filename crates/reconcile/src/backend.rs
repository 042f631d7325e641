//! Capability traits for the external subsystems
//!
//! The engine never talks to a container runtime or package database
//! directly. Callers hand it implementations of these traits, which keeps
//! the engine testable with in-memory fakes and lets the binary plug in the
//! real `docker` and `pacman` backends.
//!
//! Methods return `anyhow::Result`. Implementations that can tell *why*
//! something failed should wrap a typed [`crate::Error`] (e.g. `Locked`,
//! `Cancelled`) so it survives classification by the engine.

use crate::context::CallContext;
use crate::error::{Error, Result as EngineResult};
use crate::types::{ObservedContainer, ObservedNetwork, ObservedPackage};
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Request to create a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateContainer {
    pub name: String,
    pub image: String,
    pub network: String,
    pub labels: BTreeMap<String, String>,
}

/// Request to create a network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateNetwork {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

/// Container runtime (containers and networks)
pub trait ContainerRuntime: Send + Sync {
    /// List containers, including stopped ones when asked
    fn list_containers(
        &self,
        ctx: &CallContext,
        include_stopped: bool,
    ) -> Result<Vec<ObservedContainer>>;

    /// List every network known to the runtime
    fn list_networks(&self, ctx: &CallContext) -> Result<Vec<ObservedNetwork>>;

    /// Create a container attached to `request.network` and start it
    ///
    /// Returns the runtime's container id.
    fn create_container(&self, ctx: &CallContext, request: &CreateContainer) -> Result<String>;

    /// Create a network, returning its id
    fn create_network(&self, ctx: &CallContext, request: &CreateNetwork) -> Result<String>;
}

/// Package database
pub trait PackageBackend: Send + Sync {
    /// Packages installed locally
    fn list_installed(&self, ctx: &CallContext) -> Result<Vec<ObservedPackage>>;

    /// Every candidate the configured repositories offer for `names`
    ///
    /// Names no repository knows are simply absent. The same name may appear
    /// once per repository.
    fn list_remote(&self, ctx: &CallContext, names: &[String]) -> Result<Vec<ObservedPackage>>;

    /// Acquire the transaction handle
    ///
    /// Fails fast with [`Error::Locked`] when another transaction holds it.
    fn begin(&self, ctx: &CallContext) -> Result<Box<dyn PackageTransaction + '_>>;
}

/// An open package transaction
///
/// Driven by the engine as `stage* -> prepare -> commit`; `release` is
/// always called exactly once, whatever happened before.
pub trait PackageTransaction {
    /// Add a package to the batch
    fn stage(&mut self, ctx: &CallContext, package: &ObservedPackage) -> Result<()>;

    /// Resolve the whole batch without touching the system
    fn prepare(&mut self, ctx: &CallContext) -> Result<()>;

    /// Apply the batch atomically
    ///
    /// Must not be interrupted half-way: cancellation is observed before or
    /// after, never during.
    fn commit(&mut self, ctx: &CallContext) -> Result<()>;

    /// Give the handle back
    fn release(&mut self);
}

/// A failure tied to one package of a batch
///
/// Backends wrap step failures in this when they know which package caused
/// them, so the aggregate error can name it.
#[derive(Debug, thiserror::Error)]
#[error("{name}: {message}")]
pub struct EntryError {
    pub name: String,
    pub message: String,
}

/// Exclusive slot guarding a package transaction handle
///
/// Package backends own one and acquire it in [`PackageBackend::begin`], so
/// at most one transaction per backend instance is open at a time. Losing
/// the race fails fast rather than blocking.
#[derive(Debug, Default)]
pub struct TransactionSlot {
    held: AtomicBool,
}

impl TransactionSlot {
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    pub fn try_acquire(&self) -> EngineResult<SlotGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Locked {
                holder: "another transaction in this process".to_string(),
            })?;
        Ok(SlotGuard { slot: self })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Releases the slot on drop
#[derive(Debug)]
pub struct SlotGuard<'a> {
    slot: &'a TransactionSlot,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.slot.held.store(false, Ordering::Release);
    }
}
