//! # Reconcile
//!
//! Resource reconciliation for a single host: containers, networks and
//! system packages.
//!
//! A call reads live state through capability traits, diffs it against a
//! declared desired state and applies the minimal set of changes:
//!
//! - **Observers** read containers, networks, installed and remote packages
//! - **Differ** turns desired + observed state into a [`Plan`] of
//!   Create / Upgrade / Noop / Unresolved entries
//! - **Executor** applies packages as one atomic transaction and
//!   containers/networks one entry at a time
//! - **Exporter** turns owned live containers back into a document
//!
//! Containers and networks this crate creates carry the
//! `managed-by=hivekeep` label; anything else is foreign and never touched.
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{CallContext, DesiredDocument, DesiredState, Engine};
//!
//! let document = DesiredDocument::from_yaml(&std::fs::read_to_string("desired.yaml")?)?;
//! let desired = DesiredState::from_document(document, vec!["htop".parse()?])?;
//!
//! let engine = Engine::new(&docker, &pacman);
//! let outcome = engine.reconcile(&CallContext::new(), &desired);
//! for result in &outcome.results {
//!     println!("{} {}: {}", result.action, result.identity, result.succeeded);
//! }
//! ```
//!
//! ## Capability Traits
//!
//! - [`ContainerRuntime`]: list and create containers and networks
//! - [`PackageBackend`]: list packages and open a [`PackageTransaction`]
//! - [`ProgressCallback`]: receives progress while a plan is applied
//!
//! The engine has no timeouts of its own; cancel a [`CancelToken`] to stop
//! a call.

pub mod backend;
pub mod context;
pub mod differ;
pub mod engine;
pub mod error;
pub mod executor;
pub mod exporter;
pub mod identity;
pub mod observer;
pub mod ownership;
pub mod transaction;
pub mod types;
pub mod version;
pub mod view;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use backend::{
    ContainerRuntime, CreateContainer, CreateNetwork, EntryError, PackageBackend,
    PackageTransaction, SlotGuard, TransactionSlot,
};
pub use context::{CallContext, CancelToken, NoProgress, ProgressCallback};
pub use differ::Observation;
pub use engine::{DEFAULT_NETWORK, Engine};
pub use error::{Error, ErrorKind, Result, TransactionStage};
pub use executor::{ApplyStrategy, BatchOutcome, Executor};
pub use identity::{ResourceIdentity, ResourceKind};
pub use ownership::{LABEL_KEY, LABEL_VALUE, Owner, managed_labels};
pub use types::{
    Action, ApplyResult, ContainerSpec, DesiredDocument, DesiredResource, DesiredState,
    NetworkSpec, ObservedContainer, ObservedNetwork, ObservedPackage, ObservedResource,
    PackageSpec, Plan, PlanEntry, PlanSummary, Reconciliation,
};
pub use view::{ContainerFilter, ContainerView, PackageCandidate, uptime_bucket};
