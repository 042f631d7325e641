//! Execution - applies plan entries with a per-kind strategy
//!
//! Packages go through one atomic transaction per call. Containers and
//! networks are applied one at a time in plan order, and a failed entry
//! never stops the ones after it.

use crate::backend::{ContainerRuntime, CreateContainer, CreateNetwork, PackageBackend};
use crate::context::{CallContext, ProgressCallback};
use crate::error::{Error, Result};
use crate::identity::{ResourceIdentity, ResourceKind};
use crate::observer;
use crate::ownership::managed_labels;
use crate::transaction::Transaction;
use crate::types::{
    ApplyResult, ContainerSpec, DesiredResource, NetworkSpec, ObservedPackage, PlanEntry,
};

/// How the entries of one kind are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStrategy {
    /// All changes commit together or not at all
    Atomic,
    /// Each entry succeeds or fails on its own
    Independent,
}

impl ApplyStrategy {
    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Package => Self::Atomic,
            ResourceKind::Container | ResourceKind::Network => Self::Independent,
        }
    }
}

/// Results of applying one kind, plus the aggregate error if any entry failed
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<ApplyResult>,
    pub error: Option<Error>,
}

pub struct Executor<'a> {
    runtime: &'a dyn ContainerRuntime,
    packages: &'a dyn PackageBackend,
    default_network: &'a str,
}

impl<'a> Executor<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        packages: &'a dyn PackageBackend,
        default_network: &'a str,
    ) -> Self {
        Self {
            runtime,
            packages,
            default_network,
        }
    }

    /// Apply the changing entries of `kind`
    ///
    /// Noop and unresolved entries are skipped and produce no result.
    pub fn apply(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        entries: &[&PlanEntry],
        progress: &mut dyn ProgressCallback,
    ) -> BatchOutcome {
        let changes: Vec<&PlanEntry> = entries
            .iter()
            .copied()
            .filter(|e| e.kind() == kind && e.action.is_change())
            .collect();
        if changes.is_empty() {
            return BatchOutcome::default();
        }

        progress.on_batch_start(kind, changes.len());
        let outcome = match ApplyStrategy::for_kind(kind) {
            ApplyStrategy::Atomic => self.apply_atomic(ctx, &changes, progress),
            ApplyStrategy::Independent => self.apply_independent(ctx, &changes, progress),
        };
        progress.on_batch_complete(kind);
        outcome
    }

    fn apply_independent(
        &self,
        ctx: &CallContext,
        changes: &[&PlanEntry],
        progress: &mut dyn ProgressCallback,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut failed: Vec<ResourceIdentity> = Vec::new();

        for (idx, entry) in changes.iter().enumerate() {
            if ctx.is_cancelled() {
                log::warn!("Cancelled; skipping {} remaining entries", changes.len() - idx);
                for skipped in &changes[idx..] {
                    let result = ApplyResult::failed(skipped, &Error::Cancelled);
                    progress.on_entry_complete(&result);
                    outcome.results.push(result);
                }
                outcome.error = Some(Error::Cancelled);
                return outcome;
            }

            let identity = entry.identity();
            progress.on_entry_start(&identity, entry.action);

            let result = match self.apply_entry(ctx, entry) {
                Ok(()) => {
                    log::info!("{} {identity}", entry.action);
                    ApplyResult::succeeded(entry)
                }
                Err(e) => {
                    log::warn!("Failed to {} {identity}: {e}", entry.action);
                    failed.push(identity);
                    ApplyResult::failed(entry, &e)
                }
            };
            progress.on_entry_complete(&result);
            outcome.results.push(result);
        }

        if !failed.is_empty() {
            outcome.error = Some(Error::EntriesFailed { failed });
        }
        outcome
    }

    fn apply_entry(&self, ctx: &CallContext, entry: &PlanEntry) -> Result<()> {
        match &entry.resource {
            DesiredResource::Network(spec) => self.create_network(ctx, spec),
            DesiredResource::Container(spec) => self.create_container(ctx, spec),
            // Packages only ever go through a transaction
            DesiredResource::Package(spec) => Err(Error::Rejected {
                resource: ResourceIdentity::package(&spec.name),
                message: "packages are applied as a transaction".to_string(),
            }),
        }
    }

    fn create_network(&self, ctx: &CallContext, spec: &NetworkSpec) -> Result<()> {
        ctx.checkpoint()?;
        let request = CreateNetwork {
            name: spec.name.clone(),
            labels: managed_labels(),
        };
        let id = self
            .runtime
            .create_network(ctx, &request)
            .map_err(|e| Error::from_apply(&ResourceIdentity::network(&spec.name), ctx, e))?;
        log::debug!("Network {} created ({id})", spec.name);
        Ok(())
    }

    /// Create and start a container once its network is known to exist
    fn create_container(&self, ctx: &CallContext, spec: &ContainerSpec) -> Result<()> {
        let identity = ResourceIdentity::container(&spec.name);
        let network = spec.network.as_deref().unwrap_or(self.default_network);

        // Checked live: the network may have been created earlier in this call
        let networks = observer::list_networks(self.runtime, ctx)?;
        if !networks.iter().any(|n| n.name == network) {
            return Err(Error::PrereqMissing {
                resource: identity,
                missing: ResourceIdentity::network(network),
            });
        }

        ctx.checkpoint()?;
        let request = CreateContainer {
            name: spec.name.clone(),
            image: spec.image.clone(),
            network: network.to_string(),
            labels: managed_labels(),
        };
        let id = self
            .runtime
            .create_container(ctx, &request)
            .map_err(|e| Error::from_apply(&identity, ctx, e))?;
        log::debug!("Container {} started ({id})", spec.name);
        Ok(())
    }

    fn apply_atomic(
        &self,
        ctx: &CallContext,
        changes: &[&PlanEntry],
        progress: &mut dyn ProgressCallback,
    ) -> BatchOutcome {
        for entry in changes {
            progress.on_entry_start(&entry.identity(), entry.action);
        }

        let result = self.run_transaction(ctx, changes);
        let results: Vec<ApplyResult> = changes
            .iter()
            .map(|entry| match &result {
                Ok(()) => ApplyResult::succeeded(entry),
                Err(e) => ApplyResult::failed(entry, e),
            })
            .collect();
        for r in &results {
            progress.on_entry_complete(r);
        }

        match result {
            Ok(()) => BatchOutcome {
                results,
                error: None,
            },
            Err(e) => {
                log::warn!("Package transaction failed: {e}");
                BatchOutcome {
                    results,
                    error: Some(e),
                }
            }
        }
    }

    fn run_transaction(&self, ctx: &CallContext, changes: &[&PlanEntry]) -> Result<()> {
        let targets: Vec<ObservedPackage> = changes
            .iter()
            .filter_map(|entry| entry.package_target())
            .collect();
        let Some(head) = targets.first() else {
            return Ok(());
        };

        let mut tx = Transaction::begin(self.packages, ctx, &head.name)?;
        for target in &targets {
            tx.stage(ctx, target)?;
        }
        tx.prepare(ctx)?;
        tx.commit(ctx)?;
        tx.release();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CancelToken, NoProgress};
    use crate::differ;
    use crate::error::ErrorKind;
    use crate::testing::{FailAt, FakePackages, FakeRuntime};
    use crate::types::{Action, PackageSpec, Plan};

    const NET: &str = "hivekeep-network";

    fn container_plan(specs: &[ContainerSpec]) -> Plan {
        differ::diff_containers(specs, &[])
    }

    #[test]
    fn test_strategy_per_kind() {
        assert_eq!(ApplyStrategy::for_kind(ResourceKind::Package), ApplyStrategy::Atomic);
        assert_eq!(
            ApplyStrategy::for_kind(ResourceKind::Container),
            ApplyStrategy::Independent
        );
        assert_eq!(
            ApplyStrategy::for_kind(ResourceKind::Network),
            ApplyStrategy::Independent
        );
    }

    #[test]
    fn test_container_failures_are_independent() {
        let runtime = FakeRuntime::new().with_network(NET).rejecting_image("bad::ref");
        let packages = FakePackages::new();
        let executor = Executor::new(&runtime, &packages, NET);

        let plan = container_plan(&[
            ContainerSpec::new("one", "nginx:latest"),
            ContainerSpec::new("two", "bad::ref"),
            ContainerSpec::new("three", "redis:7"),
        ]);
        let entries: Vec<&PlanEntry> = plan.iter().collect();
        let outcome = executor.apply(
            &CallContext::new(),
            ResourceKind::Container,
            &entries,
            &mut NoProgress,
        );

        let succeeded: Vec<bool> = outcome.results.iter().map(|r| r.succeeded).collect();
        assert_eq!(succeeded, vec![true, false, true]);
        match outcome.error {
            Some(Error::EntriesFailed { failed }) => {
                assert_eq!(failed, vec![ResourceIdentity::container("two")]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(runtime.container_names(), vec!["one", "three"]);
    }

    #[test]
    fn test_missing_network_blocks_create() {
        let runtime = FakeRuntime::new();
        let packages = FakePackages::new();
        let executor = Executor::new(&runtime, &packages, NET);

        let plan = container_plan(&[ContainerSpec::new("web", "nginx:latest")]);
        let entries: Vec<&PlanEntry> = plan.iter().collect();
        let outcome = executor.apply(
            &CallContext::new(),
            ResourceKind::Container,
            &entries,
            &mut NoProgress,
        );

        assert_eq!(outcome.results[0].error_kind, Some(ErrorKind::PrereqMissing));
        assert_eq!(runtime.create_calls(), 0);
    }

    #[test]
    fn test_cancel_stops_remaining_entries() {
        let runtime = FakeRuntime::new().with_network(NET);
        let packages = FakePackages::new();
        let executor = Executor::new(&runtime, &packages, NET);
        let token = CancelToken::new();
        token.cancel();

        let plan = container_plan(&[
            ContainerSpec::new("a", "img:a"),
            ContainerSpec::new("b", "img:b"),
        ]);
        let entries: Vec<&PlanEntry> = plan.iter().collect();
        let outcome = executor.apply(
            &CallContext::with_cancel(token),
            ResourceKind::Container,
            &entries,
            &mut NoProgress,
        );

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results.iter().all(|r| !r.succeeded));
        assert_eq!(outcome.error.map(|e| e.kind()), Some(ErrorKind::Cancelled));
        assert_eq!(runtime.create_calls(), 0);
    }

    #[test]
    fn test_package_batch_is_all_or_nothing() {
        let runtime = FakeRuntime::new();
        let packages = FakePackages::new()
            .with_installed(vec![ObservedPackage::new("bash", "5.2.026-2")])
            .with_remote(vec![
                ObservedPackage::new("bash", "5.2.037-1"),
                ObservedPackage::new("htop", "3.3.0-1"),
            ])
            .fail_at(FailAt::Commit);
        let executor = Executor::new(&runtime, &packages, NET);

        let plan = differ::diff_packages(
            &[PackageSpec::new("bash"), PackageSpec::new("htop")],
            &packages.installed(),
            &packages.remote(),
        );
        assert_eq!(plan.summary().changes(), 2);

        let entries: Vec<&PlanEntry> = plan.iter().collect();
        let outcome = executor.apply(
            &CallContext::new(),
            ResourceKind::Package,
            &entries,
            &mut NoProgress,
        );

        assert!(outcome.results.iter().all(|r| !r.succeeded));
        match outcome.error {
            Some(Error::TransactionFailed { entry, .. }) => assert_eq!(entry, "bash"),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            packages.installed(),
            vec![ObservedPackage::new("bash", "5.2.026-2")]
        );
        assert!(!packages.is_locked());
    }

    #[test]
    fn test_package_batch_commits() {
        let runtime = FakeRuntime::new();
        let packages = FakePackages::new().with_remote(vec![ObservedPackage::new("htop", "3.3.0-1")]);
        let executor = Executor::new(&runtime, &packages, NET);

        let plan = differ::diff_packages(&[PackageSpec::new("htop")], &[], &packages.remote());
        assert_eq!(plan.entries()[0].action, Action::Create);

        let entries: Vec<&PlanEntry> = plan.iter().collect();
        let outcome = executor.apply(
            &CallContext::new(),
            ResourceKind::Package,
            &entries,
            &mut NoProgress,
        );

        assert!(outcome.error.is_none());
        assert!(outcome.results[0].succeeded);
        assert_eq!(packages.installed(), vec![ObservedPackage::new("htop", "3.3.0-1")]);
    }

    #[test]
    fn test_package_target_pins_winning_repository() {
        let runtime = FakeRuntime::new();
        let packages = FakePackages::new()
            .with_installed(vec![ObservedPackage::new("bash", "5.2.037-1")])
            .with_remote(vec![
                ObservedPackage::new("bash", "5.2.037-1").from_repository("core"),
                ObservedPackage::new("bash", "5.2.037-2").from_repository("testing"),
            ]);
        let executor = Executor::new(&runtime, &packages, NET);
        let ctx = CallContext::new();

        let names = vec!["bash".to_string()];
        let remote = observer::list_remote_packages(&packages, &ctx, &names).unwrap();
        let plan = differ::diff_packages(&[PackageSpec::new("bash")], &packages.installed(), &remote);
        assert_eq!(plan.entries()[0].action, Action::Upgrade);
        assert_eq!(plan.entries()[0].source.as_deref(), Some("testing"));

        let entries: Vec<&PlanEntry> = plan.iter().collect();
        let outcome = executor.apply(&ctx, ResourceKind::Package, &entries, &mut NoProgress);

        assert!(outcome.error.is_none());
        assert!(packages.events().contains(&"stage testing/bash".to_string()));
        assert_eq!(
            packages.installed(),
            vec![ObservedPackage::new("bash", "5.2.037-2")]
        );
    }

    fn cancelled_package_batch(at: FailAt) {
        let runtime = FakeRuntime::new();
        let token = CancelToken::new();
        let packages = FakePackages::new()
            .with_remote(vec![
                ObservedPackage::new("git", "2.47.0-1"),
                ObservedPackage::new("htop", "3.3.0-1"),
            ])
            .cancelling_at(at, token.clone());
        let executor = Executor::new(&runtime, &packages, NET);

        let plan = differ::diff_packages(
            &[PackageSpec::new("git"), PackageSpec::new("htop")],
            &[],
            &packages.remote(),
        );
        let entries: Vec<&PlanEntry> = plan.iter().collect();
        let outcome = executor.apply(
            &CallContext::with_cancel(token),
            ResourceKind::Package,
            &entries,
            &mut NoProgress,
        );

        assert!(matches!(outcome.error, Some(Error::Cancelled)));
        assert!(outcome
            .results
            .iter()
            .all(|r| !r.succeeded && r.error_kind == Some(ErrorKind::Cancelled)));

        let events = packages.events();
        assert!(!events.iter().any(|e| e == "commit"));
        assert_eq!(events.last().map(String::as_str), Some("release"));
        assert!(!packages.is_locked());
        assert!(packages.installed().is_empty());
    }

    #[test]
    fn test_cancel_during_stage_releases_without_commit() {
        cancelled_package_batch(FailAt::StageOf("git".to_string()));
    }

    #[test]
    fn test_cancel_during_prepare_releases_without_commit() {
        cancelled_package_batch(FailAt::Prepare);
    }

    #[test]
    fn test_cancel_after_first_container() {
        let token = CancelToken::new();
        let runtime = FakeRuntime::new()
            .with_network(NET)
            .cancelling_after_create(token.clone());
        let packages = FakePackages::new();
        let executor = Executor::new(&runtime, &packages, NET);

        let plan = container_plan(&[
            ContainerSpec::new("a", "img:a"),
            ContainerSpec::new("b", "img:b"),
            ContainerSpec::new("c", "img:c"),
        ]);
        let entries: Vec<&PlanEntry> = plan.iter().collect();
        let outcome = executor.apply(
            &CallContext::with_cancel(token),
            ResourceKind::Container,
            &entries,
            &mut NoProgress,
        );

        let succeeded: Vec<bool> = outcome.results.iter().map(|r| r.succeeded).collect();
        assert_eq!(succeeded, vec![true, false, false]);
        assert_eq!(outcome.results[2].error_kind, Some(ErrorKind::Cancelled));
        assert_eq!(outcome.error.map(|e| e.kind()), Some(ErrorKind::Cancelled));
        assert_eq!(runtime.container_names(), vec!["a"]);
        assert_eq!(runtime.create_calls(), 1);
    }
}
