//! Engine - the reconciliation entry points
//!
//! Each call reads live state fresh, diffs it and, for `reconcile`, applies
//! the changes. Kinds run one after another in apply order (networks,
//! containers, packages); each kind's observe, diff and apply finish before
//! the next kind starts. Nothing is kept between calls.

use crate::backend::{ContainerRuntime, PackageBackend};
use crate::context::{CallContext, NoProgress, ProgressCallback};
use crate::differ;
use crate::error::{ErrorKind, Result};
use crate::executor::Executor;
use crate::exporter;
use crate::identity::ResourceKind;
use crate::observer;
use crate::types::{ContainerSpec, DesiredDocument, DesiredState, Plan, Reconciliation};
use crate::view::{ContainerFilter, ContainerView, PackageCandidate};
use chrono::Utc;
use std::collections::HashMap;

/// Network containers attach to when they declare none
pub const DEFAULT_NETWORK: &str = "hivekeep-network";

pub struct Engine<'a> {
    runtime: &'a dyn ContainerRuntime,
    packages: &'a dyn PackageBackend,
    default_network: String,
}

impl<'a> Engine<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, packages: &'a dyn PackageBackend) -> Self {
        Self {
            runtime,
            packages,
            default_network: DEFAULT_NETWORK.to_string(),
        }
    }

    pub fn with_default_network(mut self, network: impl Into<String>) -> Self {
        self.default_network = network.into();
        self
    }

    pub fn default_network(&self) -> &str {
        &self.default_network
    }

    /// Observe and diff every declared kind without changing anything
    pub fn plan(&self, ctx: &CallContext, desired: &DesiredState) -> Result<Plan> {
        let mut plan = Plan::new();
        for kind in ResourceKind::APPLY_ORDER {
            if desired.declares(kind) {
                plan.extend(self.plan_kind(ctx, desired, kind)?);
            }
        }
        log_plan(&plan);
        Ok(plan)
    }

    pub fn reconcile(&self, ctx: &CallContext, desired: &DesiredState) -> Reconciliation {
        self.reconcile_with_progress(ctx, desired, &mut NoProgress)
    }

    /// Observe, diff and apply each declared kind in turn
    ///
    /// Per-entry results are always returned. An observer failure or a
    /// cancellation stops the kinds not yet processed.
    pub fn reconcile_with_progress(
        &self,
        ctx: &CallContext,
        desired: &DesiredState,
        progress: &mut dyn ProgressCallback,
    ) -> Reconciliation {
        let executor = Executor::new(self.runtime, self.packages, &self.default_network);
        let mut outcome = Reconciliation::default();

        for kind in ResourceKind::APPLY_ORDER {
            if !desired.declares(kind) {
                continue;
            }

            let plan = match self.plan_kind(ctx, desired, kind) {
                Ok(plan) => plan,
                Err(e) => {
                    log::warn!("Could not observe {kind}s: {e}");
                    outcome.errors.push(e);
                    break;
                }
            };
            log_plan(&plan);

            let entries: Vec<_> = plan.iter().collect();
            let batch = executor.apply(ctx, kind, &entries, progress);
            outcome.results.extend(batch.results);
            outcome.plan.extend(plan);

            if let Some(e) = batch.error {
                let cancelled = e.kind() == ErrorKind::Cancelled;
                outcome.errors.push(e);
                if cancelled {
                    break;
                }
            }
        }

        outcome
    }

    fn plan_kind(&self, ctx: &CallContext, desired: &DesiredState, kind: ResourceKind) -> Result<Plan> {
        let plan = match kind {
            ResourceKind::Network => {
                let observed = observer::list_networks(self.runtime, ctx)?;
                differ::diff_networks(&desired.networks, &observed)
            }
            ResourceKind::Container => {
                let observed = observer::list_containers(self.runtime, ctx, true)?;
                differ::diff_containers(&desired.containers, &observed)
            }
            ResourceKind::Package => {
                let names: Vec<String> = desired.packages.iter().map(|p| p.name.clone()).collect();
                let installed = observer::list_installed_packages(self.packages, ctx)?;
                let remote = observer::list_remote_packages(self.packages, ctx, &names)?;
                differ::diff_packages(&desired.packages, &installed, &remote)
            }
        };
        Ok(plan)
    }

    /// Owned containers as desired-state entries, sorted by name
    pub fn export(&self, ctx: &CallContext) -> Result<Vec<ContainerSpec>> {
        let observed = observer::list_containers(self.runtime, ctx, true)?;
        Ok(exporter::export_containers(&observed))
    }

    /// Owned containers as a serialized YAML document
    pub fn export_document(&self, ctx: &CallContext) -> Result<String> {
        let observed = observer::list_containers(self.runtime, ctx, true)?;
        exporter::export_document(&observed).to_yaml()
    }

    /// Parsed counterpart of [`Engine::export_document`]
    pub fn export_desired(&self, ctx: &CallContext) -> Result<DesiredDocument> {
        let observed = observer::list_containers(self.runtime, ctx, true)?;
        Ok(exporter::export_document(&observed))
    }

    /// Containers for display, sorted by name
    pub fn list_containers(
        &self,
        ctx: &CallContext,
        filter: ContainerFilter,
    ) -> Result<Vec<ContainerView>> {
        let now = Utc::now();
        let mut views: Vec<ContainerView> =
            observer::list_containers(self.runtime, ctx, filter.all)?
                .iter()
                .filter(|c| !filter.managed_only || c.owner.is_managed())
                .map(|c| ContainerView::from_observed(c, now))
                .collect();
        views.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(views)
    }

    /// One container by name, running or not, whoever owns it
    pub fn describe_container(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> Result<Option<ContainerView>> {
        let observed = observer::list_containers(self.runtime, ctx, true)?;
        Ok(observed
            .iter()
            .find(|c| c.name == name)
            .map(|c| ContainerView::from_observed(c, Utc::now())))
    }

    /// Every repository candidate for `names`
    ///
    /// The candidate a plan would pick is marked `selected`. Candidates keep
    /// the order of `names`, then the backend's repository order.
    pub fn search_packages(
        &self,
        ctx: &CallContext,
        names: &[String],
    ) -> Result<Vec<PackageCandidate>> {
        let candidates = observer::list_package_candidates(self.packages, ctx, names)?;
        let installed: HashMap<String, String> =
            observer::list_installed_packages(self.packages, ctx)?
                .into_iter()
                .map(|p| (p.name, p.version))
                .collect();
        let best = observer::highest_by_name(candidates.iter().cloned());

        Ok(names
            .iter()
            .flat_map(|name| candidates.iter().filter(move |c| &c.name == name))
            .map(|c| {
                let selected = best
                    .get(&c.name)
                    .is_some_and(|b| b.repository == c.repository);
                PackageCandidate::new(c, selected, installed.get(&c.name).map(String::as_str))
            })
            .collect())
    }
}

fn log_plan(plan: &Plan) {
    for entry in plan.iter() {
        log::debug!("{} {}: {}", entry.action, entry.identity(), entry.reason);
    }
}
