//! Differ - desired state against observed state
//!
//! Pure functions: identical inputs always give an identical plan. Entries
//! follow the desired-state order of each kind. Identity is the only join
//! key; nothing else about a resource is matched.

use crate::ownership::Owner;
use crate::types::{
    Action, ContainerSpec, DesiredResource, DesiredState, NetworkSpec, ObservedContainer,
    ObservedNetwork, ObservedPackage, PackageSpec, Plan, PlanEntry,
};
use crate::version;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Live state read for one diff
#[derive(Debug, Clone, Default)]
pub struct Observation {
    /// Every container, stopped ones included
    pub containers: Vec<ObservedContainer>,
    pub networks: Vec<ObservedNetwork>,
    pub installed: Vec<ObservedPackage>,
    /// Best remote candidate per name
    pub remote: Vec<ObservedPackage>,
}

/// Diff every kind, in apply order
pub fn diff(desired: &DesiredState, observed: &Observation) -> Plan {
    let mut plan = diff_networks(&desired.networks, &observed.networks);
    plan.extend(diff_containers(&desired.containers, &observed.containers));
    plan.extend(diff_packages(
        &desired.packages,
        &observed.installed,
        &observed.remote,
    ));
    plan
}

/// Networks carry no ownership check: existence is all that matters
pub fn diff_networks(desired: &[NetworkSpec], observed: &[ObservedNetwork]) -> Plan {
    let existing: HashSet<&str> = observed.iter().map(|n| n.name.as_str()).collect();

    last_wins(desired, |n| n.name.clone())
        .into_iter()
        .map(|spec| {
            let resource = DesiredResource::Network(spec.clone());
            if existing.contains(spec.name.as_str()) {
                PlanEntry::new(resource, Action::Noop, "network exists")
            } else {
                PlanEntry::new(resource, Action::Create, "network not found")
            }
        })
        .collect()
}

pub fn diff_containers(desired: &[ContainerSpec], observed: &[ObservedContainer]) -> Plan {
    let mut owned: HashMap<&str, &ObservedContainer> = HashMap::new();
    let mut foreign: HashMap<&str, &Owner> = HashMap::new();
    for container in observed {
        if container.owner.is_managed() {
            owned.insert(container.name.as_str(), container);
        } else {
            foreign.insert(container.name.as_str(), &container.owner);
        }
    }

    last_wins(desired, |c| c.name.clone())
        .into_iter()
        .map(|spec| {
            let resource = DesiredResource::Container(spec.clone());
            let name = spec.name.as_str();

            if let Some(existing) = owned.get(name) {
                // Stopped is still converged; start/stop is not reconciled
                let reason = if existing.running {
                    "container exists"
                } else {
                    "container exists (stopped)"
                };
                return PlanEntry::new(resource, Action::Noop, reason);
            }
            if let Some(owner) = foreign.get(name) {
                return PlanEntry::new(
                    resource,
                    Action::Unresolved,
                    format!(
                        "name held by a container not managed here (managed-by: {})",
                        owner.label_value()
                    ),
                );
            }
            if spec.image.trim().is_empty() {
                return PlanEntry::new(resource, Action::Unresolved, "no image reference");
            }
            PlanEntry::new(resource, Action::Create, "container not found")
        })
        .collect()
}

pub fn diff_packages(
    desired: &[PackageSpec],
    installed: &[ObservedPackage],
    remote: &[ObservedPackage],
) -> Plan {
    let installed: HashMap<&str, &ObservedPackage> =
        installed.iter().map(|p| (p.name.as_str(), p)).collect();
    let remote: HashMap<&str, &ObservedPackage> =
        remote.iter().map(|p| (p.name.as_str(), p)).collect();

    last_wins(desired, |p| p.name.clone())
        .into_iter()
        .map(|spec| {
            let name = spec.name.as_str();
            diff_package(
                spec,
                installed.get(name).copied(),
                remote.get(name).copied(),
            )
        })
        .collect()
}

fn diff_package(
    spec: &PackageSpec,
    installed: Option<&ObservedPackage>,
    remote: Option<&ObservedPackage>,
) -> PlanEntry {
    let resource = DesiredResource::Package(spec.clone());
    let minimum = spec.min_version.as_deref();
    let meets_minimum = |v: &str| minimum.is_none_or(|min| version::satisfies(v, min));

    match (installed, remote) {
        (None, None) => PlanEntry::new(
            resource,
            Action::Unresolved,
            "not installed and not in any repository",
        ),
        (None, Some(candidate)) => {
            if meets_minimum(&candidate.version) {
                PlanEntry::new(resource, Action::Create, "not installed").with_candidate(candidate)
            } else {
                below_minimum(resource, &candidate.version, minimum)
            }
        }
        (Some(local), Some(candidate)) if version::is_newer(&candidate.version, &local.version) => {
            if meets_minimum(&candidate.version) {
                PlanEntry::new(
                    resource,
                    Action::Upgrade,
                    format!("{} -> {}", local.version, candidate.version),
                )
                .with_candidate(candidate)
            } else {
                below_minimum(resource, &candidate.version, minimum)
            }
        }
        (Some(local), _) if !meets_minimum(&local.version) => {
            below_minimum(resource, &local.version, minimum)
        }
        (Some(local), _) => {
            PlanEntry::new(resource, Action::Noop, "up to date").with_version(&local.version)
        }
    }
}

fn below_minimum(resource: DesiredResource, best: &str, minimum: Option<&str>) -> PlanEntry {
    PlanEntry::new(
        resource,
        Action::Unresolved,
        format!(
            "best available {best} is below required {}",
            minimum.unwrap_or_default()
        ),
    )
}

/// Collapse duplicates: the last declaration wins and keeps its position
fn last_wins<T, K, F>(items: &[T], key: F) -> Vec<&T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let last: HashMap<K, usize> = items
        .iter()
        .enumerate()
        .map(|(idx, item)| (key(item), idx))
        .collect();

    items
        .iter()
        .enumerate()
        .filter(|(idx, item)| last.get(&key(item)) == Some(idx))
        .map(|(_, item)| item)
        .collect()
}
