//! Observers - read-only queries of live state
//!
//! State is read fresh on every call and never cached. Any failure makes
//! the observation for that kind fail as a whole; there is no fallback to
//! partial data.

use crate::backend::{ContainerRuntime, PackageBackend};
use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::types::{ObservedContainer, ObservedNetwork, ObservedPackage};
use crate::version;
use std::cmp::Ordering;
use std::collections::HashMap;

const RUNTIME: &str = "container runtime";
const PACKAGES: &str = "package database";

pub fn list_containers(
    runtime: &dyn ContainerRuntime,
    ctx: &CallContext,
    include_stopped: bool,
) -> Result<Vec<ObservedContainer>> {
    ctx.checkpoint()?;
    let containers = runtime
        .list_containers(ctx, include_stopped)
        .map_err(|e| Error::from_backend(RUNTIME, ctx, e))?;
    log::debug!("Observed {} containers", containers.len());
    Ok(containers)
}

pub fn list_networks(
    runtime: &dyn ContainerRuntime,
    ctx: &CallContext,
) -> Result<Vec<ObservedNetwork>> {
    ctx.checkpoint()?;
    let networks = runtime
        .list_networks(ctx)
        .map_err(|e| Error::from_backend(RUNTIME, ctx, e))?;
    log::debug!("Observed {} networks", networks.len());
    Ok(networks)
}

pub fn list_installed_packages(
    backend: &dyn PackageBackend,
    ctx: &CallContext,
) -> Result<Vec<ObservedPackage>> {
    ctx.checkpoint()?;
    let installed = backend
        .list_installed(ctx)
        .map_err(|e| Error::from_backend(PACKAGES, ctx, e))?;
    log::debug!("Observed {} installed packages", installed.len());
    Ok(installed)
}

/// Every repository candidate for `names`, in backend order
pub fn list_package_candidates(
    backend: &dyn PackageBackend,
    ctx: &CallContext,
    names: &[String],
) -> Result<Vec<ObservedPackage>> {
    ctx.checkpoint()?;
    if names.is_empty() {
        return Ok(Vec::new());
    }
    backend
        .list_remote(ctx, names)
        .map_err(|e| Error::from_backend(PACKAGES, ctx, e))
}

/// Best remote candidate per requested name
///
/// When several repositories offer the same name, the highest version wins;
/// on equal versions the first repository listed wins. Output follows the
/// order of `names`; unknown names are left out.
pub fn list_remote_packages(
    backend: &dyn PackageBackend,
    ctx: &CallContext,
    names: &[String],
) -> Result<Vec<ObservedPackage>> {
    let candidates = list_package_candidates(backend, ctx, names)?;

    let best = highest_by_name(candidates);
    let resolved: Vec<ObservedPackage> = names
        .iter()
        .filter_map(|name| best.get(name).cloned())
        .collect();

    log::debug!(
        "Resolved {} of {} packages in remote repositories",
        resolved.len(),
        names.len()
    );
    Ok(resolved)
}

/// Keep the highest version of every package name
pub(crate) fn highest_by_name(
    candidates: impl IntoIterator<Item = ObservedPackage>,
) -> HashMap<String, ObservedPackage> {
    let mut best: HashMap<String, ObservedPackage> = HashMap::new();
    for candidate in candidates {
        match best.get(&candidate.name) {
            Some(current)
                if version::compare(&candidate.version, &current.version)
                    != Ordering::Greater => {}
            _ => {
                best.insert(candidate.name.clone(), candidate);
            }
        }
    }
    best
}
