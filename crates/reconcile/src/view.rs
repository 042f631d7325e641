//! Display rows for containers and package candidates

use crate::types::{ObservedContainer, ObservedPackage};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Length of the displayed container id prefix
pub const SHORT_ID_LEN: usize = 12;

/// A container as shown to users
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerView {
    pub id: String,
    pub name: String,
    pub image: String,
    pub image_id: String,
    pub uptime: String,
    pub managed_by: String,
    pub running: bool,
}

impl ContainerView {
    pub fn from_observed(container: &ObservedContainer, now: DateTime<Utc>) -> Self {
        Self {
            id: short_id(&container.id),
            name: container.name.clone(),
            image: container.image.clone(),
            image_id: container.image_id.clone(),
            uptime: uptime_bucket(container.created, now),
            managed_by: container.owner.label_value().to_string(),
            running: container.running,
        }
    }

    pub fn status(&self) -> &'static str {
        if self.running { "running" } else { "stopped" }
    }

    pub fn is_managed(&self) -> bool {
        self.managed_by == crate::ownership::LABEL_VALUE
    }
}

/// Which containers a listing shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerFilter {
    /// Include stopped containers
    pub all: bool,
    /// Only containers carrying the hivekeep label
    pub managed_only: bool,
}

/// One repository's offer of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageCandidate {
    pub name: String,
    pub repository: String,
    pub version: String,
    /// The candidate a plan would install
    pub selected: bool,
    /// Locally installed version, if any
    pub installed: Option<String>,
}

impl PackageCandidate {
    pub fn new(candidate: &ObservedPackage, selected: bool, installed: Option<&str>) -> Self {
        Self {
            name: candidate.name.clone(),
            repository: candidate.repository.clone().unwrap_or_default(),
            version: candidate.version.clone(),
            selected,
            installed: installed.map(str::to_string),
        }
    }
}

/// First [`SHORT_ID_LEN`] characters of an id, without any `sha256:` prefix
pub fn short_id(id: &str) -> String {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    id.chars().take(SHORT_ID_LEN).collect()
}

/// Coarse age: `<1 minute`, `N minutes`, `N hours` or `N days`
pub fn uptime_bucket(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created) = created else {
        return "unknown".to_string();
    };

    let elapsed = now.signed_duration_since(created);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "<1 minute".to_string()
    } else if hours < 1 {
        format!("{minutes} minutes")
    } else if days < 1 {
        format!("{hours} hours")
    } else {
        format!("{days} days")
    }
}
