//! Core types: desired state, observed state, plans and apply results

use crate::error::{Error, ErrorKind, Result};
use crate::identity::{ResourceIdentity, ResourceKind};
use crate::ownership::Owner;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Desired state
// ============================================================================

/// A container as declared in the desired-state document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name; derived from the image when omitted
    #[serde(default)]
    pub name: String,
    pub image: String,
    /// Network to attach to; the engine default when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            network: None,
        }
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }
}

/// A network as declared in the desired-state document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
}

/// A package to keep installed, with an optional minimum version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_version: None,
        }
    }

    pub fn at_least(mut self, version: impl Into<String>) -> Self {
        self.min_version = Some(version.into());
        self
    }
}

/// Parses `name` or `name>=version`
impl FromStr for PackageSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (name, min_version) = match s.split_once(">=") {
            Some((name, version)) => (name.trim(), Some(version.trim())),
            None => (s, None),
        };

        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(Error::Document {
                message: format!("invalid package name in '{s}'"),
            });
        }
        if min_version.is_some_and(str::is_empty) {
            return Err(Error::Document {
                message: format!("missing version after '>=' in '{s}'"),
            });
        }

        Ok(Self {
            name: name.to_string(),
            min_version: min_version.map(str::to_string),
        })
    }
}

/// One desired resource of any kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DesiredResource {
    Container(ContainerSpec),
    Network(NetworkSpec),
    Package(PackageSpec),
}

impl DesiredResource {
    pub fn identity(&self) -> ResourceIdentity {
        match self {
            Self::Container(c) => ResourceIdentity::container(&c.name),
            Self::Network(n) => ResourceIdentity::network(&n.name),
            Self::Package(p) => ResourceIdentity::package(&p.name),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Container(_) => ResourceKind::Container,
            Self::Network(_) => ResourceKind::Network,
            Self::Package(_) => ResourceKind::Package,
        }
    }
}

/// The declarative document: `containers` and `networks`
///
/// `containers` is always written, even when empty, so an export of an
/// empty system reads back as an explicit empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredDocument {
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkSpec>,
}

impl DesiredDocument {
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty file is an empty document
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| Error::Document {
            message: e.to_string(),
        })
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::Document {
            message: e.to_string(),
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Document {
            message: e.to_string(),
        })
    }

    /// Validate names and fill in container names derived from images
    pub fn normalize(mut self) -> Result<Self> {
        for container in &mut self.containers {
            if container.name.trim().is_empty() {
                container.name = derive_container_name(&container.image).ok_or_else(|| {
                    Error::Document {
                        message: "container without name or image".to_string(),
                    }
                })?;
            }
        }
        if let Some(network) = self.networks.iter().find(|n| n.name.trim().is_empty()) {
            return Err(Error::Document {
                message: format!("network with empty name: {network:?}"),
            });
        }
        Ok(self)
    }
}

/// Derive a container name from an image reference
///
/// `ghcr.io/org/app:1.2` becomes `app`, `nginx@sha256:..` becomes `nginx`.
pub fn derive_container_name(image: &str) -> Option<String> {
    let repo = image.split('@').next()?;
    let last = repo.rsplit('/').next()?;
    let name = last.split(':').next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Desired state for one reconciliation pass
///
/// Immutable once loaded. Packages come from a separate plain list rather
/// than the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    pub networks: Vec<NetworkSpec>,
    pub containers: Vec<ContainerSpec>,
    pub packages: Vec<PackageSpec>,
}

impl DesiredState {
    pub fn from_document(document: DesiredDocument, packages: Vec<PackageSpec>) -> Result<Self> {
        let document = document.normalize()?;
        Ok(Self {
            networks: document.networks,
            containers: document.containers,
            packages,
        })
    }

    pub fn packages_only(packages: Vec<PackageSpec>) -> Self {
        Self {
            packages,
            ..Self::default()
        }
    }

    /// Whether anything of `kind` is declared
    pub fn declares(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Network => !self.networks.is_empty(),
            ResourceKind::Container => !self.containers.is_empty(),
            ResourceKind::Package => !self.packages.is_empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        ResourceKind::APPLY_ORDER.iter().all(|k| !self.declares(*k))
    }
}

// ============================================================================
// Observed state
// ============================================================================

/// A container as read from the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub image_id: String,
    pub running: bool,
    pub created: Option<DateTime<Utc>>,
    pub owner: Owner,
}

/// A network as read from the runtime (existence only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedNetwork {
    pub id: String,
    pub name: String,
}

/// A package, installed locally or offered by a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedPackage {
    pub name: String,
    pub version: String,
    /// Source repository; `None` for the local database
    pub repository: Option<String>,
}

impl ObservedPackage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            repository: None,
        }
    }

    pub fn from_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    /// `repository/name`, or the bare name for local packages
    pub fn qualified_name(&self) -> String {
        match &self.repository {
            Some(repo) => format!("{repo}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// One observed resource of any kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ObservedResource {
    Container(ObservedContainer),
    Network(ObservedNetwork),
    Package(ObservedPackage),
}

impl ObservedResource {
    pub fn identity(&self) -> ResourceIdentity {
        match self {
            Self::Container(c) => ResourceIdentity::container(&c.name),
            Self::Network(n) => ResourceIdentity::network(&n.name),
            Self::Package(p) => ResourceIdentity::package(&p.name),
        }
    }
}

// ============================================================================
// Plans
// ============================================================================

/// What the executor will do for one desired resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Upgrade,
    Noop,
    /// No source can satisfy the resource; needs manual intervention
    Unresolved,
}

impl Action {
    /// Whether applying this action changes live state
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Create | Self::Upgrade)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Upgrade => "upgrade",
            Self::Noop => "noop",
            Self::Unresolved => "unresolved",
        };
        f.write_str(s)
    }
}

/// One planned action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub resource: DesiredResource,
    pub action: Action,
    pub reason: String,
    /// Target version for package creates/upgrades, installed version otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Repository the target version comes from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl PlanEntry {
    pub fn new(resource: DesiredResource, action: Action, reason: impl Into<String>) -> Self {
        Self {
            resource,
            action,
            reason: reason.into(),
            version: None,
            source: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Take version and repository from the chosen candidate
    pub fn with_candidate(mut self, candidate: &ObservedPackage) -> Self {
        self.version = Some(candidate.version.clone());
        self.source.clone_from(&candidate.repository);
        self
    }

    /// The package this entry installs, pinned to the planned repository
    pub fn package_target(&self) -> Option<ObservedPackage> {
        match &self.resource {
            DesiredResource::Package(spec) => Some(ObservedPackage {
                name: spec.name.clone(),
                version: self.version.clone().unwrap_or_default(),
                repository: self.source.clone(),
            }),
            _ => None,
        }
    }

    pub fn identity(&self) -> ResourceIdentity {
        self.resource.identity()
    }

    pub fn kind(&self) -> ResourceKind {
        self.resource.kind()
    }
}

/// Ordered list of planned actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Plan {
    entries: Vec<PlanEntry>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PlanEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, other: Plan) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of one kind, in plan order
    pub fn of_kind(&self, kind: ResourceKind) -> Vec<&PlanEntry> {
        self.entries.iter().filter(|e| e.kind() == kind).collect()
    }

    /// Entries that will change live state
    pub fn changes(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.action.is_change())
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries
            .iter()
            .filter(|e| e.action == Action::Unresolved)
    }

    /// True when every entry is a no-op
    pub fn is_converged(&self) -> bool {
        self.entries.iter().all(|e| e.action == Action::Noop)
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for entry in &self.entries {
            match entry.action {
                Action::Create => summary.create += 1,
                Action::Upgrade => summary.upgrade += 1,
                Action::Noop => summary.noop += 1,
                Action::Unresolved => summary.unresolved += 1,
            }
        }
        summary
    }
}

impl FromIterator<PlanEntry> for Plan {
    fn from_iter<I: IntoIterator<Item = PlanEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Plan statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub create: usize,
    pub upgrade: usize,
    pub noop: usize,
    pub unresolved: usize,
}

impl PlanSummary {
    pub fn changes(&self) -> usize {
        self.create + self.upgrade
    }
}

// ============================================================================
// Apply results
// ============================================================================

/// Outcome of applying one plan entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    pub identity: ResourceIdentity,
    pub action: Action,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ApplyResult {
    pub fn succeeded(entry: &PlanEntry) -> Self {
        Self {
            identity: entry.identity(),
            action: entry.action,
            succeeded: true,
            error: None,
            error_kind: None,
        }
    }

    pub fn failed(entry: &PlanEntry, error: &Error) -> Self {
        Self {
            identity: entry.identity(),
            action: entry.action,
            succeeded: false,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }
}

/// Everything a reconciliation call produced
///
/// Per-entry results are always returned alongside any errors.
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub plan: Plan,
    pub results: Vec<ApplyResult>,
    pub errors: Vec<Error>,
}

impl Reconciliation {
    /// The first error, if any
    pub fn error(&self) -> Option<&Error> {
        self.errors.first()
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ApplyResult> {
        self.results.iter().filter(|r| !r.succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_spec_parse() {
        let plain: PackageSpec = "htop".parse().unwrap();
        assert_eq!(plain, PackageSpec::new("htop"));

        let pinned: PackageSpec = "docker >= 1:25.0".parse().unwrap();
        assert_eq!(pinned, PackageSpec::new("docker").at_least("1:25.0"));
    }

    #[test]
    fn test_package_spec_rejects_garbage() {
        assert!("".parse::<PackageSpec>().is_err());
        assert!("two words".parse::<PackageSpec>().is_err());
        assert!("bash>=".parse::<PackageSpec>().is_err());
    }

    #[test]
    fn test_derive_container_name() {
        assert_eq!(derive_container_name("nginx:latest").as_deref(), Some("nginx"));
        assert_eq!(
            derive_container_name("ghcr.io/org/app:1.2").as_deref(),
            Some("app")
        );
        assert_eq!(
            derive_container_name("redis@sha256:abcd").as_deref(),
            Some("redis")
        );
        assert_eq!(derive_container_name(""), None);
    }

    #[test]
    fn test_document_parse_and_normalize() {
        let yaml = r"
containers:
  - name: web
    image: nginx:latest
  - image: ghcr.io/acme/api:2
    network: backend
networks:
  - name: backend
";
        let doc = DesiredDocument::from_yaml(yaml).unwrap().normalize().unwrap();
        assert_eq!(doc.containers[0], ContainerSpec::new("web", "nginx:latest"));
        assert_eq!(doc.containers[1].name, "api");
        assert_eq!(doc.containers[1].network.as_deref(), Some("backend"));
        assert_eq!(doc.networks, vec![NetworkSpec { name: "backend".into() }]);
    }

    #[test]
    fn test_document_rejects_malformed_yaml() {
        let err = DesiredDocument::from_yaml("containers: {name: [").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Document);
    }

    #[test]
    fn test_empty_document_keeps_containers_key() {
        let yaml = DesiredDocument::default().to_yaml().unwrap();
        assert_eq!(yaml.trim(), "containers: []");
    }

    #[test]
    fn test_plan_summary() {
        let plan: Plan = [
            PlanEntry::new(
                DesiredResource::Network(NetworkSpec { name: "n".into() }),
                Action::Noop,
                "exists",
            ),
            PlanEntry::new(
                DesiredResource::Package(PackageSpec::new("bash")),
                Action::Upgrade,
                "newer",
            ),
        ]
        .into_iter()
        .collect();

        let summary = plan.summary();
        assert_eq!(summary.noop, 1);
        assert_eq!(summary.upgrade, 1);
        assert_eq!(summary.changes(), 1);
        assert!(!plan.is_converged());
    }
}
