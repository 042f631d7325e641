//! Resource identity - the join key between desired and observed state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of resource managed by the engine
///
/// The derived ordering is the apply order: networks must exist before the
/// containers attached to them, and packages come last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Network,
    Container,
    Package,
}

impl ResourceKind {
    /// All kinds, in apply order
    pub const APPLY_ORDER: [ResourceKind; 3] = [Self::Network, Self::Container, Self::Package];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Container => "container",
            Self::Package => "package",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(kind, name)` pair uniquely identifying a resource
///
/// No other field participates in matching desired against observed state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceIdentity {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn container(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Container, name)
    }

    pub fn network(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Network, name)
    }

    pub fn package(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Package, name)
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_order_matches_apply_order() {
        let mut kinds = vec![
            ResourceKind::Package,
            ResourceKind::Container,
            ResourceKind::Network,
        ];
        kinds.sort();
        assert_eq!(kinds, ResourceKind::APPLY_ORDER.to_vec());
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(ResourceIdentity::container("web").to_string(), "container/web");
        assert_eq!(ResourceIdentity::package("bash").to_string(), "package/bash");
    }

    #[test]
    fn test_same_name_different_kind_is_distinct() {
        assert_ne!(
            ResourceIdentity::container("web"),
            ResourceIdentity::network("web")
        );
    }
}
