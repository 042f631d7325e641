//! Core types for host resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A container as reported by `docker container inspect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Full container id
    pub id: String,
    /// Container name, without the leading slash
    pub name: String,
    /// Image reference the container was created from
    pub image: String,
    /// Resolved image id (`sha256:...`)
    pub image_id: String,
    /// Whether the container is running
    pub running: bool,
    /// Runtime status (`running`, `exited`, `created`, ...)
    pub status: String,
    /// Creation time, if the runtime reported a parseable one
    pub created: Option<DateTime<Utc>>,
    /// Container labels
    pub labels: HashMap<String, String>,
}

/// A network as reported by `docker network ls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Full network id
    pub id: String,
    /// Network name
    pub name: String,
    /// Network driver (`bridge`, `overlay`, ...)
    pub driver: String,
    /// Network labels
    pub labels: HashMap<String, String>,
}

/// Options for creating a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerOptions {
    /// Container name
    pub name: String,
    /// Image reference
    pub image: String,
    /// Network to attach to
    pub network: Option<String>,
    /// Labels to stamp on the container
    pub labels: BTreeMap<String, String>,
}

/// A package, either installed or offered by a sync repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package name
    pub name: String,
    /// Full version (`[epoch:]pkgver-pkgrel`)
    pub version: String,
    /// Sync repository; `None` for the local database
    pub repository: Option<String>,
}

impl PackageInfo {
    /// Create an installed package entry.
    pub fn installed(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            repository: None,
        }
    }

    /// Create a sync repository entry.
    pub fn remote(
        repository: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            repository: Some(repository.into()),
        }
    }
}
