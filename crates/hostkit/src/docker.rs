//! Container runtime backend using the `docker` CLI.

use crate::error::{Error, Result};
use crate::process::{self, Output};
use crate::types::{ContainerInfo, ContainerOptions, NetworkInfo};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;

/// Backend that executes real `docker` commands.
#[derive(Debug, Clone)]
pub struct Docker {
    /// Path or name of the docker executable
    bin: String,
}

impl Default for Docker {
    fn default() -> Self {
        Self::new()
    }
}

impl Docker {
    /// Create a backend using `docker` from `PATH`.
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Create a backend using a specific docker executable.
    pub fn with_binary(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Check if the docker daemon answers.
    pub fn is_available(&self) -> bool {
        self.run(&["version", "--format", "{{.Server.Version}}"], None)
            .is_ok_and(|out| out.success)
    }

    /// Run a docker command and return its output.
    fn run(&self, args: &[&str], interrupt: Option<&AtomicBool>) -> Result<Output> {
        process::run(&self.bin, &process::args(args.iter().copied()), interrupt)
    }

    /// Run a docker command and check for success.
    fn run_checked(
        &self,
        args: &[&str],
        subject: Option<&str>,
        interrupt: Option<&AtomicBool>,
    ) -> Result<String> {
        let output = self.run(args, interrupt)?;
        if !output.success {
            return Err(Error::from_docker_output(&output.stderr, subject));
        }
        Ok(output.stdout)
    }

    // =========================================================================
    // Containers
    // =========================================================================

    /// List containers, stopped ones included when `all` is set.
    pub fn list_containers(
        &self,
        all: bool,
        interrupt: Option<&AtomicBool>,
    ) -> Result<Vec<ContainerInfo>> {
        let mut args = vec!["container", "ls", "--quiet", "--no-trunc"];
        if all {
            args.push("--all");
        }
        let ids = self.run_checked(&args, None, interrupt)?;
        let ids: Vec<&str> = ids.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec!["container", "inspect"];
        args.extend(ids);
        let json = self.run_checked(&args, None, interrupt)?;
        parse_inspect(&json)
    }

    /// Create a container and start it, returning its id.
    pub fn run_container(
        &self,
        options: &ContainerOptions,
        interrupt: Option<&AtomicBool>,
    ) -> Result<String> {
        let labels = label_args(&options.labels);
        let mut args = vec!["container", "create", "--name", options.name.as_str()];
        if let Some(network) = &options.network {
            args.extend(["--network", network.as_str()]);
        }
        for label in &labels {
            args.extend(["--label", label.as_str()]);
        }
        args.push(options.image.as_str());

        let stdout = self.run_checked(&args, Some(&options.name), interrupt)?;
        let id = last_line(&stdout)?;
        log::debug!("Created container {} ({id})", options.name);

        self.start_container(&id, interrupt)?;
        Ok(id)
    }

    /// Start a container by name or id.
    pub fn start_container(&self, container: &str, interrupt: Option<&AtomicBool>) -> Result<()> {
        self.run_checked(&["container", "start", container], Some(container), interrupt)?;
        Ok(())
    }

    /// Stop a container by name or id.
    pub fn stop_container(&self, container: &str, interrupt: Option<&AtomicBool>) -> Result<()> {
        self.run_checked(&["container", "stop", container], Some(container), interrupt)?;
        Ok(())
    }

    /// Remove a container by name or id.
    pub fn remove_container(
        &self,
        container: &str,
        force: bool,
        interrupt: Option<&AtomicBool>,
    ) -> Result<()> {
        let mut args = vec!["container", "rm"];
        if force {
            args.push("--force");
        }
        args.push(container);
        self.run_checked(&args, Some(container), interrupt)?;
        Ok(())
    }

    // =========================================================================
    // Networks
    // =========================================================================

    /// List all networks.
    pub fn list_networks(&self, interrupt: Option<&AtomicBool>) -> Result<Vec<NetworkInfo>> {
        let stdout = self.run_checked(
            &["network", "ls", "--no-trunc", "--format", "{{json .}}"],
            None,
            interrupt,
        )?;
        parse_network_lines(&stdout)
    }

    /// Create a network, returning its id.
    pub fn create_network(
        &self,
        name: &str,
        labels: &BTreeMap<String, String>,
        interrupt: Option<&AtomicBool>,
    ) -> Result<String> {
        let labels = label_args(labels);
        let mut args = vec!["network", "create"];
        for label in &labels {
            args.extend(["--label", label.as_str()]);
        }
        args.push(name);

        let stdout = self.run_checked(&args, Some(name), interrupt)?;
        last_line(&stdout)
    }
}

fn label_args(labels: &BTreeMap<String, String>) -> Vec<String> {
    labels.iter().map(|(k, v)| format!("{k}={v}")).collect()
}

/// Docker prints pull progress before the id; the id is the last line
fn last_line(stdout: &str) -> Result<String> {
    stdout
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Parse {
            message: "docker printed no id".to_string(),
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectContainer {
    id: String,
    name: String,
    created: String,
    image: String,
    state: InspectState,
    config: InspectConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    running: bool,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    image: String,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
}

/// Parse `docker container inspect` output.
fn parse_inspect(json: &str) -> Result<Vec<ContainerInfo>> {
    let containers: Vec<InspectContainer> = serde_json::from_str(json)?;
    Ok(containers
        .into_iter()
        .map(|c| ContainerInfo {
            id: c.id,
            name: c.name.trim_start_matches('/').to_string(),
            image: c.config.image,
            image_id: c.image,
            running: c.state.running,
            status: c.state.status,
            created: parse_created(&c.created),
            labels: c.config.labels.unwrap_or_default(),
        })
        .collect())
}

/// Docker reports the zero time for containers it never recorded
fn parse_created(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
        .filter(|t| t.timestamp() > 0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkLine {
    #[serde(rename = "ID")]
    id: String,
    name: String,
    #[serde(default)]
    driver: String,
    #[serde(default)]
    labels: String,
}

/// Parse `docker network ls --format '{{json .}}'` output (one object per line).
fn parse_network_lines(stdout: &str) -> Result<Vec<NetworkInfo>> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let net: NetworkLine = serde_json::from_str(line)?;
            Ok(NetworkInfo {
                id: net.id,
                name: net.name,
                driver: net.driver,
                labels: parse_label_string(&net.labels),
            })
        })
        .collect()
}

/// Parse the `k=v,k2=v2` label rendering used by `docker ... ls`.
fn parse_label_string(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = k.trim();
            (!k.is_empty()).then(|| (k.to_string(), v.trim().to_string()))
        })
        .collect()
}
