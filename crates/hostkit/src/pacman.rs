//! Package backend using `pacman`.
//!
//! Reads go through `pacman -Q` and `pacman -Si`. Installs are batched into
//! a [`Transaction`]: targets are collected, resolved with `pacman -S
//! --print` (no system change), then installed by a single `pacman -S`
//! invocation, which pacman itself commits atomically.

use crate::error::{Error, Result};
use crate::process::{self, Output};
use crate::types::PackageInfo;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

/// Lock file pacman holds while a transaction runs
pub const LOCK_FILE: &str = "/var/lib/pacman/db.lck";

/// Backend that executes real `pacman` commands.
#[derive(Debug, Clone)]
pub struct Pacman {
    /// Path or name of the pacman executable
    bin: String,
    /// Database lock file
    lock_file: PathBuf,
    /// Run mutating commands through `sudo`
    sudo: bool,
}

impl Default for Pacman {
    fn default() -> Self {
        Self::new()
    }
}

impl Pacman {
    /// Create a backend using `pacman` from `PATH`.
    pub fn new() -> Self {
        Self {
            bin: "pacman".to_string(),
            lock_file: PathBuf::from(LOCK_FILE),
            sudo: false,
        }
    }

    /// Use a specific pacman executable.
    pub fn with_binary(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }

    /// Use a different database lock file.
    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_file = path.into();
        self
    }

    /// Run installs through `sudo`.
    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    /// Lock file checked before a transaction.
    pub fn lock_file(&self) -> &Path {
        &self.lock_file
    }

    /// Whether another process holds the database lock.
    pub fn is_locked(&self) -> bool {
        self.lock_file.exists()
    }

    /// Check if pacman can be executed.
    pub fn is_available(&self) -> bool {
        self.run(vec!["--version".to_string()], None)
            .is_ok_and(|out| out.success)
    }

    fn run(&self, args: Vec<String>, interrupt: Option<&AtomicBool>) -> Result<Output> {
        process::run(&self.bin, &args, interrupt)
    }

    /// Run a pacman command and check for success.
    fn run_checked(
        &self,
        args: Vec<String>,
        subject: Option<&str>,
        interrupt: Option<&AtomicBool>,
    ) -> Result<String> {
        let output = self.run(args, interrupt)?;
        if !output.success {
            return Err(Error::from_pacman_output(
                &output.stderr,
                subject,
                &self.lock_file,
            ));
        }
        Ok(output.stdout)
    }

    /// List installed packages (`pacman -Q`).
    pub fn list_installed(&self, interrupt: Option<&AtomicBool>) -> Result<Vec<PackageInfo>> {
        let stdout = self.run_checked(process::args(["-Q"]), None, interrupt)?;
        parse_query(&stdout)
    }

    /// Sync repository entries for `names` (`pacman -Si`).
    ///
    /// Every repository offering a name contributes one entry. Names no
    /// repository knows are left out rather than failing the call.
    pub fn list_remote(
        &self,
        names: &[String],
        interrupt: Option<&AtomicBool>,
    ) -> Result<Vec<PackageInfo>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = process::args(["-Si"]);
        args.extend(names.iter().cloned());
        let output = self.run(args, interrupt)?;

        // -Si exits non-zero when any name is unknown; only other errors count
        if !output.success && !only_not_found(&output.stderr) {
            return Err(Error::from_pacman_output(
                &output.stderr,
                None,
                &self.lock_file,
            ));
        }
        for line in output.stderr.lines().filter(|l| l.contains("was not found")) {
            log::debug!("{}", line.trim());
        }
        Ok(parse_sync_info(&output.stdout))
    }

    /// Start a transaction.
    ///
    /// Fails fast with [`Error::Locked`] when the database lock is held.
    pub fn transaction(&self) -> Result<Transaction<'_>> {
        if self.is_locked() {
            return Err(Error::Locked {
                path: self.lock_file.clone(),
            });
        }
        Ok(Transaction {
            pacman: self,
            targets: Vec::new(),
            resolved: Vec::new(),
        })
    }
}

/// A batch of packages to install together.
#[derive(Debug)]
pub struct Transaction<'a> {
    pacman: &'a Pacman,
    targets: Vec<String>,
    resolved: Vec<PackageInfo>,
}

impl Transaction<'_> {
    /// Add a target package, pinned to `repository` when given.
    ///
    /// Pinned targets are passed as `repository/name` so pacman installs
    /// that build rather than the first repository's. Adding a name again
    /// replaces its earlier target.
    pub fn add(&mut self, name: &str, repository: Option<&str>) {
        let target = match repository {
            Some(repo) => format!("{repo}/{name}"),
            None => name.to_string(),
        };
        match self.targets.iter_mut().find(|t| target_name(t) == name) {
            Some(existing) => *existing = target,
            None => self.targets.push(target),
        }
    }

    /// Targets added so far.
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Packages the last `prepare` resolved, dependencies included.
    pub fn resolved(&self) -> &[PackageInfo] {
        &self.resolved
    }

    /// Resolve the batch without changing the system.
    ///
    /// Fails when a target is unknown or dependencies cannot be satisfied.
    pub fn prepare(&mut self, interrupt: Option<&AtomicBool>) -> Result<&[PackageInfo]> {
        let mut args = process::args([
            "-S",
            "--print",
            "--print-format",
            "%r %n %v",
            "--noconfirm",
        ]);
        args.extend(self.targets.iter().cloned());

        let stdout = self.pacman.run_checked(args, None, interrupt)?;
        self.resolved = parse_print(&stdout);
        log::debug!(
            "Resolved {} targets to {} packages",
            self.targets.len(),
            self.resolved.len()
        );
        Ok(&self.resolved)
    }

    /// Install the batch with one `pacman -S` invocation.
    ///
    /// Runs without an interrupt flag: once started, pacman is left to finish
    /// its own commit.
    pub fn commit(&mut self) -> Result<()> {
        if self.targets.is_empty() {
            return Ok(());
        }
        if self.pacman.is_locked() {
            return Err(Error::Locked {
                path: self.pacman.lock_file.clone(),
            });
        }

        let mut args = process::args(["-S", "--noconfirm", "--needed"]);
        args.extend(self.targets.iter().cloned());

        let output = if self.pacman.sudo {
            let mut sudo_args = vec![self.pacman.bin.clone()];
            sudo_args.extend(args);
            process::run("sudo", &sudo_args, None)?
        } else {
            self.pacman.run(args, None)?
        };

        if !output.success {
            return Err(Error::from_pacman_output(
                &output.stderr,
                None,
                &self.pacman.lock_file,
            ));
        }
        log::info!("Installed {}", self.targets.join(", "));
        Ok(())
    }
}

/// Package name of a `repository/name` target
fn target_name(target: &str) -> &str {
    target.rsplit_once('/').map_or(target, |(_, name)| name)
}

fn only_not_found(stderr: &str) -> bool {
    stderr
        .lines()
        .filter(|l| !l.trim().is_empty())
        .all(|l| l.contains("was not found"))
}

/// Parse `pacman -Q` output: `name version` per line.
fn parse_query(stdout: &str) -> Result<Vec<PackageInfo>> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(name), Some(version)) => Ok(PackageInfo::installed(name, version)),
                _ => Err(Error::Parse {
                    message: format!("unexpected pacman -Q line: {line}"),
                }),
            }
        })
        .collect()
}

/// Parse `pacman -Si` output: `Key : value` blocks separated by blank lines.
fn parse_sync_info(stdout: &str) -> Vec<PackageInfo> {
    let mut packages = Vec::new();
    let mut repository = None;
    let mut name = None;
    let mut version = None;

    let mut flush = |repository: &mut Option<String>,
                     name: &mut Option<String>,
                     version: &mut Option<String>| {
        if let (Some(r), Some(n), Some(v)) = (repository.take(), name.take(), version.take()) {
            packages.push(PackageInfo::remote(r, n, v));
        }
    };

    for line in stdout.lines() {
        if line.trim().is_empty() {
            flush(&mut repository, &mut name, &mut version);
            continue;
        }
        let Some((key, value)) = line.split_once(" : ") else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "Repository" => repository = Some(value),
            "Name" => name = Some(value),
            "Version" => version = Some(value),
            _ => {}
        }
    }
    flush(&mut repository, &mut name, &mut version);

    packages
}

/// Parse `pacman -S --print-format '%r %n %v'` output.
fn parse_print(stdout: &str) -> Vec<PackageInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(r), Some(n), Some(v)) => Some(PackageInfo::remote(r, n, v)),
                _ => None,
            }
        })
        .collect()
}
