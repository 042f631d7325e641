//! In-memory fakes of the capability traits

use crate::backend::{
    ContainerRuntime, CreateContainer, CreateNetwork, EntryError, PackageBackend,
    PackageTransaction, SlotGuard, TransactionSlot,
};
use crate::context::{CallContext, CancelToken};
use crate::ownership::{LABEL_KEY, Owner};
use crate::types::{ObservedContainer, ObservedNetwork, ObservedPackage};
use anyhow::{Result, bail};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn managed_container(name: &str, image: &str, running: bool) -> ObservedContainer {
    ObservedContainer {
        id: format!("{name:0>64}"),
        name: name.to_string(),
        image: image.to_string(),
        image_id: format!("sha256:{image}"),
        running,
        created: None,
        owner: Owner::Managed,
    }
}

pub fn foreign_container(name: &str, image: &str, manager: Option<&str>) -> ObservedContainer {
    ObservedContainer {
        owner: Owner::from_label_value(manager),
        ..managed_container(name, image, true)
    }
}

#[derive(Default)]
struct RuntimeState {
    containers: Vec<ObservedContainer>,
    networks: Vec<ObservedNetwork>,
}

/// Container runtime backed by vectors
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<RuntimeState>,
    bad_images: HashSet<String>,
    fail_reads: bool,
    create_calls: AtomicUsize,
    cancel_after_create: Option<CancelToken>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(self, name: &str) -> Self {
        self.state.lock().unwrap().networks.push(ObservedNetwork {
            id: format!("net-{name}"),
            name: name.to_string(),
        });
        self
    }

    pub fn with_container(self, container: ObservedContainer) -> Self {
        self.state.lock().unwrap().containers.push(container);
        self
    }

    /// Creating a container from `image` fails like an invalid reference
    pub fn rejecting_image(mut self, image: &str) -> Self {
        self.bad_images.insert(image.to_string());
        self
    }

    /// Every list call fails
    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Cancel `token` once the first container has been created
    pub fn cancelling_after_create(mut self, token: CancelToken) -> Self {
        self.cancel_after_create = Some(token);
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn container_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.containers.iter().map(|c| c.name.clone()).collect()
    }
}

impl ContainerRuntime for FakeRuntime {
    fn list_containers(
        &self,
        _ctx: &CallContext,
        include_stopped: bool,
    ) -> Result<Vec<ObservedContainer>> {
        if self.fail_reads {
            bail!("Cannot connect to the Docker daemon");
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .iter()
            .filter(|c| include_stopped || c.running)
            .cloned()
            .collect())
    }

    fn list_networks(&self, _ctx: &CallContext) -> Result<Vec<ObservedNetwork>> {
        if self.fail_reads {
            bail!("Cannot connect to the Docker daemon");
        }
        Ok(self.state.lock().unwrap().networks.clone())
    }

    fn create_container(&self, _ctx: &CallContext, request: &CreateContainer) -> Result<String> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.bad_images.contains(&request.image) {
            bail!("invalid reference format: {}", request.image);
        }

        let mut state = self.state.lock().unwrap();
        if state.containers.iter().any(|c| c.name == request.name) {
            bail!("container name {} is already in use", request.name);
        }
        let id = format!("{n:064x}");
        state.containers.push(ObservedContainer {
            id: id.clone(),
            name: request.name.clone(),
            image: request.image.clone(),
            image_id: format!("sha256:{}", request.image),
            running: true,
            created: Some(chrono::Utc::now()),
            owner: Owner::from_label_value(request.labels.get(LABEL_KEY).map(String::as_str)),
        });
        if let Some(token) = &self.cancel_after_create {
            token.cancel();
        }
        Ok(id)
    }

    fn create_network(&self, _ctx: &CallContext, request: &CreateNetwork) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if state.networks.iter().any(|n| n.name == request.name) {
            bail!("network with name {} already exists", request.name);
        }
        let id = format!("net-{}", request.name);
        state.networks.push(ObservedNetwork {
            id: id.clone(),
            name: request.name.clone(),
        });
        Ok(id)
    }
}

/// Where a fake package transaction fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailAt {
    Begin,
    StageOf(String),
    Prepare,
    Commit,
}

/// Package database backed by maps
#[derive(Default)]
pub struct FakePackages {
    installed: Mutex<BTreeMap<String, String>>,
    remote: Vec<ObservedPackage>,
    fail_at: Option<FailAt>,
    cancel_at: Option<(FailAt, CancelToken)>,
    events: Mutex<Vec<String>>,
    slot: TransactionSlot,
}

impl FakePackages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_installed(self, packages: Vec<ObservedPackage>) -> Self {
        {
            let mut installed = self.installed.lock().unwrap();
            for p in packages {
                installed.insert(p.name, p.version);
            }
        }
        self
    }

    pub fn with_remote(mut self, packages: Vec<ObservedPackage>) -> Self {
        self.remote = packages;
        self
    }

    pub fn fail_at(mut self, at: FailAt) -> Self {
        self.fail_at = Some(at);
        self
    }

    /// Cancel `token` while the transaction is at `at`
    ///
    /// A cancelled stage still succeeds; a cancelled prepare fails the way an
    /// interrupted child process does.
    pub fn cancelling_at(mut self, at: FailAt, token: CancelToken) -> Self {
        self.cancel_at = Some((at, token));
        self
    }

    /// Installed packages, sorted by name
    pub fn installed(&self) -> Vec<ObservedPackage> {
        self.installed
            .lock()
            .unwrap()
            .iter()
            .map(|(name, version)| ObservedPackage::new(name, version))
            .collect()
    }

    pub fn remote(&self) -> Vec<ObservedPackage> {
        self.remote.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn is_locked(&self) -> bool {
        self.slot.is_held()
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn cancel_if_at(&self, at: &FailAt) -> bool {
        match &self.cancel_at {
            Some((point, token)) if point == at => {
                token.cancel();
                true
            }
            _ => false,
        }
    }
}

impl PackageBackend for FakePackages {
    fn list_installed(&self, _ctx: &CallContext) -> Result<Vec<ObservedPackage>> {
        Ok(self.installed())
    }

    fn list_remote(&self, _ctx: &CallContext, names: &[String]) -> Result<Vec<ObservedPackage>> {
        Ok(self
            .remote
            .iter()
            .filter(|p| names.contains(&p.name))
            .cloned()
            .collect())
    }

    fn begin(&self, _ctx: &CallContext) -> Result<Box<dyn PackageTransaction + '_>> {
        if self.fail_at == Some(FailAt::Begin) {
            bail!("could not initialize transaction");
        }
        let guard = self.slot.try_acquire()?;
        self.record("begin");
        Ok(Box::new(FakeTransaction {
            backend: self,
            staged: Vec::new(),
            guard: Some(guard),
        }))
    }
}

struct FakeTransaction<'a> {
    backend: &'a FakePackages,
    staged: Vec<ObservedPackage>,
    guard: Option<SlotGuard<'a>>,
}

impl PackageTransaction for FakeTransaction<'_> {
    fn stage(&mut self, _ctx: &CallContext, package: &ObservedPackage) -> Result<()> {
        if self.backend.fail_at == Some(FailAt::StageOf(package.name.clone())) {
            return Err(EntryError {
                name: package.name.clone(),
                message: "target not found".to_string(),
            }
            .into());
        }
        self.backend.record(format!("stage {}", package.qualified_name()));
        self.staged.push(package.clone());
        self.backend.cancel_if_at(&FailAt::StageOf(package.name.clone()));
        Ok(())
    }

    fn prepare(&mut self, _ctx: &CallContext) -> Result<()> {
        self.backend.record("prepare");
        if self.backend.cancel_if_at(&FailAt::Prepare) {
            bail!("interrupted");
        }
        if self.backend.fail_at == Some(FailAt::Prepare) {
            bail!("unresolvable package conflicts detected");
        }
        Ok(())
    }

    fn commit(&mut self, _ctx: &CallContext) -> Result<()> {
        self.backend.record("commit");
        if self.backend.fail_at == Some(FailAt::Commit) {
            bail!("failed to commit transaction (conflicting files)");
        }
        let mut installed = self.backend.installed.lock().unwrap();
        for p in self.staged.drain(..) {
            installed.insert(p.name, p.version);
        }
        Ok(())
    }

    fn release(&mut self) {
        self.backend.record("release");
        self.guard.take();
    }
}
