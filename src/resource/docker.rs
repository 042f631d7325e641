//! Container runtime adapter over the docker CLI

use anyhow::{Result, bail};
use hostkit::{ContainerInfo, ContainerOptions, Docker, NetworkInfo};
use reconcile::{
    CallContext, ContainerRuntime, CreateContainer, CreateNetwork, ObservedContainer,
    ObservedNetwork, Owner,
};

use super::engine_error;

const SUBSYSTEM: &str = "container runtime";

/// `ContainerRuntime` backed by [`hostkit::Docker`]
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(bin: &str) -> Self {
        Self {
            docker: Docker::with_binary(bin),
        }
    }

    /// Find a container by name, refusing ones hivekeep does not manage
    fn managed(&self, ctx: &CallContext, name: &str) -> Result<ObservedContainer> {
        let container = self
            .list_containers(ctx, true)?
            .into_iter()
            .find(|c| c.name == name);
        match container {
            Some(c) if c.owner.is_managed() => Ok(c),
            Some(c) => bail!(
                "container {name} is not managed by hivekeep (managed-by: {})",
                c.owner.label_value()
            ),
            None => bail!("no container named {name}"),
        }
    }

    pub fn start(&self, ctx: &CallContext, name: &str) -> Result<()> {
        let container = self.managed(ctx, name)?;
        if container.running {
            log::info!("{name} is already running");
            return Ok(());
        }
        self.docker
            .start_container(&container.id, Some(ctx.interrupt()))
            .map_err(|e| engine_error(SUBSYSTEM, e))
    }

    pub fn stop(&self, ctx: &CallContext, name: &str) -> Result<()> {
        let container = self.managed(ctx, name)?;
        if !container.running {
            log::info!("{name} is not running");
            return Ok(());
        }
        self.docker
            .stop_container(&container.id, Some(ctx.interrupt()))
            .map_err(|e| engine_error(SUBSYSTEM, e))
    }

    /// Remove a managed container; running ones need `force`
    pub fn remove(&self, ctx: &CallContext, name: &str, force: bool) -> Result<()> {
        let container = self.managed(ctx, name)?;
        if container.running && !force {
            bail!("container {name} is running; stop it first or pass --force");
        }
        self.docker
            .remove_container(&container.id, force, Some(ctx.interrupt()))
            .map_err(|e| engine_error(SUBSYSTEM, e))
    }
}

impl ContainerRuntime for DockerRuntime {
    fn list_containers(
        &self,
        ctx: &CallContext,
        include_stopped: bool,
    ) -> Result<Vec<ObservedContainer>> {
        let containers = self
            .docker
            .list_containers(include_stopped, Some(ctx.interrupt()))
            .map_err(|e| engine_error(SUBSYSTEM, e))?;
        Ok(containers.into_iter().map(observed_container).collect())
    }

    fn list_networks(&self, ctx: &CallContext) -> Result<Vec<ObservedNetwork>> {
        let networks = self
            .docker
            .list_networks(Some(ctx.interrupt()))
            .map_err(|e| engine_error(SUBSYSTEM, e))?;
        Ok(networks.into_iter().map(observed_network).collect())
    }

    fn create_container(&self, ctx: &CallContext, request: &CreateContainer) -> Result<String> {
        let options = ContainerOptions {
            name: request.name.clone(),
            image: request.image.clone(),
            network: Some(request.network.clone()),
            labels: request.labels.clone(),
        };
        self.docker
            .run_container(&options, Some(ctx.interrupt()))
            .map_err(|e| engine_error(SUBSYSTEM, e))
    }

    fn create_network(&self, ctx: &CallContext, request: &CreateNetwork) -> Result<String> {
        self.docker
            .create_network(&request.name, &request.labels, Some(ctx.interrupt()))
            .map_err(|e| engine_error(SUBSYSTEM, e))
    }
}

fn observed_container(info: ContainerInfo) -> ObservedContainer {
    ObservedContainer {
        owner: Owner::from_labels(&info.labels),
        id: info.id,
        name: info.name,
        image: info.image,
        image_id: info.image_id,
        running: info.running,
        created: info.created,
    }
}

fn observed_network(info: NetworkInfo) -> ObservedNetwork {
    ObservedNetwork {
        id: info.id,
        name: info.name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn info(labels: &[(&str, &str)]) -> ContainerInfo {
        ContainerInfo {
            id: "4f66ad9a0b2e1c3d".to_string(),
            name: "web".to_string(),
            image: "nginx:latest".to_string(),
            image_id: "sha256:a8758716bb6a".to_string(),
            running: true,
            status: "running".to_string(),
            created: None,
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_observed_container_ownership() {
        let managed = observed_container(info(&[("managed-by", "hivekeep")]));
        assert_eq!(managed.owner, Owner::Managed);
        assert_eq!(managed.name, "web");
        assert!(managed.running);

        let foreign = observed_container(info(&[("managed-by", "compose")]));
        assert_eq!(foreign.owner, Owner::Foreign("compose".to_string()));

        let bare = observed_container(info(&[]));
        assert_eq!(bare.owner, Owner::Unlabeled);
        assert_eq!(bare.owner.label_value(), "unknown");
    }

    #[test]
    fn test_missing_docker_is_unavailable() {
        let runtime = DockerRuntime::new("hivekeep-no-such-docker");
        let err = runtime.list_networks(&CallContext::new()).unwrap_err();
        let typed = err.downcast_ref::<reconcile::Error>().unwrap();
        assert_eq!(typed.kind(), reconcile::ErrorKind::Unavailable);
    }
}
