//! Command implementations

pub mod containers;
pub mod declarative;
pub mod networks;
pub mod packages;

use anyhow::Result;
use reconcile::Engine;

use crate::config::Settings;
use crate::resource::{DockerRuntime, PacmanBackend};

/// Host backends built from the settings
pub struct Host {
    pub settings: Settings,
    pub runtime: DockerRuntime,
    pub packages: PacmanBackend,
}

impl Host {
    pub fn load() -> Result<Self> {
        Ok(Self::from_settings(Settings::load()?))
    }

    pub fn from_settings(settings: Settings) -> Self {
        let runtime = DockerRuntime::new(&settings.docker_bin);
        let packages = PacmanBackend::new(&settings.pacman_bin, settings.sudo);
        Self {
            settings,
            runtime,
            packages,
        }
    }

    pub fn engine(&self) -> Engine<'_> {
        Engine::new(&self.runtime, &self.packages).with_default_network(&self.settings.network)
    }
}

/// Ask before changing the system
fn confirm_proceed(prompt: &str) -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()?;

    Ok(confirmed)
}
