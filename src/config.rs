//! Settings (`config.toml`) and desired-state loading

use anyhow::{Context, Result};
use reconcile::{DEFAULT_NETWORK, DesiredDocument, PackageSpec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// Contents of `config.toml`
///
/// Every field is optional in the file; a missing file means all defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Network containers attach to
    pub network: String,
    /// Desired-state document; relative paths resolve against the config dir
    pub desired_state: Option<String>,
    /// Packages to keep installed (`name` or `name>=version`)
    pub packages: Vec<String>,
    pub docker_bin: String,
    pub pacman_bin: String,
    /// Run package installs through sudo
    pub sudo: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            desired_state: None,
            packages: Vec::new(),
            docker_bin: "docker".to_string(),
            pacman_bin: "pacman".to_string(),
            sudo: false,
        }
    }
}

impl Settings {
    /// Load from the config directory
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Where the desired-state document lives
    pub fn desired_path(&self) -> Result<PathBuf> {
        match &self.desired_state {
            Some(raw) => {
                let path = paths::expand(raw);
                if path.is_absolute() {
                    Ok(path)
                } else {
                    Ok(paths::config_dir()?.join(path))
                }
            }
            None => paths::desired_file(),
        }
    }

    /// Configured packages followed by `extra`, parsed
    pub fn package_specs(&self, extra: &[String]) -> Result<Vec<PackageSpec>> {
        self.packages
            .iter()
            .chain(extra)
            .map(|raw| raw.parse::<PackageSpec>().map_err(anyhow::Error::from))
            .collect()
    }
}

/// Read a desired-state document
///
/// `.json` files are parsed as JSON, anything else as YAML. A missing file
/// is an error only when `required`; otherwise it reads as an empty
/// document.
pub fn load_document(path: &Path, required: bool) -> Result<DesiredDocument> {
    if !path.exists() && !required {
        log::info!(
            "No desired-state document at {}, declaring nothing",
            path.display()
        );
        return Ok(DesiredDocument::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let document = if is_json {
        DesiredDocument::from_json(&content)
    } else {
        DesiredDocument::from_yaml(&content)
    };
    document.with_context(|| format!("Failed to load {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_settings_are_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.network, "hivekeep-network");
    }

    #[test]
    fn test_partial_settings_keep_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "network = \"lab\"\npackages = [\"bash\", \"htop>=3.3\"]\nsudo = true\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.network, "lab");
        assert!(settings.sudo);
        assert_eq!(settings.docker_bin, "docker");

        let specs = settings.package_specs(&["git".to_string()]).unwrap();
        assert_eq!(
            specs,
            vec![
                PackageSpec::new("bash"),
                PackageSpec::new("htop").at_least("3.3"),
                PackageSpec::new("git"),
            ]
        );
    }

    #[test]
    fn test_invalid_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "network = [").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_bad_package_entry() {
        let settings = Settings {
            packages: vec!["htop>=".to_string()],
            ..Settings::default()
        };
        let err = settings.package_specs(&[]).unwrap_err();
        let typed = err.downcast_ref::<reconcile::Error>().unwrap();
        assert_eq!(typed.kind(), reconcile::ErrorKind::Document);
    }

    #[test]
    fn test_absolute_desired_path() {
        let settings = Settings {
            desired_state: Some("/srv/hivekeep/desired.yaml".to_string()),
            ..Settings::default()
        };
        assert_eq!(
            settings.desired_path().unwrap(),
            PathBuf::from("/srv/hivekeep/desired.yaml")
        );
    }

    #[test]
    fn test_load_document_yaml_and_json() {
        let dir = tempdir().unwrap();
        let yaml = dir.path().join("desired.yaml");
        fs::write(
            &yaml,
            "containers:\n- name: web\n  image: nginx:latest\nnetworks:\n- name: lab\n",
        )
        .unwrap();
        let doc = load_document(&yaml, true).unwrap();
        assert_eq!(doc.containers.len(), 1);
        assert_eq!(doc.networks[0].name, "lab");

        let json = dir.path().join("desired.json");
        fs::write(&json, r#"{"containers":[{"name":"db","image":"postgres:16"}]}"#).unwrap();
        let doc = load_document(&json, true).unwrap();
        assert_eq!(doc.containers[0].image, "postgres:16");
    }

    #[test]
    fn test_load_document_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.yaml");
        assert_eq!(load_document(&path, false).unwrap(), DesiredDocument::default());
        assert!(load_document(&path, true).is_err());
    }

    #[test]
    fn test_load_document_malformed_is_document_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("desired.yaml");
        fs::write(&path, "containers: {not: [a list").unwrap();

        let err = load_document(&path, true).unwrap_err();
        let typed = err.downcast_ref::<reconcile::Error>().unwrap();
        assert_eq!(typed.kind(), reconcile::ErrorKind::Document);
    }
}
