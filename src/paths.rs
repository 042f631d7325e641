//! Centralized path resolution for hivekeep
//!
//! All paths hivekeep reads from or writes to are resolved here.
//!
//! Environment variable overrides:
//! - `HIVEKEEP_CONFIG_DIR`: override the config directory

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "HIVEKEEP_CONFIG_DIR";

/// Name of the settings file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Name of the default desired-state document
pub const DESIRED_FILE: &str = "desired.yaml";

/// Get the config directory path
///
/// Priority:
/// 1. `HIVEKEEP_CONFIG_DIR` env var
/// 2. `XDG_CONFIG_HOME/hivekeep`
/// 3. `~/.config/hivekeep`
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME")
        && !xdg.is_empty()
    {
        let path = expand(&xdg).join("hivekeep");
        log::debug!("Using XDG config dir: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("hivekeep");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Path of `config.toml`
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Default location of the desired-state document
pub fn desired_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(DESIRED_FILE))
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left untouched.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
