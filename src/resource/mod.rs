//! Host adapters for the reconciliation engine
//!
//! Binds the `hostkit` tool backends to the engine's capability traits:
//! - [`DockerRuntime`] implements `ContainerRuntime` over the docker CLI
//! - [`PacmanBackend`] implements `PackageBackend` over pacman
//!
//! Tool errors are translated here so the engine sees typed failures
//! (cancellation, lock contention, an unreachable daemon) instead of raw
//! command output.

mod docker;
mod pacman;

pub use docker::DockerRuntime;
pub use pacman::PacmanBackend;

use hostkit::ErrorCategory;

/// Translate a tool error for the engine
///
/// `subsystem` names the failing side in `Unavailable` errors.
fn engine_error(subsystem: &'static str, err: hostkit::Error) -> anyhow::Error {
    match err.category() {
        ErrorCategory::Interrupted => reconcile::Error::Cancelled.into(),
        ErrorCategory::Locked => {
            let holder = match &err {
                hostkit::Error::Locked { path } => path.display().to_string(),
                other => other.to_string(),
            };
            reconcile::Error::Locked { holder }.into()
        }
        ErrorCategory::ToolNotFound | ErrorCategory::Daemon | ErrorCategory::Network => {
            reconcile::Error::Unavailable {
                subsystem,
                message: err.to_string(),
            }
            .into()
        }
        _ => err.into(),
    }
}
