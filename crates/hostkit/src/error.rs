//! Error types for host tool operations.
//!
//! Errors are categorized from the tool's stderr so callers can tell a dead
//! daemon from a missing package or a held lock, and give the user
//! appropriate feedback. Each error carries the context needed to act on it.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Categories of host tool errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The tool binary is not installed
    ToolNotFound,
    /// The container daemon is unreachable
    Daemon,
    /// Network-related errors (mirror unreachable, download failed)
    Network,
    /// Package, image, container or network not found
    NotFound,
    /// Name clash, file conflict or unsatisfiable dependency
    Conflict,
    /// Permission denied (may need root)
    Permission,
    /// Package database lock held by another process
    Locked,
    /// Command killed on request
    Interrupted,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Daemon | Self::Network | Self::Locked)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::ToolNotFound => "Tool not installed",
            Self::Daemon => "Container daemon unreachable",
            Self::Network => "Network connectivity issue",
            Self::NotFound => "Not found",
            Self::Conflict => "Conflict",
            Self::Permission => "Permission denied",
            Self::Locked => "Package database locked",
            Self::Interrupted => "Interrupted",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::ToolNotFound => "Install the tool or point the config at its binary",
            Self::Daemon => "Start the daemon (systemctl start docker) and try again",
            Self::Network => "Check your internet connection and mirrorlist, then try again",
            Self::NotFound => "Verify the name, or refresh the package databases",
            Self::Conflict => "Resolve the conflict by renaming or removing the other party",
            Self::Permission => "Run as root or add your user to the docker group",
            Self::Locked => "Wait for the other package operation to finish",
            Self::Interrupted => "No action needed - the operation was cancelled",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while running host tools.
#[derive(Debug, Error)]
pub enum Error {
    /// Tool binary could not be executed
    #[error("{tool} not found in PATH")]
    ToolNotFound {
        /// Program that was looked up
        tool: String,
    },

    /// Container daemon unreachable
    #[error("docker daemon unreachable: {message}")]
    Daemon {
        /// Message reported by the client
        message: String,
    },

    /// Network-related error (download, mirror, DNS)
    #[error("network error: {message}")]
    Network {
        /// Detailed error message from the failed operation
        message: String,
    },

    /// Target not found
    #[error("not found: {name}")]
    NotFound {
        /// Name of the package, image, container or network
        name: String,
    },

    /// Name clash or dependency conflict
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflict
        message: String,
    },

    /// Permission denied
    #[error("permission denied: {message}")]
    Permission {
        /// Details about what permission was denied
        message: String,
    },

    /// Package database is locked
    #[error("package database locked ({})", path.display())]
    Locked {
        /// Lock file held by the other process
        path: PathBuf,
    },

    /// Command killed because the caller asked to stop
    #[error("interrupted: {command}")]
    Interrupted {
        /// Command line that was killed
        command: String,
    },

    /// Command execution failed
    #[error("command failed: {message}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// Tool output could not be understood
    #[error("unexpected output: {message}")]
    Parse {
        /// What was wrong with the output
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ToolNotFound { .. } => ErrorCategory::ToolNotFound,
            Error::Daemon { .. } => ErrorCategory::Daemon,
            Error::Network { .. } => ErrorCategory::Network,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Conflict { .. } => ErrorCategory::Conflict,
            Error::Permission { .. } => ErrorCategory::Permission,
            Error::Locked { .. } => ErrorCategory::Locked,
            Error::Interrupted { .. } => ErrorCategory::Interrupted,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Create an error from docker command output.
    ///
    /// Analyzes stderr to categorize the error appropriately.
    pub fn from_docker_output(stderr: &str, subject: Option<&str>) -> Self {
        let stderr_lower = stderr.to_lowercase();
        let message = stderr.trim().to_string();

        if stderr_lower.contains("cannot connect to the docker daemon")
            || stderr_lower.contains("is the docker daemon running")
            || stderr_lower.contains("error during connect")
        {
            return Error::Daemon { message };
        }

        if stderr_lower.contains("permission denied") {
            return Error::Permission { message };
        }

        if stderr_lower.contains("no such container")
            || stderr_lower.contains("no such network")
            || stderr_lower.contains("no such image")
            || stderr_lower.contains("pull access denied")
            || stderr_lower.contains("manifest unknown")
            || (stderr_lower.contains("network") && stderr_lower.contains("not found"))
        {
            return Error::NotFound {
                name: subject.unwrap_or("unknown").to_string(),
            };
        }

        if stderr_lower.contains("is already in use")
            || stderr_lower.contains("already exists")
            || stderr_lower.contains("conflict")
        {
            return Error::Conflict { message };
        }

        if stderr_lower.contains("tls handshake timeout")
            || stderr_lower.contains("i/o timeout")
            || stderr_lower.contains("no such host")
        {
            return Error::Network { message };
        }

        Error::CommandFailed {
            message: format!(
                "docker command failed{}",
                subject.map(|s| format!(" for {s}")).unwrap_or_default()
            ),
            stderr: message,
        }
    }

    /// Create an error from pacman command output.
    ///
    /// `lock_file` is reported when pacman could not take its lock.
    pub fn from_pacman_output(stderr: &str, subject: Option<&str>, lock_file: &Path) -> Self {
        let stderr_lower = stderr.to_lowercase();
        let message = stderr.trim().to_string();

        if stderr_lower.contains("unable to lock database") || stderr_lower.contains("db.lck") {
            return Error::Locked {
                path: lock_file.to_path_buf(),
            };
        }

        // error: target not found: foo
        if let Some(name) = stderr
            .lines()
            .find_map(|l| l.trim().strip_prefix("error: target not found: "))
        {
            return Error::NotFound {
                name: name.trim().to_string(),
            };
        }

        if stderr_lower.contains("you cannot perform this operation unless you are root")
            || stderr_lower.contains("permission denied")
        {
            return Error::Permission { message };
        }

        if stderr_lower.contains("failed retrieving file")
            || stderr_lower.contains("failed to synchronize")
            || stderr_lower.contains("could not resolve host")
        {
            return Error::Network { message };
        }

        if stderr_lower.contains("conflicting files")
            || stderr_lower.contains("conflicts")
            || stderr_lower.contains("could not satisfy dependencies")
            || stderr_lower.contains("unable to satisfy dependency")
        {
            return Error::Conflict { message };
        }

        Error::CommandFailed {
            message: format!(
                "pacman command failed{}",
                subject.map(|s| format!(" for {s}")).unwrap_or_default()
            ),
            stderr: message,
        }
    }
}

/// Result type for host tool operations.
pub type Result<T> = std::result::Result<T, Error>;
