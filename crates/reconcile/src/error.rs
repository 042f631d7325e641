//! Error types for reconciliation.
//!
//! Every failure the engine surfaces belongs to an [`ErrorKind`]. The kind
//! decides how a boundary reports it (exit status, HTTP status) and whether
//! a caller may retry. The engine itself never retries.

use crate::context::CallContext;
use crate::identity::ResourceIdentity;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// External subsystem unreachable or failing
    Unavailable,
    /// A dependency of a create (e.g. its network) does not exist
    PrereqMissing,
    /// The backend refused a single entry (bad image, name clash)
    Rejected,
    /// Package batch aborted, nothing applied
    TransactionFailed,
    /// One or more independent entries failed
    EntriesFailed,
    /// Another package transaction holds the database
    Locked,
    /// Caller cancelled the call
    Cancelled,
    /// Desired-state document could not be read
    Document,
}

impl ErrorKind {
    /// Whether the same call may succeed if simply repeated later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Locked)
    }

    /// Whether the caller's input is at fault.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::PrereqMissing | Self::Rejected | Self::Document)
    }

    /// HTTP status a REST boundary should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::PrereqMissing | Self::Document => 400,
            Self::Rejected => 422,
            Self::Locked => 409,
            Self::Cancelled => 499,
            Self::TransactionFailed | Self::EntriesFailed => 500,
            Self::Unavailable => 503,
        }
    }

    /// Process exit code for the CLI boundary.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PrereqMissing | Self::Rejected | Self::Document => 2,
            Self::Locked => 3,
            Self::Cancelled => 130,
            _ => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::PrereqMissing => "prereq_missing",
            Self::Rejected => "rejected",
            Self::TransactionFailed => "transaction_failed",
            Self::EntriesFailed => "entries_failed",
            Self::Locked => "locked",
            Self::Cancelled => "cancelled",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step of a package transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStage {
    Init,
    Stage,
    Prepare,
    Commit,
}

impl fmt::Display for TransactionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Stage => "stage",
            Self::Prepare => "prepare",
            Self::Commit => "commit",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// External subsystem unreachable; no partial data is used
    #[error("{subsystem} unavailable: {message}")]
    Unavailable {
        subsystem: &'static str,
        message: String,
    },

    /// Prerequisite of a create is absent
    #[error("cannot create {resource}: {missing} does not exist")]
    PrereqMissing {
        resource: ResourceIdentity,
        missing: ResourceIdentity,
    },

    /// Backend refused an entry
    #[error("{resource} rejected: {message}")]
    Rejected {
        resource: ResourceIdentity,
        message: String,
    },

    /// Package batch aborted at `stage`, naming the first failing entry
    #[error("package transaction aborted during {stage} at {entry}: {message}")]
    TransactionFailed {
        stage: TransactionStage,
        entry: String,
        message: String,
    },

    /// Aggregate of independent per-entry failures
    #[error("{} failed: {}", plural_entries(.failed.len()), join_identities(.failed))]
    EntriesFailed { failed: Vec<ResourceIdentity> },

    /// Package database held by another transaction
    #[error("package database is locked: {holder}")]
    Locked { holder: String },

    #[error("operation cancelled")]
    Cancelled,

    /// Malformed desired-state document
    #[error("invalid desired-state document: {message}")]
    Document { message: String },
}

fn plural_entries(n: usize) -> String {
    if n == 1 {
        "1 entry".to_string()
    } else {
        format!("{n} entries")
    }
}

fn join_identities(ids: &[ResourceIdentity]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unavailable { .. } => ErrorKind::Unavailable,
            Error::PrereqMissing { .. } => ErrorKind::PrereqMissing,
            Error::Rejected { .. } => ErrorKind::Rejected,
            Error::TransactionFailed { .. } => ErrorKind::TransactionFailed,
            Error::EntriesFailed { .. } => ErrorKind::EntriesFailed,
            Error::Locked { .. } => ErrorKind::Locked,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Document { .. } => ErrorKind::Document,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// JSON body for a REST boundary: `{"error": <message>}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }

    /// Classify a failure from an observer call.
    ///
    /// Typed engine errors (cancellation, lock contention) pass through;
    /// anything else means the subsystem is unavailable.
    pub fn from_backend(subsystem: &'static str, ctx: &CallContext, err: anyhow::Error) -> Self {
        if ctx.is_cancelled() {
            return Error::Cancelled;
        }
        match err.downcast::<Error>() {
            Ok(typed) => typed,
            Err(other) => Error::Unavailable {
                subsystem,
                message: format!("{other:#}"),
            },
        }
    }

    /// Classify a failure from applying a single entry.
    pub fn from_apply(resource: &ResourceIdentity, ctx: &CallContext, err: anyhow::Error) -> Self {
        if ctx.is_cancelled() {
            return Error::Cancelled;
        }
        match err.downcast::<Error>() {
            Ok(typed) => typed,
            Err(other) => Error::Rejected {
                resource: resource.clone(),
                message: format!("{other:#}"),
            },
        }
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancelToken;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ErrorKind::PrereqMissing.http_status(), 400);
        assert_eq!(ErrorKind::Document.http_status(), 400);
        assert_eq!(ErrorKind::Unavailable.http_status(), 503);
        assert_eq!(ErrorKind::Locked.http_status(), 409);
        assert!(ErrorKind::TransactionFailed.http_status() >= 500);
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorKind::Unavailable.is_retryable());
        assert!(ErrorKind::Locked.is_retryable());
        assert!(!ErrorKind::PrereqMissing.is_retryable());
        assert!(!ErrorKind::TransactionFailed.is_retryable());
    }

    #[test]
    fn test_json_body() {
        let err = Error::PrereqMissing {
            resource: ResourceIdentity::container("web"),
            missing: ResourceIdentity::network("hivekeep-network"),
        };
        let body = err.to_json();
        assert_eq!(
            body["error"],
            "cannot create container/web: network/hivekeep-network does not exist"
        );
        assert_eq!(body.as_object().map(|o| o.len()), Some(1));
    }

    #[test]
    fn test_entries_failed_message() {
        let err = Error::EntriesFailed {
            failed: vec![ResourceIdentity::container("b")],
        };
        assert_eq!(err.to_string(), "1 entry failed: container/b");
    }

    #[test]
    fn test_from_backend_wraps_unknown_as_unavailable() {
        let ctx = CallContext::new();
        let err = Error::from_backend("docker", &ctx, anyhow::anyhow!("daemon down"));
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.to_string().contains("daemon down"));
    }

    #[test]
    fn test_from_backend_preserves_typed_errors() {
        let ctx = CallContext::new();
        let err = Error::from_backend(
            "pacman",
            &ctx,
            anyhow::Error::new(Error::Locked {
                holder: "db.lck".into(),
            }),
        );
        assert_eq!(err.kind(), ErrorKind::Locked);
    }

    #[test]
    fn test_cancellation_wins() {
        let token = CancelToken::new();
        let ctx = CallContext::with_cancel(token.clone());
        token.cancel();
        let err = Error::from_apply(
            &ResourceIdentity::container("web"),
            &ctx,
            anyhow::anyhow!("killed"),
        );
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
