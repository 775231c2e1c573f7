//! Error types

use std::time::Duration;
use thiserror::Error;

/// A repository name that cannot be turned into a safe working copy path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Repository name {name:?} escapes the repository root")]
    Traversal { name: String },

    #[error("Repository {name:?} not found")]
    NotFound { name: String },

    #[error("Repository {name:?} is not a directory")]
    NotADirectory { name: String },
}

/// A pull that was attempted (or refused) and did not succeed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Pull failed for {repo:?}: {reason}")]
    ExternalToolFailed { repo: String, reason: String },

    #[error("Pull for {repo:?} timed out after {after:?}")]
    Timeout { repo: String, after: Duration },

    #[error("A pull for {repo:?} is already running")]
    Busy { repo: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}
