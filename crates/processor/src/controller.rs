//! Turns a verified delivery into at most one pull

use common::{BusyPolicy, Config};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::{PathError, ProcessError, SyncError};
use crate::locks::RepoLocks;
use crate::path::{resolve_path, ResolvedPath};
use crate::puller::Puller;

/// Resolves working copies under one root and never runs two pulls of the same one
pub struct RepositorySyncController {
    root: PathBuf,
    puller: Arc<dyn Puller>,
    locks: RepoLocks,
    timeout: Duration,
    busy_policy: BusyPolicy,
}

impl RepositorySyncController {
    pub fn new(
        root: impl Into<PathBuf>,
        puller: Arc<dyn Puller>,
        timeout: Duration,
        busy_policy: BusyPolicy,
    ) -> Self {
        Self {
            root: root.into(),
            puller,
            locks: RepoLocks::new(),
            timeout,
            busy_policy,
        }
    }

    pub fn from_config(config: &Config, puller: Arc<dyn Puller>) -> Self {
        Self::new(
            config.repo_root.clone(),
            puller,
            Duration::from_secs(config.sync_timeout_secs),
            config.busy_policy,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve_path(&self, untrusted_name: &str) -> Result<ResolvedPath, PathError> {
        resolve_path(&self.root, untrusted_name)
    }

    /// Pull one resolved working copy, serialized against other pulls of it
    pub async fn sync(&self, target: &ResolvedPath) -> Result<(), SyncError> {
        let repo = target.name();
        let path = target.as_path();
        let lock_key = target.working_copy();

        let _guard = match self.locks.try_acquire(lock_key) {
            Some(guard) => guard,
            None => match self.busy_policy {
                BusyPolicy::Reject => {
                    warn!("Pull for {:?} already running, rejecting delivery", repo);
                    return Err(SyncError::Busy {
                        repo: repo.to_string(),
                    });
                }
                BusyPolicy::Wait => {
                    info!("Pull for {:?} already running, queueing", repo);
                    self.locks.acquire(lock_key).await
                }
            },
        };

        info!("Pulling {:?} in {}", repo, path.display());
        match tokio::time::timeout(self.timeout, self.puller.pull(path)).await {
            Ok(Ok(())) => {
                info!("Pulled {:?}", repo);
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Pull failed for {:?}: {:#}", repo, e);
                Err(SyncError::ExternalToolFailed {
                    repo: repo.to_string(),
                    reason: format!("{e:#}"),
                })
            }
            Err(_) => {
                error!("Pull for {:?} timed out after {:?}", repo, self.timeout);
                Err(SyncError::Timeout {
                    repo: repo.to_string(),
                    after: self.timeout,
                })
            }
        }
    }

    /// Resolve the delivery's repository name and pull it
    pub async fn handle_delivery(&self, untrusted_name: &str) -> Result<ResolvedPath, ProcessError> {
        let target = self.resolve_path(untrusted_name).map_err(|e| {
            if matches!(e, PathError::Traversal { .. }) {
                warn!(name = ?untrusted_name, "Path traversal attempt in delivery");
            } else {
                warn!("Cannot sync {:?}: {}", untrusted_name, e);
            }
            e
        })?;
        self.sync(&target).await?;
        Ok(target)
    }
}
