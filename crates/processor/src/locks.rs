//! Per-repository pull serialization

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per working copy path.
///
/// Entries are only created for paths that passed resolution, i.e. existing
/// directories under the root, so the map stays as small as the root listing.
#[derive(Debug, Default)]
pub struct RepoLocks {
    inner: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl RepoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(path.to_path_buf()).or_default().clone()
    }

    /// Wait until no other pull holds `path`
    pub async fn acquire(&self, path: &Path) -> OwnedMutexGuard<()> {
        self.entry(path).lock_owned().await
    }

    /// Take the lock for `path` only if it is free
    pub fn try_acquire(&self, path: &Path) -> Option<OwnedMutexGuard<()>> {
        self.entry(path).try_lock_owned().ok()
    }

    /// Number of paths that have ever been locked
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
