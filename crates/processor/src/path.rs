//! Working copy path resolution
//!
//! The repository name comes from a signed delivery, but a valid signature only
//! proves the sender knows the secret. The name itself is untrusted input.

use common::paths::normalize_lexically;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tracing::debug;

use crate::error::PathError;

/// A working copy directory strictly inside the repository root.
///
/// Only [`resolve_path`] builds one, so every pull target went through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    path: PathBuf,
    working_copy: PathBuf,
    name: String,
}

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// The directory with symlinks resolved. Two names aliasing one checkout
    /// share this, so pulls are serialized on it.
    pub fn working_copy(&self) -> &Path {
        &self.working_copy
    }

    /// The repository name as it appeared in the delivery
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Resolve `untrusted_name` to an existing directory directly under `root`.
///
/// Lexical checks run first, so a hostile name never causes a filesystem lookup
/// outside the root.
pub fn resolve_path(root: &Path, untrusted_name: &str) -> Result<ResolvedPath, PathError> {
    let traversal = || PathError::Traversal {
        name: untrusted_name.to_string(),
    };

    if untrusted_name.is_empty() || untrusted_name.contains(['/', '\\', '\0']) {
        return Err(traversal());
    }

    let root = normalize_lexically(root);
    let candidate = normalize_lexically(&root.join(untrusted_name));
    if !is_strictly_under(&root, &candidate) {
        return Err(traversal());
    }

    match std::fs::metadata(&candidate) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(PathError::NotADirectory {
                name: untrusted_name.to_string(),
            })
        }
        Err(e) => {
            debug!("stat {} failed: {}", candidate.display(), e);
            return Err(PathError::NotFound {
                name: untrusted_name.to_string(),
            });
        }
    }

    // A symlink inside the root may still point outside it
    let (Ok(real_root), Ok(real_candidate)) = (root.canonicalize(), candidate.canonicalize())
    else {
        return Err(PathError::NotFound {
            name: untrusted_name.to_string(),
        });
    };
    if real_candidate == real_root || !real_candidate.starts_with(&real_root) {
        return Err(traversal());
    }

    Ok(ResolvedPath {
        path: candidate,
        working_copy: real_candidate,
        name: untrusted_name.to_string(),
    })
}

/// String-level check that `candidate` is `root` plus a separator plus more.
fn is_strictly_under(root: &Path, candidate: &Path) -> bool {
    let (Some(root), Some(candidate)) = (root.to_str(), candidate.to_str()) else {
        return false;
    };
    let prefix = if root.ends_with(MAIN_SEPARATOR) {
        root.to_string()
    } else {
        format!("{root}{MAIN_SEPARATOR}")
    };
    candidate.len() > prefix.len() && candidate.starts_with(&prefix)
}
