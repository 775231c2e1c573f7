//! Lexical path helpers

use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components without touching the filesystem.
///
/// `..` at the root stays at the root, as it does for the kernel.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_parent_and_current() {
        assert_eq!(
            normalize_lexically(Path::new("/data/repos/./a/../b")),
            PathBuf::from("/data/repos/b")
        );
    }

    #[test]
    fn test_parent_cannot_climb_above_root() {
        assert_eq!(
            normalize_lexically(Path::new("/data/repos/../../../../etc")),
            PathBuf::from("/etc")
        );
    }

    #[test]
    fn test_strips_trailing_separator() {
        assert_eq!(
            normalize_lexically(Path::new("/data/repos/")),
            PathBuf::from("/data/repos")
        );
    }
}
