//! Request path resolution
//!
//! Every externally supplied path is joined against the store root and
//! must land under it. The join itself is plain concatenation; on top of
//! that, paths carrying parent, absolute, or prefix components are
//! rejected before any filesystem call, so a request can never resolve
//! outside the root. Existence is always confirmed by the caller with a
//! real stat, never inferred from the path.

use crate::error::StoreError;
use std::path::{Component, Path, PathBuf};

/// Maps request paths to on-disk locations under the store root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store root all requests resolve under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a request path, leading slash and all, to an absolute
    /// location under the store root.
    pub fn resolve(&self, request_path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(request_path.trim_start_matches('/'));

        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(StoreError::InvalidPath(request_path.to_string())),
            }
        }

        Ok(self.root.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_under_root() {
        let resolver = PathResolver::new("/data");
        let path = resolver.resolve("/2024-01-02/03/abc.png").unwrap();
        assert_eq!(path, PathBuf::from("/data/2024-01-02/03/abc.png"));
    }

    #[test]
    fn strips_leading_slashes() {
        let resolver = PathResolver::new("/data");
        assert_eq!(
            resolver.resolve("//x.bin").unwrap(),
            PathBuf::from("/data/x.bin")
        );
    }

    #[test]
    fn empty_path_resolves_to_root() {
        let resolver = PathResolver::new("/data");
        assert_eq!(resolver.resolve("/").unwrap(), PathBuf::from("/data"));
    }

    #[test]
    fn rejects_parent_components() {
        let resolver = PathResolver::new("/data");
        let err = resolver.resolve("/../etc/passwd").unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));

        let err = resolver.resolve("/a/../../b").unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));
    }
}
