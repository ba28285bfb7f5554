//! Path Resolver (§4.A): normalizes media identifiers into absolute
//! filesystem paths, with a pure existence check.

use std::path::{Path, PathBuf};

/// Normalizes three input shapes into an absolute path, rooted at a
/// caller-supplied documents directory (§4.A.1) — a real embedding passes
/// the platform's documents directory at construction; this keeps the
/// resolver pure and testable.
#[derive(Debug, Clone)]
pub struct PathResolver {
    documents_dir: PathBuf,
}

impl PathResolver {
    pub fn new(documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: documents_dir.into(),
        }
    }

    /// Resolve a URI/bare-name into an absolute on-disk path.
    pub fn full_path(&self, uri: &str) -> PathBuf {
        if let Some(stripped) = uri.strip_prefix("file://") {
            PathBuf::from(stripped)
        } else if Path::new(uri).is_absolute() {
            PathBuf::from(uri)
        } else {
            self.documents_dir.join(uri)
        }
    }

    /// Existence check. No distinction between missing and
    /// permission-denied at this layer (§4.A).
    pub fn exists(&self, uri: &str) -> bool {
        self.full_path(uri).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_scheme_is_stripped() {
        let resolver = PathResolver::new("/docs");
        assert_eq!(
            resolver.full_path("file:///tmp/a.jpg"),
            PathBuf::from("/tmp/a.jpg")
        );
    }

    #[test]
    fn absolute_path_is_used_as_is() {
        let resolver = PathResolver::new("/docs");
        assert_eq!(
            resolver.full_path("/var/a.jpg"),
            PathBuf::from("/var/a.jpg")
        );
    }

    #[test]
    fn bare_name_is_joined_with_documents_dir() {
        let resolver = PathResolver::new("/docs");
        assert_eq!(
            resolver.full_path("1700000000.jpg"),
            PathBuf::from("/docs/1700000000.jpg")
        );
    }

    #[test]
    fn exists_reports_false_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(dir.path());
        assert!(!resolver.exists("nope.jpg"));
    }

    #[test]
    fn exists_reports_true_for_present_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"data").unwrap();
        let resolver = PathResolver::new(dir.path());
        assert!(resolver.exists("a.jpg"));
    }
}
