//! Local filesystem capability
//!
//! Workers and the directory walker never touch `std::fs` directly; they go
//! through this trait so tests can substitute their own tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem operations the engine consumes
pub trait Filesystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Immediate children of a directory, unsorted
    fn list_children(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Resolve a path to its canonical absolute form
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    fn file_size(&self, path: &Path) -> io::Result<u64>;

    fn delete_file(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl Filesystem for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_children(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(path)? {
            children.push(entry?.path());
        }
        Ok(children)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_fs_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let fs_cap = LocalFs;

        let file = dir.path().join("a.txt");
        fs::write(&file, b"hello").unwrap();

        assert!(fs_cap.exists(&file));
        assert!(fs_cap.is_file(&file));
        assert!(!fs_cap.is_dir(&file));
        assert!(fs_cap.is_dir(dir.path()));
        assert_eq!(fs_cap.file_size(&file).unwrap(), 5);

        let children = fs_cap.list_children(dir.path()).unwrap();
        assert_eq!(children.len(), 1);

        fs_cap.delete_file(&file).unwrap();
        assert!(!fs_cap.exists(&file));
    }

    #[test]
    fn test_list_children_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(LocalFs.list_children(&missing).is_err());
    }
}
