//! Filesystem seam
//!
//! Deletion is where external file locks bite, so every filesystem call the
//! manager makes goes through [`FileOps`] and can be replaced in tests.

use std::io;
use std::path::{Path, PathBuf};

/// Filesystem operations used by the workspace manager
#[cfg_attr(test, mockall::automock)]
pub trait FileOps: Send + Sync {
    /// Does the path exist
    fn exists(&self, path: &Path) -> bool;

    /// Create a directory and its parents
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create exactly one directory; fails if it exists
    fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// Recursively delete a directory
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Rename a path
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Immediate subdirectories of `path`
    fn subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// [`FileOps`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl FileOps for StdFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

impl<F: FileOps + ?Sized> FileOps for std::sync::Arc<F> {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        (**self).create_dir_all(path)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        (**self).create_dir(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        (**self).remove_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        (**self).rename(from, to)
    }

    fn subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        (**self).subdirectories(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdirectories_skips_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("c.txt"), "x").unwrap();

        let dirs = StdFs.subdirectories(dir.path()).unwrap();
        assert_eq!(dirs, vec![dir.path().join("a"), dir.path().join("b")]);
    }
}
