//! Filesystem doubles for cleanup tests
//!
//! Deleting a directory that holds an open file succeeds on Unix, so lock
//! contention is reproduced by consulting the simulator's lock table instead.

use cadmod_bridge::FileLocks;
use cadmod_workspace::{FileOps, StdFs};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

fn in_use(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("{} is in use by another process", path.display()),
    )
}

/// Real filesystem that refuses to delete or move directories holding locked files
#[derive(Debug, Clone)]
pub struct LockAwareFs {
    locks: FileLocks,
}

impl LockAwareFs {
    pub fn new(locks: FileLocks) -> Self {
        Self { locks }
    }
}

impl FileOps for LockAwareFs {
    fn exists(&self, path: &Path) -> bool {
        StdFs.exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        StdFs.create_dir_all(path)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        StdFs.create_dir(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        if self.locks.is_locked_under(path) {
            return Err(in_use(path));
        }
        StdFs.remove_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.locks.is_locked_under(from) {
            return Err(in_use(from));
        }
        StdFs.rename(from, to)
    }

    fn subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        StdFs.subdirectories(path)
    }
}

/// Real filesystem whose first `n` recursive deletes fail
#[derive(Debug, Default)]
pub struct FlakyFs {
    failures_left: AtomicU32,
    removals: AtomicU32,
}

impl FlakyFs {
    pub fn failing(n: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(n),
            removals: AtomicU32::new(0),
        }
    }

    /// Delete attempts seen so far, failed or not
    pub fn removals(&self) -> u32 {
        self.removals.load(Ordering::SeqCst)
    }
}

impl FileOps for FlakyFs {
    fn exists(&self, path: &Path) -> bool {
        StdFs.exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        StdFs.create_dir_all(path)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        StdFs.create_dir(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.removals.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(in_use(path));
        }
        StdFs.remove_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        StdFs.rename(from, to)
    }

    fn subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        StdFs.subdirectories(path)
    }
}
