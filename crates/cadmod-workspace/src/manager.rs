//! Workspace creation, teardown and orphan sweeping
//!
//! Teardown runs in three tiers:
//! 1. Direct recursive delete, retried per [`CleanupPolicy`], asking the CAD
//!    surface to close every document before each attempt
//! 2. Rename the directory aside and delete the renamed copy
//! 3. Give up with a [`CleanupWarning`] naming the residual directory

use crate::error::{CleanupWarning, WorkspaceError};
use crate::fs::{FileOps, StdFs};
use crate::policy::CleanupPolicy;
use crate::state::{validate_transition, WorkspaceState};
use cadmod_bridge::CadBridge;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Default directory name prefix
pub const DEFAULT_PREFIX: &str = "Temp_Assembly";

const MAX_NAME_SUFFIX: u32 = 100;

/// An isolated copy of an assembly and everything it references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    root: PathBuf,
    state: WorkspaceState,
    source_assembly: PathBuf,
    assembly_copy: PathBuf,
    copied_files: Vec<PathBuf>,
    created_at: DateTime<Local>,
    residual: Option<PathBuf>,
}

impl Workspace {
    fn reserve(root: PathBuf, source: &Path) -> Self {
        let assembly_copy = source
            .file_name()
            .map_or_else(|| root.clone(), |name| root.join(name));
        Self {
            root,
            state: WorkspaceState::Uninitialized,
            source_assembly: source.to_path_buf(),
            assembly_copy,
            copied_files: Vec::new(),
            created_at: Local::now(),
            residual: None,
        }
    }

    fn transition(&mut self, to: WorkspaceState) -> Result<(), WorkspaceError> {
        validate_transition(self.state, to)?;
        tracing::debug!("Workspace {}: {} -> {}", self.root.display(), self.state, to);
        self.state = to;
        Ok(())
    }

    /// Workspace directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name
    #[must_use]
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Current lifecycle state
    #[inline]
    #[must_use]
    pub fn state(&self) -> WorkspaceState {
        self.state
    }

    /// Assembly the workspace was copied from
    #[inline]
    #[must_use]
    pub fn source_assembly(&self) -> &Path {
        &self.source_assembly
    }

    /// The assembly inside the workspace that changes are applied to
    #[inline]
    #[must_use]
    pub fn assembly_copy(&self) -> &Path {
        &self.assembly_copy
    }

    /// Every file written by the bundling copy, assembly first
    #[inline]
    #[must_use]
    pub fn copied_files(&self) -> &[PathBuf] {
        &self.copied_files
    }

    /// Creation time
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    /// Directory left behind by a failed cleanup
    #[inline]
    #[must_use]
    pub fn residual(&self) -> Option<&Path> {
        self.residual.as_deref()
    }
}

/// Result of a cleanup call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupOutcome {
    /// Terminal state reached
    pub state: WorkspaceState,
    /// Direct delete attempts made
    pub attempts: u32,
    /// Whether the rename fallback removed the directory
    pub renamed: bool,
    /// Set when a residual directory remains
    pub warning: Option<CleanupWarning>,
}

impl CleanupOutcome {
    /// True when the directory is gone
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.state == WorkspaceState::Cleaned
    }

    /// Directory left behind, if any
    #[must_use]
    pub fn residual(&self) -> Option<&Path> {
        self.warning.as_ref().map(|w| w.path.as_path())
    }
}

/// Result of an orphan sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Directories deleted
    pub removed: Vec<PathBuf>,
    /// Directories that could not be deleted
    pub skipped: Vec<PathBuf>,
}

/// Creates and tears down workspaces
#[derive(Debug, Clone)]
pub struct WorkspaceManager<F: FileOps = StdFs> {
    prefix: String,
    policy: CleanupPolicy,
    fs: F,
}

impl Default for WorkspaceManager<StdFs> {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, CleanupPolicy::default())
    }
}

impl WorkspaceManager<StdFs> {
    /// Manager using the real filesystem
    #[must_use]
    pub fn new(prefix: impl Into<String>, policy: CleanupPolicy) -> Self {
        Self::with_fs(prefix, policy, StdFs)
    }
}

impl<F: FileOps> WorkspaceManager<F> {
    /// Manager using a custom filesystem
    #[must_use]
    pub fn with_fs(prefix: impl Into<String>, policy: CleanupPolicy, fs: F) -> Self {
        Self {
            prefix: prefix.into(),
            policy,
            fs,
        }
    }

    /// Directory name prefix
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Cleanup policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &CleanupPolicy {
        &self.policy
    }

    /// Does `path` look like a directory this manager created
    #[must_use]
    pub fn is_workspace_dir(&self, path: &Path) -> bool {
        let marker = format!("{}_", self.prefix);
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&marker))
    }

    fn allocate_root(&self, parent: &Path) -> Result<PathBuf, WorkspaceError> {
        let base = format!("{}_{}", self.prefix, Local::now().format("%Y%m%d_%H%M%S"));
        let candidates = std::iter::once(base.clone())
            .chain((1..MAX_NAME_SUFFIX).map(|n| format!("{base}_{n}")));

        for name in candidates {
            let path = parent.join(name);
            if self.fs.exists(&path) {
                continue;
            }
            match self.fs.create_dir(&path) {
                Ok(()) => return Ok(path),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(WorkspaceError::io_error(path, e)),
            }
        }
        Err(WorkspaceError::NameExhausted(parent.to_path_buf()))
    }

    /// Materialize an isolated copy of `source` under `parent`
    ///
    /// # Errors
    /// Any failure before the copy completes; the partial directory is
    /// removed before the error is returned.
    pub fn create<B: CadBridge + ?Sized>(
        &self,
        bridge: &mut B,
        source: &Path,
        parent: &Path,
    ) -> Result<Workspace, WorkspaceError> {
        if !self.fs.exists(source) {
            return Err(WorkspaceError::SourceMissing(source.to_path_buf()));
        }
        self.fs
            .create_dir_all(parent)
            .map_err(|e| WorkspaceError::io_error(parent, e))?;

        let root = self.allocate_root(parent)?;
        let mut workspace = Workspace::reserve(root, source);
        tracing::info!(
            "Creating workspace {} from {}",
            workspace.root.display(),
            source.display()
        );

        let copied = bundle(bridge, source, &workspace.root);
        bridge.close_all();

        match copied {
            Ok(files) => {
                workspace.copied_files = files;
                workspace.transition(WorkspaceState::Active)?;
                tracing::info!(
                    "Workspace {} ready with {} file(s)",
                    workspace.root.display(),
                    workspace.copied_files.len()
                );
                Ok(workspace)
            }
            Err(e) => {
                tracing::error!("Workspace creation failed: {}", e);
                if let Err(rm) = self.fs.remove_dir_all(&workspace.root) {
                    tracing::warn!(
                        "Could not remove partial workspace {}: {}",
                        workspace.root.display(),
                        rm
                    );
                }
                Err(e)
            }
        }
    }

    /// Tear the workspace down; never fails
    ///
    /// Calling this on an already terminal workspace reports its state
    /// without touching the filesystem.
    pub fn cleanup<B: CadBridge + ?Sized>(
        &self,
        bridge: &mut B,
        workspace: &mut Workspace,
    ) -> CleanupOutcome {
        if let Err(e) = workspace.transition(WorkspaceState::PendingCleanup) {
            if !workspace.state.is_terminal() {
                tracing::warn!("Cleanup skipped: {}", e);
            }
            return CleanupOutcome {
                state: workspace.state,
                attempts: 0,
                renamed: false,
                warning: workspace.residual.clone().map(|path| CleanupWarning {
                    path,
                    reason: "cleanup already failed".to_string(),
                }),
            };
        }

        let root = workspace.root.clone();
        let total = self.policy.attempts();
        let mut attempts = 0u32;
        let mut last_error = String::new();

        for (index, delay) in self.policy.delays().enumerate() {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            let closed = bridge.close_all();
            attempts += 1;
            tracing::debug!(
                "Cleanup attempt {}/{} for {} ({} document(s) closed)",
                index + 1,
                total,
                root.display(),
                closed
            );

            if !self.fs.exists(&root) {
                return self.finish(workspace, attempts, false, None);
            }
            match self.fs.remove_dir_all(&root) {
                Ok(()) => return self.finish(workspace, attempts, false, None),
                Err(e) => {
                    tracing::warn!(
                        "Cleanup attempt {}/{} failed for {}: {}",
                        index + 1,
                        total,
                        root.display(),
                        e
                    );
                    last_error = e.to_string();
                }
            }
        }

        let mut residual = root.clone();
        if self.policy.rename_fallback {
            let aside = aside_path(&root);
            match self.fs.rename(&root, &aside) {
                Ok(()) => {
                    tracing::info!("Moved {} aside to {}", root.display(), aside.display());
                    match self.fs.remove_dir_all(&aside) {
                        Ok(()) => return self.finish(workspace, attempts, true, None),
                        Err(e) => {
                            last_error = e.to_string();
                            residual = aside;
                        }
                    }
                }
                Err(e) => last_error = e.to_string(),
            }
        }

        let warning = CleanupWarning {
            path: residual,
            reason: last_error,
        };
        tracing::warn!("{}", warning);
        self.finish(workspace, attempts, false, Some(warning))
    }

    fn finish(
        &self,
        workspace: &mut Workspace,
        attempts: u32,
        renamed: bool,
        warning: Option<CleanupWarning>,
    ) -> CleanupOutcome {
        let state = if warning.is_some() {
            WorkspaceState::CleanupFailed
        } else {
            WorkspaceState::Cleaned
        };
        if let Err(e) = workspace.transition(state) {
            tracing::error!("{}", e);
        }
        workspace.residual = warning.as_ref().map(|w| w.path.clone());
        if state == WorkspaceState::Cleaned {
            tracing::info!(
                "Workspace {} removed after {} attempt(s)",
                workspace.root.display(),
                attempts
            );
        }
        CleanupOutcome {
            state,
            attempts,
            renamed,
            warning,
        }
    }

    /// Delete leftover workspace directories under `parent`, except `keep`
    ///
    /// Best effort: directories that cannot be removed are reported as
    /// skipped and otherwise ignored.
    pub fn sweep_orphans(&self, parent: &Path, keep: &[PathBuf]) -> SweepReport {
        let mut report = SweepReport::default();
        let dirs = match self.fs.subdirectories(parent) {
            Ok(dirs) => dirs,
            Err(e) => {
                tracing::debug!("Orphan sweep skipped {}: {}", parent.display(), e);
                return report;
            }
        };

        for dir in dirs {
            if !self.is_workspace_dir(&dir) || keep.contains(&dir) {
                continue;
            }
            match self.fs.remove_dir_all(&dir) {
                Ok(()) => report.removed.push(dir),
                Err(e) => {
                    tracing::debug!("Orphan {} not removed: {}", dir.display(), e);
                    report.skipped.push(dir);
                }
            }
        }

        if !report.removed.is_empty() || !report.skipped.is_empty() {
            tracing::info!(
                "Orphan sweep of {}: {} removed, {} skipped",
                parent.display(),
                report.removed.len(),
                report.skipped.len()
            );
        }
        report
    }
}

fn bundle<B: CadBridge + ?Sized>(
    bridge: &mut B,
    source: &Path,
    root: &Path,
) -> Result<Vec<PathBuf>, WorkspaceError> {
    let session = bridge
        .open_document(source)
        .map_err(|e| WorkspaceError::Open {
            path: source.to_path_buf(),
            source: e,
        })?;
    bridge
        .pack_and_go(&session, root)
        .map_err(|e| WorkspaceError::CopyFailed {
            path: root.to_path_buf(),
            source: e,
        })
}

fn aside_path(root: &Path) -> PathBuf {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
    root.with_file_name(format!("{name}_deleted_{stamp}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileOps;
    use cadmod_bridge::{AssemblyDocument, BridgeCall, FailurePoint, SimulatedCad};
    use pretty_assertions::assert_eq;

    fn locked() -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, "file in use")
    }

    fn active(root: &str) -> Workspace {
        let mut ws = Workspace::reserve(PathBuf::from(root), Path::new("/src/Asm.json"));
        ws.transition(WorkspaceState::Active).unwrap();
        ws
    }

    fn close_calls(cad: &SimulatedCad) -> usize {
        cad.journal()
            .iter()
            .filter(|c| matches!(c, BridgeCall::CloseAll(_)))
            .count()
    }

    #[test]
    fn cleaned_on_first_attempt() {
        let mut fs = MockFileOps::new();
        fs.expect_exists().returning(|_| true);
        fs.expect_remove_dir_all().times(1).returning(|_| Ok(()));
        fs.expect_rename().never();

        let manager = WorkspaceManager::with_fs(DEFAULT_PREFIX, CleanupPolicy::immediate(3), fs);
        let mut cad = SimulatedCad::new();
        let mut ws = active("/work/Temp_Assembly_1");

        let outcome = manager.cleanup(&mut cad, &mut ws);
        assert_eq!(outcome.state, WorkspaceState::Cleaned);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(ws.state(), WorkspaceState::Cleaned);
        assert_eq!(close_calls(&cad), 1);
    }

    #[test]
    fn cleaned_when_lock_released_after_second_retry() {
        let mut fs = MockFileOps::new();
        fs.expect_exists().returning(|_| true);
        let mut calls = 0;
        fs.expect_remove_dir_all().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Err(locked())
            } else {
                Ok(())
            }
        });
        fs.expect_rename().never();

        let manager = WorkspaceManager::with_fs(DEFAULT_PREFIX, CleanupPolicy::immediate(3), fs);
        let mut cad = SimulatedCad::new();
        let mut ws = active("/work/Temp_Assembly_2");

        let outcome = manager.cleanup(&mut cad, &mut ws);
        assert!(outcome.is_clean());
        assert_eq!(outcome.attempts, 3);
        assert!(!outcome.renamed);
        assert_eq!(close_calls(&cad), 3);
    }

    #[test]
    fn rename_fallback_after_retries_exhaust() {
        let mut fs = MockFileOps::new();
        fs.expect_exists().returning(|_| true);
        fs.expect_remove_dir_all()
            .withf(|p| p == Path::new("/work/Temp_Assembly_3"))
            .times(2)
            .returning(|_| Err(locked()));
        fs.expect_rename().times(1).returning(|_, _| Ok(()));
        fs.expect_remove_dir_all()
            .withf(|p| p.to_string_lossy().contains("_deleted_"))
            .times(1)
            .returning(|_| Ok(()));

        let manager = WorkspaceManager::with_fs(DEFAULT_PREFIX, CleanupPolicy::immediate(2), fs);
        let mut cad = SimulatedCad::new();
        let mut ws = active("/work/Temp_Assembly_3");

        let outcome = manager.cleanup(&mut cad, &mut ws);
        assert!(outcome.is_clean());
        assert!(outcome.renamed);
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn cleanup_failed_reports_residual_path() {
        let mut fs = MockFileOps::new();
        fs.expect_exists().returning(|_| true);
        fs.expect_remove_dir_all().returning(|_| Err(locked()));
        fs.expect_rename().returning(|_, _| Err(locked()));

        let manager = WorkspaceManager::with_fs(DEFAULT_PREFIX, CleanupPolicy::immediate(3), fs);
        let mut cad = SimulatedCad::new();
        let mut ws = active("/work/Temp_Assembly_4");

        let outcome = manager.cleanup(&mut cad, &mut ws);
        assert_eq!(outcome.state, WorkspaceState::CleanupFailed);
        assert_eq!(outcome.residual(), Some(Path::new("/work/Temp_Assembly_4")));
        assert_eq!(ws.residual(), Some(Path::new("/work/Temp_Assembly_4")));

        // Terminal: a second call reports without retrying
        let again = manager.cleanup(&mut cad, &mut ws);
        assert_eq!(again.state, WorkspaceState::CleanupFailed);
        assert_eq!(again.attempts, 0);
    }

    #[test]
    fn rename_fallback_can_be_disabled() {
        let mut fs = MockFileOps::new();
        fs.expect_exists().returning(|_| true);
        fs.expect_remove_dir_all().times(1).returning(|_| Err(locked()));
        fs.expect_rename().never();

        let policy = CleanupPolicy::immediate(1).with_rename_fallback(false);
        let manager = WorkspaceManager::with_fs(DEFAULT_PREFIX, policy, fs);
        let mut cad = SimulatedCad::new();
        let mut ws = active("/work/Temp_Assembly_5");

        let outcome = manager.cleanup(&mut cad, &mut ws);
        assert_eq!(outcome.state, WorkspaceState::CleanupFailed);
    }

    #[test]
    fn create_removes_partial_directory_on_copy_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Asm.json");
        AssemblyDocument::new("Asm").store(&source).unwrap();
        let parent = dir.path().join("work");

        let mut cad = SimulatedCad::new();
        cad.inject_failure(FailurePoint::PackAndGo);
        let manager = WorkspaceManager::default();

        let err = manager.create(&mut cad, &source, &parent).unwrap_err();
        assert!(matches!(err, WorkspaceError::CopyFailed { .. }));
        assert!(StdFs.subdirectories(&parent).unwrap().is_empty());
        assert_eq!(cad.open_count(), 0);
    }

    #[test]
    fn create_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut cad = SimulatedCad::new();
        let err = WorkspaceManager::default()
            .create(&mut cad, &dir.path().join("nope.json"), dir.path())
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::SourceMissing(_)));
    }

    #[test]
    fn names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::default();
        let a = manager.allocate_root(dir.path()).unwrap();
        let b = manager.allocate_root(dir.path()).unwrap();
        assert_ne!(a, b);
        assert!(manager.is_workspace_dir(&a));
        assert!(manager.is_workspace_dir(&b));
    }
}
