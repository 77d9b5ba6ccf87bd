//! Change Runner
//!
//! Async front door for a change run:
//! - Refuses to start while the previous workspace is still active
//! - Materializes the workspace and applies the batch on a blocking worker
//! - Holds the finished workspace until the caller commits or discards it
//!
//! All bridge calls go through one mutex, so a run never interleaves with
//! another caller's use of the same CAD session.

use crate::cancel::CancelToken;
use crate::config::RunConfig;
use crate::dispatcher::{BatchOutcome, Dispatcher, ScaleLogLine};
use crate::error::{RunError, SessionError};
use crate::ledger::{RollbackEntry, RollbackLedger, RunSummary};
use crate::outcome::{ModificationResult, ProgressUpdate};
use cadmod_bridge::CadBridge;
use cadmod_descriptor::parse_document;
use cadmod_workspace::{CleanupOutcome, FileOps, StdFs, SweepReport, Workspace, WorkspaceManager};
use chrono::Local;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Serializable summary of one run for export collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Assembly the run started from
    pub source_assembly: PathBuf,
    /// Workspace directory the changes were applied in
    pub workspace: PathBuf,
    /// Entries dropped by validation
    pub validation_errors: Vec<String>,
    /// One result per attempted descriptor, in input order
    pub results: Vec<ModificationResult>,
    /// Success and total counts
    pub summary: RunSummary,
    /// Originals captured before they were changed
    pub rollback: Vec<RollbackEntry>,
    /// Dimensions rewritten by scale descriptors
    pub scale_log: Vec<ScaleLogLine>,
    /// True when the batch stopped early on request
    pub cancelled: bool,
    /// Set once the workspace has been torn down
    pub cleanup: Option<CleanupOutcome>,
}

impl RunReport {
    fn new(workspace: &Workspace, validation_errors: Vec<String>, outcome: &BatchOutcome) -> Self {
        Self {
            source_assembly: workspace.source_assembly().to_path_buf(),
            workspace: workspace.root().to_path_buf(),
            validation_errors,
            results: outcome.results().to_vec(),
            summary: outcome.summary(),
            rollback: outcome.ledger.entries().cloned().collect(),
            scale_log: outcome.scale_log.clone(),
            cancelled: outcome.cancelled,
            cleanup: None,
        }
    }

    /// Pretty JSON
    ///
    /// # Errors
    /// Serialization failure
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Where a committed assembly landed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitReport {
    /// Output directory
    pub destination: PathBuf,
    /// Files written, assembly first
    pub files: Vec<PathBuf>,
    /// Workspace teardown
    pub cleanup: CleanupOutcome,
}

#[derive(Debug, Default)]
struct RunnerState {
    in_flight: bool,
    workspace: Option<Workspace>,
    ledger: Option<RollbackLedger>,
}

struct InFlight(Arc<Mutex<RunnerState>>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.lock().in_flight = false;
    }
}

/// Runs change batches one at a time against a shared CAD session
#[derive(Debug)]
pub struct ChangeRunner<B: CadBridge + 'static, F: FileOps + 'static = StdFs> {
    bridge: Arc<Mutex<B>>,
    manager: Arc<WorkspaceManager<F>>,
    config: RunConfig,
    state: Arc<Mutex<RunnerState>>,
    cancel: CancelToken,
}

impl<B: CadBridge + 'static> ChangeRunner<B, StdFs> {
    /// Runner using the real filesystem
    #[must_use]
    pub fn new(bridge: B, config: RunConfig) -> Self {
        Self::with_file_ops(bridge, config, StdFs)
    }
}

impl<B: CadBridge + 'static, F: FileOps + 'static> ChangeRunner<B, F> {
    /// Runner using a custom filesystem for workspace teardown
    #[must_use]
    pub fn with_file_ops(bridge: B, config: RunConfig, fs: F) -> Self {
        let manager = WorkspaceManager::with_fs(
            config.workspace_prefix.clone(),
            config.cleanup.clone(),
            fs,
        );
        Self {
            bridge: Arc::new(Mutex::new(bridge)),
            manager: Arc::new(manager),
            config,
            state: Arc::new(Mutex::new(RunnerState::default())),
            cancel: CancelToken::new(),
        }
    }

    /// Shared CAD bridge
    #[inline]
    #[must_use]
    pub fn bridge(&self) -> Arc<Mutex<B>> {
        Arc::clone(&self.bridge)
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Token that cancels the current batch between descriptors
    #[inline]
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Workspace awaiting commit or discard
    #[must_use]
    pub fn active_workspace(&self) -> Option<Workspace> {
        self.state.lock().workspace.clone()
    }

    fn begin(&self) -> Result<InFlight, RunError> {
        let mut state = self.state.lock();
        if state.in_flight {
            return Err(RunError::InProgress);
        }
        if let Some(ws) = state.workspace.as_ref().filter(|ws| !ws.state().is_terminal()) {
            return Err(RunError::Busy {
                path: ws.root().to_path_buf(),
                state: ws.state(),
            });
        }
        state.in_flight = true;
        Ok(InFlight(Arc::clone(&self.state)))
    }

    /// Validate `document` and apply it to an isolated copy of `source`
    ///
    /// Entries that fail validation are reported and skipped; the run
    /// proceeds with the rest. The workspace stays active afterwards until
    /// [`commit`](Self::commit) or [`discard`](Self::discard).
    ///
    /// # Errors
    /// - `RunError::Busy` / `RunError::InProgress` if a previous run is unfinished
    /// - `RunError::Validation` if no descriptor survived validation
    /// - `RunError::Workspace` if the copy could not be made
    /// - `RunError::Session` if the copy could not be opened or saved; the
    ///   workspace is cleaned up before returning
    pub async fn run<P>(&self, source: &Path, document: &str, on_progress: P) -> Result<RunReport, RunError>
    where
        P: FnMut(&ProgressUpdate) + Send + 'static,
    {
        let guard = self.begin()?;
        self.cancel.reset();

        let report = parse_document(document);
        let validation_errors = report.error_messages();
        for message in &validation_errors {
            tracing::warn!("Skipping invalid entry: {}", message);
        }
        if report.descriptors.is_empty() {
            return Err(RunError::Validation {
                errors: validation_errors,
            });
        }
        tracing::info!(
            "Run on {}: {} change(s), {} rejected",
            source.display(),
            report.descriptors.len(),
            validation_errors.len()
        );

        let bridge = Arc::clone(&self.bridge);
        let manager = Arc::clone(&self.manager);
        let dispatcher = Dispatcher::new(&self.config).with_cancel_token(self.cancel.clone());
        let working_root = self.config.working_root.clone();
        let sweep = self.config.sweep_on_start;
        let source = source.to_path_buf();
        let descriptors = report.descriptors;
        let mut on_progress = on_progress;

        let (workspace, outcome) = tokio::task::spawn_blocking(move || -> Result<_, RunError> {
            let mut bridge = bridge.lock();
            if sweep {
                let swept = manager.sweep_orphans(&working_root, &[]);
                tracing::info!("Swept {} orphaned workspace(s)", swept.removed.len());
            }
            let mut workspace = manager.create(&mut *bridge, &source, &working_root)?;
            match dispatcher.apply(&mut *bridge, &descriptors, &workspace, &mut on_progress) {
                Ok(outcome) => Ok((workspace, outcome)),
                Err(e) => {
                    tracing::error!("Run failed: {}", e);
                    let cleanup = manager.cleanup(&mut *bridge, &mut workspace);
                    if let Some(warning) = cleanup.warning {
                        tracing::warn!("{}", warning);
                    }
                    Err(e.into())
                }
            }
        })
        .await??;

        let report = RunReport::new(&workspace, validation_errors, &outcome);
        let mut state = self.state.lock();
        state.workspace = Some(workspace);
        state.ledger = Some(outcome.ledger);
        drop(state);
        drop(guard);
        Ok(report)
    }

    /// Restore every original captured by the last run in its workspace
    ///
    /// # Errors
    /// - `RunError::NoActiveWorkspace` when nothing awaits commit or discard
    /// - `RunError::Session` if the copy cannot be opened or saved
    pub async fn revert<P>(&self, on_progress: P) -> Result<Vec<ModificationResult>, RunError>
    where
        P: FnMut(&ProgressUpdate) + Send + 'static,
    {
        let (workspace, ledger) = self.active_run()?;
        let bridge = Arc::clone(&self.bridge);
        let dispatcher = Dispatcher::new(&self.config);
        let mut on_progress = on_progress;

        let outcome = tokio::task::spawn_blocking(move || {
            let mut bridge = bridge.lock();
            dispatcher.revert(&mut *bridge, &ledger, &workspace, &mut on_progress)
        })
        .await??;

        Ok(outcome.results().to_vec())
    }

    /// Bundle the modified assembly into the output folder, then tear the workspace down
    ///
    /// On failure the workspace stays active so the commit can be retried or discarded.
    ///
    /// # Errors
    /// - `RunError::NoActiveWorkspace` when nothing awaits commit
    /// - `RunError::Session` if the copy cannot be opened or bundled
    pub async fn commit(&self) -> Result<CommitReport, RunError> {
        let (mut workspace, _) = self.active_run()?;
        let bridge = Arc::clone(&self.bridge);
        let manager = Arc::clone(&self.manager);
        let destination = self.commit_destination(&workspace);

        let (workspace, committed) = tokio::task::spawn_blocking(move || {
            let mut bridge = bridge.lock();
            let copy = workspace.assembly_copy().to_path_buf();
            let packed = bridge
                .open_document(&copy)
                .map_err(|source| SessionError::Open { path: copy, source })
                .and_then(|session| {
                    bridge
                        .pack_and_go(&session, &destination)
                        .map_err(SessionError::Commit)
                });
            let committed = match packed {
                Ok(files) => {
                    tracing::info!(
                        "Committed {} file(s) to {}",
                        files.len(),
                        destination.display()
                    );
                    let cleanup = manager.cleanup(&mut *bridge, &mut workspace);
                    Ok(CommitReport {
                        destination,
                        files,
                        cleanup,
                    })
                }
                Err(e) => {
                    tracing::error!("Commit failed: {}", e);
                    Err(e)
                }
            };
            (workspace, committed)
        })
        .await?;

        self.state.lock().workspace = Some(workspace);
        committed.map_err(RunError::from)
    }

    /// Tear the workspace down without keeping any change
    ///
    /// # Errors
    /// `RunError::NoActiveWorkspace` when nothing awaits discard
    pub async fn discard(&self) -> Result<CleanupOutcome, RunError> {
        let (mut workspace, _) = self.active_run()?;
        let bridge = Arc::clone(&self.bridge);
        let manager = Arc::clone(&self.manager);

        let (workspace, outcome) = tokio::task::spawn_blocking(move || {
            let mut bridge = bridge.lock();
            let outcome = manager.cleanup(&mut *bridge, &mut workspace);
            (workspace, outcome)
        })
        .await?;

        tracing::info!("Discarded {}: {}", workspace.root().display(), workspace.state());
        self.state.lock().workspace = Some(workspace);
        Ok(outcome)
    }

    /// Remove leftover workspace directories, keeping the active one
    ///
    /// # Errors
    /// `RunError::Join` if the blocking worker fails
    pub async fn sweep_orphans(&self) -> Result<SweepReport, RunError> {
        let manager = Arc::clone(&self.manager);
        let root = self.config.working_root.clone();
        let keep: Vec<PathBuf> = self
            .active_workspace()
            .filter(|ws| !ws.state().is_terminal())
            .map(|ws| ws.root().to_path_buf())
            .into_iter()
            .collect();
        Ok(tokio::task::spawn_blocking(move || manager.sweep_orphans(&root, &keep)).await?)
    }

    fn active_run(&self) -> Result<(Workspace, RollbackLedger), RunError> {
        let state = self.state.lock();
        match &state.workspace {
            Some(ws) if !ws.state().is_terminal() && !state.in_flight => {
                Ok((ws.clone(), state.ledger.clone().unwrap_or_default()))
            }
            _ => Err(RunError::NoActiveWorkspace),
        }
    }

    fn commit_destination(&self, workspace: &Workspace) -> PathBuf {
        let stem = workspace
            .source_assembly()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "assembly".to_string());
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let base = self.config.output_dir().join(format!("{stem}_{stamp}"));
        if !base.exists() {
            return base;
        }
        (1..)
            .map(|n| self.config.output_dir().join(format!("{stem}_{stamp}_{n}")))
            .find(|p| !p.exists())
            .unwrap_or(base)
    }
}
