//! cadmod Workspace
//!
//! Isolated, disposable copies of an assembly:
//! - [`WorkspaceManager::create`]: bundle the assembly and every referenced file into a fresh directory
//! - [`WorkspaceManager::cleanup`]: retrying, lock-tolerant teardown that never fails
//! - [`WorkspaceManager::sweep_orphans`]: remove directories left by earlier runs
//!
//! The source assembly is only ever read.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod fs;
pub mod manager;
pub mod policy;
pub mod state;

pub use error::{CleanupWarning, WorkspaceError};
pub use fs::{FileOps, StdFs};
pub use manager::{CleanupOutcome, SweepReport, Workspace, WorkspaceManager, DEFAULT_PREFIX};
pub use policy::CleanupPolicy;
pub use state::{allowed_transitions, validate_transition, WorkspaceState};
