//! Error types for workspace management

use crate::state::WorkspaceState;
use cadmod_bridge::BridgeError;
use std::path::PathBuf;

/// Fatal workspace failures
///
/// Creation failures clean up any partial directory before they are returned.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Source assembly does not exist
    #[error("source assembly not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// Could not allocate a collision-free directory name
    #[error("no free workspace name under {}", .0.display())]
    NameExhausted(PathBuf),

    /// CAD surface could not open the source assembly
    #[error("could not open source assembly {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: BridgeError,
    },

    /// Bundling copy did not complete
    #[error("copy into {} incomplete: {source}", path.display())]
    CopyFailed {
        path: PathBuf,
        #[source]
        source: BridgeError,
    },

    /// Filesystem error
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Lifecycle transition not permitted
    #[error("illegal workspace transition {from} -> {to}")]
    IllegalTransition {
        from: WorkspaceState,
        to: WorkspaceState,
    },
}

impl WorkspaceError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the CAD surface caused the failure
    #[inline]
    #[must_use]
    pub fn is_bridge_failure(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::CopyFailed { .. })
    }
}

/// Non-fatal report that a workspace directory could not be removed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[error("workspace could not be removed, delete manually: {}", path.display())]
pub struct CleanupWarning {
    /// Directory left behind
    pub path: PathBuf,
    /// Last failure observed
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_shows_path_verbatim() {
        let warning = CleanupWarning {
            path: PathBuf::from("/tmp/Temp_Assembly_20240101_120000"),
            reason: "busy".into(),
        };
        assert_eq!(
            warning.to_string(),
            "workspace could not be removed, delete manually: /tmp/Temp_Assembly_20240101_120000"
        );
    }

    #[test]
    fn classifies_bridge_failures() {
        let err = WorkspaceError::CopyFailed {
            path: PathBuf::from("ws"),
            source: BridgeError::PackAndGoIncomplete { missing: vec![] },
        };
        assert!(err.is_bridge_failure());
        assert!(!WorkspaceError::SourceMissing(PathBuf::from("a")).is_bridge_failure());
    }
}
