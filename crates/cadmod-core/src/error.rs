//! Error types for cadmod Core
//!
//! Provides error handling for:
//! - Per-descriptor execution failures (recorded as failed results, never fatal)
//! - Session failures that end a run
//! - Run orchestration and configuration failures

use cadmod_bridge::BridgeError;
use cadmod_descriptor::Axis;
use cadmod_workspace::{WorkspaceError, WorkspaceState};
use std::path::PathBuf;

/// Failure applying one descriptor; the batch continues
#[derive(Debug, thiserror::Error)]
pub enum DescriptorExecutionError {
    /// CAD surface reported an error
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Scale found no dimension tagged with the axis
    #[error("no dimension on axis {0}")]
    NoDimensionOnAxis(Axis),

    /// Every dimension write of a scale failed
    #[error("all {failed} dimension write(s) on axis {axis} failed")]
    ScaleWritesFailed { axis: Axis, failed: usize },

    /// Feature operation is not implemented
    #[error("unsupported feature operation: {0}")]
    UnsupportedFeature(String),
}

impl DescriptorExecutionError {
    /// True when the target named by the descriptor does not exist
    #[inline]
    #[must_use]
    pub fn is_missing_target(&self) -> bool {
        match self {
            Self::Bridge(e) => e.is_lookup_failure(),
            Self::NoDimensionOnAxis(_) => true,
            _ => false,
        }
    }
}

/// Failure that ends a run; no partial results are reported
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Workspace copy could not be opened
    #[error("could not open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: BridgeError,
    },

    /// Workspace is not in a state changes can be applied in
    #[error("workspace is {0}, expected active")]
    WorkspaceNotActive(WorkspaceState),

    /// Changes could not be persisted
    #[error("save failed: {0}")]
    Save(#[source] BridgeError),

    /// Bundling the finished assembly failed
    #[error("commit failed: {0}")]
    Commit(#[source] BridgeError),
}

/// Configuration loading failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file unreadable
    #[error("io error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for this schema
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main run error type
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Modification document produced no descriptors
    #[error("nothing to apply: {} validation error(s)", errors.len())]
    Validation { errors: Vec<String> },

    /// Previous run's workspace has not been committed or discarded
    #[error("previous workspace {} is still {state}", path.display())]
    Busy {
        path: PathBuf,
        state: WorkspaceState,
    },

    /// Another run is in flight on this runner
    #[error("a run is already in progress")]
    InProgress,

    /// No run awaiting commit or discard
    #[error("no active workspace")]
    NoActiveWorkspace,

    /// Workspace creation failed
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// CAD session failed
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Blocking worker panicked or was cancelled
    #[error("worker failed: {0}")]
    Join(String),
}

impl RunError {
    /// True when retrying later may succeed without changing inputs
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy { .. } | Self::InProgress)
    }
}

impl From<tokio::task::JoinError> for RunError {
    fn from(value: tokio::task::JoinError) -> Self {
        RunError::Join(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_dimension_message_names_axis() {
        let err = DescriptorExecutionError::NoDimensionOnAxis(Axis::Y);
        assert_eq!(err.to_string(), "no dimension on axis Y");
        assert!(err.is_missing_target());
    }

    #[test]
    fn unsupported_feature_names_operation() {
        let err = DescriptorExecutionError::UnsupportedFeature("knurl".into());
        assert_eq!(err.to_string(), "unsupported feature operation: knurl");
        assert!(!err.is_missing_target());
    }

    #[test]
    fn bridge_errors_pass_through() {
        let err: DescriptorExecutionError = BridgeError::FeatureNotFound("Sketch9".into()).into();
        assert_eq!(err.to_string(), "feature not found: Sketch9");
        assert!(err.is_missing_target());
    }

    #[test]
    fn busy_is_retryable() {
        let err = RunError::Busy {
            path: PathBuf::from("ws"),
            state: WorkspaceState::Active,
        };
        assert!(err.is_retryable());
        assert!(!RunError::NoActiveWorkspace.is_retryable());
    }
}
