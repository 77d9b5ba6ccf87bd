//! Error types for the CAD bridge
//!
//! One enum covers every failure the automation surface can report. The
//! classifiers tell the caller whether the open document is still usable.

use crate::session::SessionId;
use std::path::PathBuf;

/// Errors reported by a [`CadBridge`](crate::CadBridge) call
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Document file does not exist
    #[error("document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    /// CAD surface refused to open the document
    #[error("could not open {}: {message}", path.display())]
    OpenFailed { path: PathBuf, message: String },

    /// Session handle is closed or was never issued
    #[error("session {0} is not open")]
    InvalidSession(SessionId),

    /// No feature with this name exists in the document
    #[error("feature not found: {0}")]
    FeatureNotFound(String),

    /// Feature exists but has no dimension with this name
    #[error("dimension '{dimension}' not found under feature '{feature}'")]
    DimensionNotFound { feature: String, dimension: String },

    /// No component with this name exists in the assembly
    #[error("component not found: {0}")]
    ComponentNotFound(String),

    /// A selection reference does not resolve to geometry
    #[error("reference not found: {0}")]
    ReferenceNotFound(String),

    /// Feature insertion needs a selection but none is active
    #[error("no geometry selected")]
    EmptySelection,

    /// CAD surface rejected a feature insertion
    #[error("{kind} rejected: {message}")]
    FeatureRejected { kind: String, message: String },

    /// Value is outside what the surface accepts
    #[error("invalid value {value} for {target}")]
    InvalidValue { target: String, value: f64 },

    /// Save did not complete
    #[error("save failed for {}: {message}", path.display())]
    SaveFailed { path: PathBuf, message: String },

    /// Bundling could not copy every referenced file
    #[error("pack and go incomplete: {} file(s) missing", missing.len())]
    PackAndGoIncomplete { missing: Vec<PathBuf> },

    /// Filesystem error while reading or writing a document
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other failure reported by the automation surface
    #[error("automation surface error: {0}")]
    Surface(String),
}

impl BridgeError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create open failure for path
    pub fn open_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True when the document can no longer be worked on through this session
    #[inline]
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::DocumentNotFound(_) | Self::OpenFailed { .. } | Self::InvalidSession(_)
        )
    }

    /// True when the error names something missing from the document model
    #[inline]
    #[must_use]
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            Self::FeatureNotFound(_)
                | Self::DimensionNotFound { .. }
                | Self::ComponentNotFound(_)
                | Self::ReferenceNotFound(_)
        )
    }
}

/// Result alias for bridge calls
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_not_found_display() {
        let err = BridgeError::DimensionNotFound {
            feature: "Sketch3".into(),
            dimension: "D9@Sketch3".into(),
        };
        assert_eq!(
            err.to_string(),
            "dimension 'D9@Sketch3' not found under feature 'Sketch3'"
        );
    }

    #[test]
    fn classifiers() {
        assert!(BridgeError::DocumentNotFound(PathBuf::from("a.json")).is_session_fatal());
        assert!(!BridgeError::EmptySelection.is_session_fatal());
        assert!(BridgeError::ComponentNotFound("Base-1".into()).is_lookup_failure());
        assert!(!BridgeError::Surface("x".into()).is_lookup_failure());
    }
}
