//! Per-descriptor results and progress updates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Format a value the way results report it (`10.0` → `"10"`)
#[inline]
#[must_use]
pub fn format_value(value: f64) -> String {
    format!("{value}")
}

/// Final outcome of one attempted descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModificationResult {
    /// Descriptor display name
    pub feature_name: String,
    /// Whether the change was applied
    pub success: bool,
    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Value before the change
    pub old_value: String,
    /// Value after the change (requested value on failure)
    pub new_value: String,
    /// Units reported by the CAD surface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl ModificationResult {
    /// Successful change
    #[must_use]
    pub fn succeeded(
        feature_name: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            feature_name: feature_name.into(),
            success: true,
            error_message: None,
            old_value: old_value.into(),
            new_value: new_value.into(),
            units: None,
        }
    }

    /// Failed change
    #[must_use]
    pub fn failed(
        feature_name: impl Into<String>,
        new_value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            feature_name: feature_name.into(),
            success: false,
            error_message: Some(message.into()),
            old_value: String::new(),
            new_value: new_value.into(),
            units: None,
        }
    }

    /// With the value read before a failed write
    #[inline]
    #[must_use]
    pub fn with_old_value(mut self, old_value: impl Into<String>) -> Self {
        self.old_value = old_value.into();
        self
    }

    /// With units
    #[inline]
    #[must_use]
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }
}

/// Lifecycle of one descriptor within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProcessingState {
    /// Queued
    Pending,
    /// Being applied
    Running,
    /// Applied
    Succeeded,
    /// Not applied
    Failed,
}

impl ProcessingState {
    /// True for `Succeeded` and `Failed`
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Live status of one descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProcessingStatus {
    /// Descriptor display name
    pub feature_name: String,
    /// Current state
    pub state: ProcessingState,
    /// Human-readable detail
    pub message: String,
    /// Time spent so far
    pub elapsed: Duration,
}

/// One progress event emitted by the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Position of the descriptor in the batch
    pub index: usize,
    /// Batch size
    pub total: usize,
    /// Terminal results so far divided by batch size
    pub fraction: f64,
    /// Descriptor status
    pub status: FeatureProcessingStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_format_without_trailing_zero() {
        assert_eq!(format_value(10.0), "10");
        assert_eq!(format_value(12.5), "12.5");
        assert_eq!(format_value(0.25), "0.25");
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = ModificationResult::succeeded("D1@Sketch3", "10", "12").with_units("mm");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["featureName"], "D1@Sketch3");
        assert_eq!(json["oldValue"], "10");
        assert_eq!(json["newValue"], "12");
        assert!(json.get("errorMessage").is_none());
    }

    #[test]
    fn state_order_advances() {
        assert!(ProcessingState::Pending < ProcessingState::Running);
        assert!(ProcessingState::Running < ProcessingState::Succeeded);
        assert!(ProcessingState::Failed.is_terminal());
        assert!(!ProcessingState::Running.is_terminal());
    }
}
