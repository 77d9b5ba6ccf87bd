//! Validation errors for modification documents
//!
//! Every error names the entry it came from (when there is one) so a caller
//! can point the user at the offending instruction. Errors never abort the
//! whole document: each one excludes only the entry it describes.

use crate::model::DescriptorKind;

/// A single problem found while validating a modification document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Input is not valid JSON
    #[error("JSON parse error: {0}")]
    Syntax(String),

    /// Document root is not a JSON object
    #[error("document root must be an object")]
    NotAnObject,

    /// Document has no `modifications` array
    #[error("document is missing the 'modifications' array")]
    MissingModifications,

    /// `modifications` exists but is not an array
    #[error("'modifications' must be an array")]
    ModificationsNotArray,

    /// Entry in `modifications` is not an object
    #[error("modification #{index}: entry must be an object")]
    EntryNotObject { index: usize },

    /// Entry has no `type` field
    #[error("modification #{index}: missing 'type'")]
    MissingType { index: usize },

    /// Entry `type` is not one of the known kinds
    #[error("modification #{index}: unknown type '{kind}'")]
    UnknownType { index: usize, kind: String },

    /// A required field for the entry's kind is absent
    #[error("modification #{index} ({kind}): missing required field '{field}'")]
    MissingField {
        index: usize,
        kind: DescriptorKind,
        field: &'static str,
    },

    /// A field is present but has the wrong shape
    #[error("modification #{index}: field '{field}' must be {expected}")]
    InvalidField {
        index: usize,
        field: &'static str,
        expected: &'static str,
    },

    /// Document parsed but contained no usable modification
    #[error("document contains no modifications")]
    Empty,
}

impl ValidationError {
    /// Index of the entry this error refers to, if any
    #[inline]
    #[must_use]
    pub fn entry_index(&self) -> Option<usize> {
        match self {
            Self::EntryNotObject { index }
            | Self::MissingType { index }
            | Self::UnknownType { index, .. }
            | Self::MissingField { index, .. }
            | Self::InvalidField { index, .. } => Some(*index),
            Self::Syntax(_)
            | Self::NotAnObject
            | Self::MissingModifications
            | Self::ModificationsNotArray
            | Self::Empty => None,
        }
    }

    /// True when the error invalidates the whole document rather than one entry
    #[inline]
    #[must_use]
    pub fn is_document_level(&self) -> bool {
        self.entry_index().is_none()
    }

    pub(crate) fn missing(index: usize, kind: DescriptorKind, field: &'static str) -> Self {
        Self::MissingField { index, kind, field }
    }

    pub(crate) fn invalid(index: usize, field: &'static str, expected: &'static str) -> Self {
        Self::InvalidField {
            index,
            field,
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_names_the_field() {
        let err = ValidationError::missing(2, DescriptorKind::Dimension, "newValue");
        assert_eq!(
            err.to_string(),
            "modification #2 (dimension): missing required field 'newValue'"
        );
    }

    #[test]
    fn unknown_type_display() {
        let err = ValidationError::UnknownType {
            index: 0,
            kind: "extrude".to_string(),
        };
        assert_eq!(err.to_string(), "modification #0: unknown type 'extrude'");
    }

    #[test]
    fn document_level_classification() {
        assert!(ValidationError::NotAnObject.is_document_level());
        assert!(ValidationError::Empty.is_document_level());
        assert!(!ValidationError::MissingType { index: 1 }.is_document_level());
        assert_eq!(
            ValidationError::invalid(3, "edges", "an array of strings").entry_index(),
            Some(3)
        );
    }
}
