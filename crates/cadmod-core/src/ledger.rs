//! Rollback and result ledger
//!
//! Append-only for the length of a run. Originals are keyed by
//! `(reference, attribute)` and the first capture of a key wins, so a value
//! changed twice still rolls back to what it was before the run.

use crate::outcome::ModificationResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one captured attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RollbackKey {
    /// Feature or component reference
    pub reference: String,
    /// Attribute under the reference (dimension name, or `material`)
    pub attribute: String,
}

impl RollbackKey {
    /// Create a key
    #[inline]
    #[must_use]
    pub fn new(reference: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for RollbackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.reference, self.attribute)
    }
}

/// How a captured value is written back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackKind {
    /// Dimension addressed by feature
    FeatureDimension,
    /// Dimension addressed by component (scale writes)
    ComponentDimension,
    /// Component material
    Material,
}

/// Captured original value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OriginalValue {
    /// Numeric value
    Number(f64),
    /// Text value
    Text(String),
}

impl fmt::Display for OriginalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One captured original
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackEntry {
    /// What was captured
    pub key: RollbackKey,
    /// How to restore it
    pub kind: RollbackKind,
    /// Value before the run touched it
    pub original: OriginalValue,
}

/// Success and total counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Results with `success == true`
    pub success_count: usize,
    /// All results
    pub total_count: usize,
}

impl RunSummary {
    /// Failed results
    #[inline]
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.total_count - self.success_count
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} succeeded", self.success_count, self.total_count)
    }
}

/// Originals and results of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollbackLedger {
    originals: IndexMap<RollbackKey, RollbackEntry>,
    results: Vec<ModificationResult>,
}

impl RollbackLedger {
    /// Empty ledger
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture an original; returns false when the key was already captured
    pub fn capture(&mut self, key: RollbackKey, kind: RollbackKind, original: OriginalValue) -> bool {
        if self.originals.contains_key(&key) {
            return false;
        }
        tracing::debug!("Captured {} = {}", key, original);
        self.originals.insert(
            key.clone(),
            RollbackEntry {
                key,
                kind,
                original,
            },
        );
        true
    }

    /// Append a final result
    pub fn record(&mut self, result: ModificationResult) {
        self.results.push(result);
    }

    /// Original captured for a key
    #[must_use]
    pub fn original(&self, key: &RollbackKey) -> Option<&OriginalValue> {
        self.originals.get(key).map(|e| &e.original)
    }

    /// Captured originals in capture order
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &RollbackEntry> + ExactSizeIterator {
        self.originals.values()
    }

    /// Results in input order
    #[inline]
    #[must_use]
    pub fn results(&self) -> &[ModificationResult] {
        &self.results
    }

    /// Success and total counts
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            success_count: self.results.iter().filter(|r| r.success).count(),
            total_count: self.results.len(),
        }
    }

    /// Split into originals and results
    #[must_use]
    pub fn into_parts(self) -> (Vec<RollbackEntry>, Vec<ModificationResult>) {
        (self.originals.into_values().collect(), self.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_capture_wins() {
        let mut ledger = RollbackLedger::new();
        let key = RollbackKey::new("Sketch3", "D1@Sketch3");
        assert!(ledger.capture(key.clone(), RollbackKind::FeatureDimension, OriginalValue::Number(10.0)));
        assert!(!ledger.capture(key.clone(), RollbackKind::FeatureDimension, OriginalValue::Number(12.0)));
        assert_eq!(ledger.original(&key), Some(&OriginalValue::Number(10.0)));
        assert_eq!(ledger.entries().len(), 1);
    }

    #[test]
    fn summary_counts() {
        let mut ledger = RollbackLedger::new();
        ledger.record(ModificationResult::succeeded("a", "1", "2"));
        ledger.record(ModificationResult::failed("b", "3", "nope"));
        ledger.record(ModificationResult::succeeded("c", "", "Brass"));
        let summary = ledger.summary();
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.total_count, 3);
        assert_eq!(summary.failure_count(), 1);
        assert_eq!(summary.to_string(), "2/3 succeeded");
    }

    #[test]
    fn entries_keep_capture_order() {
        let mut ledger = RollbackLedger::new();
        for name in ["b", "a", "c"] {
            ledger.capture(RollbackKey::new(name, "x"), RollbackKind::Material, OriginalValue::Text(name.into()));
        }
        let order: Vec<_> = ledger.entries().map(|e| e.key.reference.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
        let reversed: Vec<_> = ledger.entries().rev().map(|e| e.key.reference.as_str()).collect();
        assert_eq!(reversed, vec!["c", "a", "b"]);
    }

    proptest! {
        #[test]
        fn original_is_always_first_value(values in prop::collection::vec((0u8..4, -1000i32..1000), 1..40)) {
            let mut ledger = RollbackLedger::new();
            let mut first = std::collections::HashMap::new();
            for (slot, v) in &values {
                let key = RollbackKey::new(format!("F{slot}"), "D1");
                first.entry(key.clone()).or_insert(f64::from(*v));
                ledger.capture(key, RollbackKind::FeatureDimension, OriginalValue::Number(f64::from(*v)));
            }
            prop_assert_eq!(ledger.entries().len(), first.len());
            for (key, v) in first {
                prop_assert_eq!(ledger.original(&key), Some(&OriginalValue::Number(v)));
            }
        }
    }
}
