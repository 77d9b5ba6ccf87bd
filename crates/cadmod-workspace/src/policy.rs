//! Cleanup retry policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How hard teardown tries before giving up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupPolicy {
    /// Delay before each direct delete attempt, in milliseconds
    pub retry_delays_ms: Vec<u64>,
    /// Rename the directory aside and delete the renamed copy when direct deletes fail
    pub rename_fallback: bool,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            retry_delays_ms: vec![0, 1000, 1000],
            rename_fallback: true,
        }
    }
}

impl CleanupPolicy {
    /// `attempts` direct deletes with no delay between them
    #[must_use]
    pub fn immediate(attempts: usize) -> Self {
        Self {
            retry_delays_ms: vec![0; attempts.max(1)],
            rename_fallback: true,
        }
    }

    /// Set the per-attempt delays
    #[must_use]
    pub fn with_retry_delays_ms(mut self, delays: Vec<u64>) -> Self {
        self.retry_delays_ms = delays;
        self
    }

    /// Enable or disable the rename fallback
    #[must_use]
    pub fn with_rename_fallback(mut self, enabled: bool) -> Self {
        self.rename_fallback = enabled;
        self
    }

    /// Number of direct delete attempts; always at least one
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.retry_delays_ms.len().max(1)
    }

    /// Delay before each attempt
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let fallback = self.retry_delays_ms.is_empty().then_some(0);
        self.retry_delays_ms
            .iter()
            .copied()
            .chain(fallback)
            .map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_three_attempts() {
        let policy = CleanupPolicy::default();
        assert_eq!(policy.attempts(), 3);
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(
            delays,
            vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(1)]
        );
    }

    #[test]
    fn empty_delays_still_attempt_once() {
        let policy = CleanupPolicy::default().with_retry_delays_ms(Vec::new());
        assert_eq!(policy.attempts(), 1);
        assert_eq!(policy.delays().count(), 1);
    }
}
