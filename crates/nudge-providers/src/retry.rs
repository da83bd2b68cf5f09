//! Retry policy for transient provider failures.

use std::time::Duration;

use nudge_core::error::NudgeError;

/// Substrings (lowercase) that mark a remote failure as transient.
const TRANSIENT_INDICATORS: &[&str] = &[
    "over capacity",
    "overloaded",
    "rate limit",
    "429",
    "503",
    "too many requests",
    "service unavailable",
    "internal_server_error",
    "internal server error",
];

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_retries: u32,
    /// Backoff unit; the wait after attempt `i` is `unit * 2^(i+1)`.
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Wait after a transient failure on 0-based attempt `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_add(1));
        self.unit.saturating_mul(factor)
    }
}

/// Whether a provider failure is expected to clear up on its own.
pub fn is_transient(err: &NudgeError) -> bool {
    let text = err.to_string().to_lowercase();
    TRANSIENT_INDICATORS.iter().any(|i| text.contains(i))
}
