//! Bounded retry state machine.
//!
//! A logical fetch moves through [`FetchPhase::Waiting`] and
//! [`FetchPhase::Attempting`] until it ends in [`FetchPhase::Succeeded`] or
//! [`FetchPhase::Failed`]. [`RetryState`] tracks the attempt index and the next
//! backoff delay; [`retry`] drives any fallible async operation through it.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::config::RetryPolicy;
use crate::error::{FilingError, Result};

/// Phase of a logical fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchPhase {
    /// A request is in flight.
    Attempting,
    /// Sleeping before the next attempt.
    Waiting,
    /// Terminal: a value was produced.
    Succeeded,
    /// Terminal: a fatal error, or the retry budget ran out.
    Failed,
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Attempting => "attempting",
            Self::Waiting => "waiting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Per-call retry bookkeeping.
#[derive(Clone, Copy, Debug)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
    next_delay: Duration,
}

impl RetryState {
    /// Starts at attempt zero with the policy's base delay.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            next_delay: policy.delay_for(0),
        }
    }

    /// Zero-based index of the current attempt.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay to wait before the current attempt.
    #[must_use]
    pub const fn next_delay(&self) -> Duration {
        self.next_delay
    }

    /// Records a retryable failure of the current attempt.
    ///
    /// Returns `false` once the budget is spent; [`Self::attempt`] then equals
    /// the number of attempts made.
    pub fn advance(&mut self) -> bool {
        self.attempt += 1;
        if self.attempt >= self.policy.max_attempts.max(1) {
            return false;
        }
        self.next_delay = self.policy.delay_for(self.attempt);
        true
    }
}

/// Runs `op` under `policy`, retrying only errors for which
/// [`FilingError::is_retryable`] holds.
///
/// `op` receives the zero-based attempt index. Fatal errors are returned
/// immediately; when the budget runs out the last error is wrapped in
/// [`FilingError::Exhausted`].
///
/// # Errors
/// Returns the first fatal error, or `Exhausted` after `policy.max_attempts`
/// retryable failures.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut state = RetryState::new(*policy);

    loop {
        trace!(
            label,
            phase = %FetchPhase::Waiting,
            attempt = state.attempt(),
            delay_ms = state.next_delay().as_millis() as u64,
            "Waiting before attempt"
        );
        sleep(state.next_delay()).await;

        debug!(label, phase = %FetchPhase::Attempting, attempt = state.attempt());
        match op(state.attempt()).await {
            Ok(value) => {
                debug!(label, phase = %FetchPhase::Succeeded, attempt = state.attempt());
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => {
                warn!(
                    label,
                    phase = %FetchPhase::Failed,
                    attempt = state.attempt(),
                    error = %e,
                    "Fatal error, not retrying"
                );
                return Err(e);
            }
            Err(e) => {
                warn!(
                    label,
                    attempt = state.attempt(),
                    error = %e,
                    "Retryable error"
                );
                if !state.advance() {
                    warn!(
                        label,
                        phase = %FetchPhase::Failed,
                        attempts = state.attempt(),
                        "Retry budget exhausted"
                    );
                    return Err(FilingError::Exhausted {
                        attempts: state.attempt(),
                        last: Box::new(e),
                    });
                }
            }
        }
    }
}
