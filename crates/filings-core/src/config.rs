//! Request, retry and cache-lifetime configuration.
//!
//! Every value here is immutable once built and passed explicitly to the
//! components that need it; nothing is read from process-wide state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{FilingError, Result};

/// Bounded exponential backoff policy.
///
/// The delay before attempt `n` (zero-based) is
/// `base_delay * backoff_multiplier^n`, capped at `max_delay`. Attempt zero
/// therefore waits `base_delay`, never zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Always at least one.
    pub max_attempts: u32,
    /// Delay before the first attempt.
    pub base_delay: Duration,
    /// Growth factor applied per attempt.
    pub backoff_multiplier: f64,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least one and the
    /// multiplier to at least `1.0`.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff_multiplier: if backoff_multiplier.is_finite() {
                backoff_multiplier.max(1.0)
            } else {
                1.0
            },
            max_delay: Duration::from_secs(30),
        }
    }

    /// Sets the cap for a single delay.
    #[must_use]
    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay to wait before the given zero-based attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.base_delay.min(self.max_delay);
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.powi(exponent);
        let secs = self.base_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_millis(250), 2.0)
    }
}

/// HTTP request settings shared by every fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestConfig {
    user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Minimum spacing between two requests to the upstream host.
    pub min_interval: Duration,
    /// Retry policy applied to each logical fetch.
    pub retry: RetryPolicy,
}

impl RequestConfig {
    /// Builds a config identifying the caller as `"<app_name> / <contact_email>"`.
    ///
    /// # Errors
    /// Returns [`FilingError::InvalidParameter`] if either part is blank or the
    /// contact is not an email address.
    pub fn new(app_name: &str, contact_email: &str) -> Result<Self> {
        let app_name = app_name.trim();
        let contact_email = contact_email.trim();
        if app_name.is_empty() {
            return Err(FilingError::InvalidParameter(
                "Application name must not be empty".to_string(),
            ));
        }
        if !is_plausible_email(contact_email) {
            return Err(FilingError::InvalidParameter(format!(
                "Contact must be an email address, got {contact_email:?}"
            )));
        }
        Ok(Self::with_user_agent_unchecked(format!(
            "{app_name} / {contact_email}"
        )))
    }

    /// Parses a complete User-Agent of the form `"<app> / <email>"`.
    ///
    /// # Errors
    /// Returns [`FilingError::InvalidParameter`] if the value does not have that shape.
    pub fn from_user_agent(user_agent: &str) -> Result<Self> {
        let (app, contact) = user_agent.rsplit_once('/').ok_or_else(|| {
            FilingError::InvalidParameter(format!(
                "User-Agent must look like \"<app> / <email>\", got {user_agent:?}"
            ))
        })?;
        Self::new(app, contact)
    }

    fn with_user_agent_unchecked(user_agent: String) -> Self {
        Self {
            user_agent,
            timeout: Duration::from_secs(30),
            min_interval: Duration::from_millis(100),
            retry: RetryPolicy::default(),
        }
    }

    /// The validated User-Agent header value.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the minimum spacing between requests.
    #[must_use]
    pub const fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

fn is_plausible_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Time-to-live per cached resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTtls {
    /// Ticker directory.
    pub directory: Duration,
    /// Resolved identities.
    pub identity: Duration,
    /// Company facts documents.
    pub facts: Duration,
    /// Browse-page filing lists.
    pub browse: Duration,
    /// Parsed quarterly master indexes.
    pub bulk_index: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            directory: Duration::from_secs(24 * 60 * 60),
            identity: Duration::from_secs(24 * 60 * 60),
            facts: Duration::from_secs(60 * 60),
            browse: Duration::from_secs(15 * 60),
            bulk_index: Duration::from_secs(6 * 60 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), 2.0)
            .with_max_delay(Duration::from_millis(500));

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_policy_clamps_inputs() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10), 0.5);
        assert_eq!(policy.max_attempts, 1);
        assert!((policy.backoff_multiplier - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_user_agent_shape() {
        let config = RequestConfig::new("Filings Dashboard", "ops@example.com").unwrap();
        assert_eq!(config.user_agent(), "Filings Dashboard / ops@example.com");

        let parsed = RequestConfig::from_user_agent("Filings Dashboard / ops@example.com").unwrap();
        assert_eq!(parsed.user_agent(), config.user_agent());
    }

    #[test]
    fn test_user_agent_rejects_anonymous() {
        assert!(RequestConfig::new("", "ops@example.com").is_err());
        assert!(RequestConfig::new("App", "nobody").is_err());
        assert!(RequestConfig::from_user_agent("Mozilla").is_err());
    }
}
