//! Resilient call executor
//!
//! Wraps a single external call with retry and exponential backoff. The
//! executor keeps no state between invocations; each call site brings its own
//! [`RetryPolicy`] and a classifier that maps an error to a [`Disposition`].

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{ErrorKind, PagesmithError, Result};

/// What the executor should do with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Wait and try again while attempts remain
    Retry,
    /// Stop immediately and propagate the error
    Abort,
}

/// Attempt budget and backoff schedule for one integration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Factor applied to the delay after every retry
    pub multiplier: u32,
    /// Upper bound for any single delay
    pub max_delay: Option<Duration>,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            multiplier: 2,
            max_delay: None,
        }
    }

    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Generation client: 3 attempts, 5s, doubling
    pub const fn generation() -> Self {
        Self::new(3, Duration::from_secs(5))
    }

    /// Hosting activation: 5 attempts, 3s, doubling
    pub const fn hosting_activation() -> Self {
        Self::new(5, Duration::from_secs(3))
    }

    /// Notification client: 3 attempts, 2s, doubling
    pub const fn notification() -> Self {
        Self::new(3, Duration::from_secs(2))
    }

    /// No waiting between attempts
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        let delay = self.initial_delay.saturating_mul(factor);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// One attempt of an external call, as seen by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAttempt<'a> {
    pub operation: &'a str,
    pub attempt: u32,
    pub max_attempts: u32,
    pub outcome: AttemptOutcome,
}

/// Result of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed { kind: ErrorKind, retryable: bool },
}

impl std::fmt::Display for CallAttempt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            AttemptOutcome::Succeeded => write!(
                f,
                "{} attempt {}/{} succeeded",
                self.operation, self.attempt, self.max_attempts
            ),
            AttemptOutcome::Failed { kind, retryable } => write!(
                f,
                "{} attempt {}/{} failed ({:?}, {})",
                self.operation,
                self.attempt,
                self.max_attempts,
                kind,
                if *retryable { "retryable" } else { "fatal" }
            ),
        }
    }
}

/// Run `op` under `policy`, retrying failures that `classify` marks as retryable
///
/// The closure receives the 1-based attempt index. A fatal failure is returned
/// as-is after a single invocation; running out of attempts yields
/// [`PagesmithError::RetriesExhausted`] wrapping the last failure.
pub async fn retry<T, F, Fut, C>(
    operation: &str,
    policy: &RetryPolicy,
    classify: C,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    C: Fn(&PagesmithError) -> Disposition,
{
    let max_attempts = policy.attempts();

    for attempt in 1..=max_attempts {
        let error = match op(attempt).await {
            Ok(value) => {
                let record = CallAttempt {
                    operation,
                    attempt,
                    max_attempts,
                    outcome: AttemptOutcome::Succeeded,
                };
                debug!("{}", record);
                return Ok(value);
            }
            Err(e) => e,
        };

        let disposition = classify(&error);
        let record = CallAttempt {
            operation,
            attempt,
            max_attempts,
            outcome: AttemptOutcome::Failed {
                kind: error.kind(),
                retryable: disposition == Disposition::Retry,
            },
        };

        if disposition == Disposition::Abort {
            warn!("{}: {}", record, error);
            return Err(error);
        }

        if attempt == max_attempts {
            warn!("{}: {} (no attempts left)", record, error);
            return Err(PagesmithError::RetriesExhausted {
                operation: operation.to_string(),
                attempts: max_attempts,
                last: Box::new(error),
            });
        }

        let delay = policy.delay_after(attempt);
        warn!("{}: {}. Retrying in {:?}", record, error, delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    // Loop always returns: the last iteration either succeeds, aborts or exhausts.
    Err(PagesmithError::Other(format!(
        "{} produced no attempts",
        operation
    )))
}

/// Classifier that retries transport failures, non-2xx responses and malformed bodies
pub fn transient_network(error: &PagesmithError) -> Disposition {
    match error.kind() {
        ErrorKind::Transport | ErrorKind::HttpStatus | ErrorKind::MalformedResponse => {
            Disposition::Retry
        }
        _ => Disposition::Abort,
    }
}
