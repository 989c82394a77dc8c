//! Bounded retry and cancellation for capability calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{Capability, PipelineError};

/// Retry behaviour for external calls.
///
/// At most one retry is ever issued; larger values are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (clamped to [`RetryPolicy::MAX_RETRIES`]).
    pub max_retries: u32,
    /// Fixed pause before the retry.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Upper bound on retries.
    pub const MAX_RETRIES: u32 = 1;

    /// Policy that never retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Total attempts this policy allows.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_retries.min(Self::MAX_RETRIES) + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Shared flag telling a running pipeline to stop issuing calls.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`cancel`](Self::cancel) was called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Issues capability calls for one request.
#[derive(Debug, Clone, Copy)]
pub struct Caller<'a> {
    policy: &'a RetryPolicy,
    cancel: &'a CancellationToken,
}

impl<'a> Caller<'a> {
    /// Creates a caller bound to a request's policy and token.
    #[must_use]
    pub const fn new(policy: &'a RetryPolicy, cancel: &'a CancellationToken) -> Self {
        Self { policy, cancel }
    }

    /// Fails fast if the request was cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cancelled`] once the token is set.
    pub fn checkpoint(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Runs `op` with the bounded retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cancelled`] if the token is set before an
    /// attempt, otherwise the capability-specific unavailable error after
    /// the last attempt fails.
    pub fn call<T>(
        &self,
        capability: Capability,
        mut op: impl FnMut() -> anyhow::Result<T>,
    ) -> Result<T, PipelineError> {
        let attempts = self.policy.attempts();
        let mut attempt = 0;

        loop {
            self.checkpoint()?;
            attempt += 1;

            match op() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{capability} succeeded on attempt {attempt}");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        "{capability} call failed (attempt {attempt}/{attempts}), retrying in {:?}: {e:#}",
                        self.policy.backoff
                    );
                    std::thread::sleep(self.policy.backoff);
                }
                Err(e) => {
                    warn!("{capability} call failed (attempt {attempt}/{attempts}): {e:#}");
                    return Err(PipelineError::unavailable(capability, attempt, e));
                }
            }
        }
    }
}
