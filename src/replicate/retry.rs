//! Fixed-delay retry policy for live endpoint I/O.

use log::warn;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// How failed endpoint operations are retried.
///
/// The default retries forever with a 10 second pause. A run against an
/// endpoint whose credentials are permanently wrong will therefore hang
/// until killed unless `max_attempts` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RETRY_DELAY,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    pub fn forever(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Run `op` until it succeeds.
    ///
    /// Every failed attempt logs one warning and sleeps `delay` before the
    /// next one. Configuration errors are returned immediately.
    pub fn run<T>(&self, action: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(err @ Error::Configuration(_)) => return Err(err),
                Err(err) => {
                    warn!("{} failed (attempt {}): {}", action, attempts, err);
                    if self.max_attempts.is_some_and(|max| attempts >= max) {
                        return Err(Error::RetriesExhausted {
                            action: action.to_string(),
                            attempts,
                            source: Box::new(err),
                        });
                    }
                    if !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                }
            }
        }
    }
}
