//! Retry with exponential backoff for transient I/O failures.

use anyhow::{Context, Result};
use log::warn;
use std::io;
use std::time::Duration;

use super::Region;
use crate::errors::RegsortError;
use crate::logging::format_duration;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 6;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default multiplier applied to the delay after each retry.
pub const DEFAULT_BACKOFF_FACTOR: u32 = 6;

/// True for I/O errors worth retrying: the resource is temporarily unavailable
/// (`EAGAIN`/`EWOULDBLOCK`) or the call was interrupted.
#[must_use]
pub fn is_transient(error: &io::Error) -> bool {
    matches!(error.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted)
}

/// Sequential retry policy with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Delay multiplier per retry.
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Policy with the default backoff factor.
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay, factor: DEFAULT_BACKOFF_FACTOR }
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub fn factor(mut self, factor: u32) -> Self {
        self.factor = factor.max(1);
        self
    }

    /// Delay before retry number `retry` (0-based): `base * factor^retry`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let multiplier = self.factor.saturating_pow(retry);
        self.base_delay.saturating_mul(multiplier)
    }

    /// Run `operation`, retrying transient failures.
    ///
    /// Non-transient errors are returned immediately. When the retry budget is spent the last
    /// error is wrapped in [`RegsortError::ExhaustedRetries`] carrying the region and the
    /// attempt count.
    pub fn run<T, F>(&self, operation: &str, region: &Region, mut f: F) -> Result<T>
    where
        F: FnMut() -> io::Result<T>,
    {
        let mut retry = 0u32;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(e) if is_transient(&e) && retry < self.max_retries => {
                    let delay = self.delay_for(retry);
                    retry += 1;
                    warn!(
                        "{operation} for {region} failed ({e}); retry {retry} of {} in {}",
                        self.max_retries,
                        format_duration(delay)
                    );
                    std::thread::sleep(delay);
                }
                Err(e) if is_transient(&e) => {
                    return Err(RegsortError::ExhaustedRetries {
                        operation: operation.to_string(),
                        chromosome: region.chromosome.to_string(),
                        start: region.start,
                        end: region.end,
                        attempts: retry + 1,
                        source: e,
                    }
                    .into());
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("{operation} failed for {region}"));
                }
            }
        }
    }
}
