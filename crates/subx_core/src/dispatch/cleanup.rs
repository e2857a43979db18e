//! Best-effort deletion of intermediate files.
//!
//! External tools (OCR engines in particular) can keep a handle on their
//! input for a moment after exiting, so deletion is retried with an
//! exponential backoff. A final failure is reported to the caller, which
//! only logs it.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::config::CleanupSettings;

/// Deletion gave up.
#[derive(Error, Debug)]
#[error("Could not remove {} after {attempts} attempts: {source}", .path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    pub attempts: u32,
    #[source]
    pub source: io::Error,
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Cap on the summed sleep time across attempts.
    pub max_total_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&CleanupSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &CleanupSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_total_wait: Duration::from_millis(settings.max_total_wait_ms),
        }
    }

    /// Single attempt, no waiting.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_total_wait: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, given the time already waited.
    /// `None` once the budget is spent.
    fn next_delay(&self, attempt: u32, waited: Duration) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.initial_delay.saturating_mul(factor);
        let remaining = self.max_total_wait.saturating_sub(waited);
        if remaining.is_zero() && !delay.is_zero() {
            return None;
        }
        Some(delay.min(remaining))
    }
}

/// Remove a file, retrying per `policy`. A missing file counts as removed.
pub async fn remove_file_with_retry(path: &Path, policy: &RetryPolicy) -> Result<u32, CleanupError> {
    remove_with_retry(path, policy, |p| std::fs::remove_file(p)).await
}

/// Remove a directory tree, retrying per `policy`.
pub async fn remove_dir_with_retry(path: &Path, policy: &RetryPolicy) -> Result<u32, CleanupError> {
    remove_with_retry(path, policy, |p| std::fs::remove_dir_all(p)).await
}

/// Retry `remove` on `path` until it succeeds or the policy is spent.
///
/// Returns the number of attempts used.
pub async fn remove_with_retry<F>(path: &Path, policy: &RetryPolicy, mut remove: F) -> Result<u32, CleanupError>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let mut attempt = 0;
    let mut waited = Duration::ZERO;

    loop {
        attempt += 1;
        let err = match remove(path) {
            Ok(()) => return Ok(attempt),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(attempt),
            Err(e) => e,
        };

        match policy.next_delay(attempt, waited) {
            Some(delay) => {
                tracing::debug!(
                    "Removing {} failed (attempt {}): {}; retrying in {}ms",
                    path.display(),
                    attempt,
                    err,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                waited += delay;
            }
            None => {
                return Err(CleanupError {
                    path: path.to_path_buf(),
                    attempts: attempt,
                    source: err,
                })
            }
        }
    }
}
