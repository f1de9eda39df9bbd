//! Retry engine with bounded exponential backoff.
//!
//! Runs an arbitrary fallible async operation, classifying each failure
//! and retrying while policy allows. The engine is stateless per call and
//! safe to invoke concurrently for independent contexts; the only
//! suspension point is the cooperative backoff sleep between attempts, so
//! dropping the returned future cancels cleanly between attempts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, Instant};

use crate::classify::classify;
use crate::config::RetryConfig;
use crate::context::ScrapeContext;
use crate::error::{ErrorKind, ScrapeFailure};
use crate::resolve::{rate_limit_delay_ms, should_retry};
use crate::track::ErrorTracker;

/// Compute the backoff delay for a 1-based attempt number.
///
/// `min(base × multiplier^(attempt − 1), max)`, then an optional uniform
/// ±25% jitter, clamped back into `[0, max]`. Pre-jitter the delay is
/// monotonically non-decreasing in the attempt number.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    let raw = config.base_delay_ms as f64 * config.backoff_multiplier.powi(exponent);
    let max = config.max_delay_ms as f64;
    let capped = raw.min(max);
    let jittered = if config.jitter_enabled {
        let offset: f64 = rand::thread_rng().gen_range(-0.25..=0.25);
        capped * (1.0 + offset)
    } else {
        capped
    };
    Duration::from_millis(jittered.clamp(0.0, max) as u64)
}

/// Executes operations under retry policy, recording outcomes with the
/// tracker.
#[derive(Clone)]
pub struct RetryEngine {
    tracker: Arc<dyn ErrorTracker>,
    defaults: RetryConfig,
}

impl std::fmt::Debug for RetryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryEngine")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl RetryEngine {
    /// Create an engine with process-wide default retry configuration.
    pub fn new(tracker: Arc<dyn ErrorTracker>, defaults: RetryConfig) -> Self {
        Self { tracker, defaults }
    }

    /// Run `operation`, retrying failures that policy allows.
    ///
    /// Returns the operation's value on first success. Once a failure is
    /// classified as non-retryable, or the retry budget is exhausted, the
    /// last failure is returned unchanged; a failure that is retried is
    /// never surfaced to the caller. `max_retries = 0` means exactly one
    /// attempt and no sleeping. Rate-limit failures sleep for the
    /// server's retry-after hint (or the fixed default) instead of the
    /// exponential backoff.
    ///
    /// On success after one or more failures, a successful-retry outcome
    /// is recorded with the tracker including the wall-clock time from
    /// the start of the attempt sequence.
    ///
    /// # Errors
    ///
    /// Returns the operation's own error once retries are exhausted or
    /// the failure kind is non-retryable.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        mut operation: F,
        context: &mut ScrapeContext,
        overrides: Option<&RetryConfig>,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let config = overrides.unwrap_or(&self.defaults);
        let started = Instant::now();
        let mut failures: u32 = 0;
        let mut last_kind = None;

        loop {
            match operation().await {
                Ok(value) => {
                    if let Some(kind) = last_kind {
                        let resolution_time_ms =
                            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                        log::info!(
                            "source {} recovered after {} failed attempt(s) in {resolution_time_ms}ms",
                            context.source_id,
                            failures,
                        );
                        if let Err(e) = self
                            .tracker
                            .record_successful_retry(kind, resolution_time_ms)
                            .await
                        {
                            log::warn!("failed to record successful retry: {e}");
                        }
                    }
                    return Ok(value);
                }
                Err(err) => {
                    failures += 1;
                    let failure =
                        ScrapeFailure::from_error(&err).with_url(context.source_url.clone());
                    let kind = classify(&failure);

                    if !should_retry(kind, failures, config.max_retries) {
                        log::warn!(
                            "source {} giving up after attempt {failures} ({kind}): {}",
                            context.source_id,
                            failure.message,
                        );
                        if let Err(e) = self.tracker.record_failed_retry(kind).await {
                            log::warn!("failed to record failed retry: {e}");
                        }
                        return Err(err);
                    }

                    last_kind = Some(kind);
                    context.next_attempt();
                    // Rate limits are paced by the server, not by the
                    // exponential formula.
                    let delay = if kind == ErrorKind::RateLimit {
                        Duration::from_millis(rate_limit_delay_ms(&failure))
                    } else {
                        backoff_delay(config, failures)
                    };
                    log::debug!(
                        "source {} attempt {failures} failed ({kind}), retrying in {}ms",
                        context.source_id,
                        delay.as_millis(),
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
