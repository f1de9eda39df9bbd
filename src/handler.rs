//! Orchestrator tying classification, planning, and alerting together.
//!
//! One handler instance serves the whole pipeline; every call is
//! independent and safe to make from concurrent source workers. All
//! shared counters live in the injected tracker.

use std::future::Future;
use std::sync::Arc;

use crate::classify::classify;
use crate::config::{Config, NotificationThresholds, RetryConfig};
use crate::context::ScrapeContext;
use crate::degrade::{DegradationController, DegradationOutcome};
use crate::error::{ErrorKind, ScrapeFailure};
use crate::notify::NotificationSender;
use crate::resolve::{Resolution, ResolutionPlanner};
use crate::retry::RetryEngine;
use crate::track::ErrorTracker;

/// Entry point for the pipeline's error handling.
#[derive(Clone)]
pub struct ScrapingErrorHandler {
    tracker: Arc<dyn ErrorTracker>,
    notifier: Arc<dyn NotificationSender>,
    planner: ResolutionPlanner,
    retry: RetryEngine,
    degradation: DegradationController,
    thresholds: NotificationThresholds,
}

impl std::fmt::Debug for ScrapingErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapingErrorHandler")
            .field("thresholds", &self.thresholds)
            .finish_non_exhaustive()
    }
}

impl ScrapingErrorHandler {
    /// Wire a handler from configuration and the external collaborators.
    pub fn new(
        tracker: Arc<dyn ErrorTracker>,
        notifier: Arc<dyn NotificationSender>,
        config: &Config,
    ) -> Self {
        Self {
            planner: ResolutionPlanner::new(Arc::clone(&tracker), config.retry.clone()),
            retry: RetryEngine::new(Arc::clone(&tracker), config.retry.clone()),
            degradation: DegradationController::new(config.degradation.clone()),
            thresholds: config.thresholds.clone(),
            tracker,
            notifier,
        }
    }

    /// Handle one failure: record, classify, plan, alert, return the plan.
    ///
    /// The failure is always recorded with the tracker before any
    /// notification is attempted, so a crash mid-notification never loses
    /// the error record. Tracker and notifier errors are logged and never
    /// change the returned resolution.
    pub async fn handle_scraping_error(
        &self,
        failure: &ScrapeFailure,
        context: &ScrapeContext,
    ) -> Resolution {
        if let Err(e) = self.tracker.track_error(failure, context).await {
            log::error!(
                "failed to record error for source {}: {e}",
                context.source_id
            );
        }

        let kind = classify(failure);
        log::debug!(
            "source {} attempt {} failed as {kind}: {}",
            context.source_id,
            context.attempt,
            failure.message
        );

        let resolution = self.planner.determine(kind, failure, context).await;

        self.evaluate_notifications(kind, context).await;

        resolution
    }

    /// Run an operation under the process-wide retry policy.
    ///
    /// Passthrough to the retry engine so the pipeline only holds one
    /// handle. See [`RetryEngine::execute_with_retry`].
    ///
    /// # Errors
    ///
    /// Returns the operation's own error once retries are exhausted or
    /// the failure kind is non-retryable.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        operation: F,
        context: &mut ScrapeContext,
        overrides: Option<&RetryConfig>,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        self.retry
            .execute_with_retry(operation, context, overrides)
            .await
    }

    /// Decide whether a partially failed batch keeps running.
    ///
    /// See [`DegradationController::handle_partial_failure`].
    #[must_use]
    pub fn handle_partial_failure(
        &self,
        errors: &[ScrapeFailure],
        successful_count: usize,
        context: &ScrapeContext,
    ) -> DegradationOutcome {
        self.degradation
            .handle_partial_failure(errors, successful_count, context)
    }

    /// Evaluate the notification triggers for one failure.
    ///
    /// A critical kind alerts immediately and short-circuits the other
    /// checks for this call; otherwise the rolling error rate and the
    /// consecutive-failure streak are each checked independently.
    async fn evaluate_notifications(&self, kind: ErrorKind, context: &ScrapeContext) {
        if self.thresholds.is_critical(kind) {
            log::warn!(
                "critical {kind} failure for source {}, alerting",
                context.source_id
            );
            if let Err(e) = self
                .notifier
                .send_critical_error_alert(kind, context)
                .await
            {
                log::warn!("critical-error alert delivery failed: {e}");
            }
            return;
        }

        match self.tracker.source_error_rate(&context.source_id).await {
            Ok(rate) if rate > self.thresholds.error_rate => {
                log::warn!(
                    "source {} error rate {rate:.2} over threshold, alerting",
                    context.source_id
                );
                if let Err(e) = self
                    .notifier
                    .send_high_error_rate_alert(&context.source_id, rate)
                    .await
                {
                    log::warn!("high-error-rate alert delivery failed: {e}");
                }
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!(
                    "error-rate lookup failed for source {}: {e}",
                    context.source_id
                );
            }
        }

        let streak = self.thresholds.consecutive_failures;
        match self
            .tracker
            .source_error_history(&context.source_id, streak as usize)
            .await
        {
            Ok(history) => {
                let all_failed =
                    history.len() == streak as usize && history.iter().all(|o| !o.success);
                if all_failed {
                    log::warn!(
                        "source {} failed {streak} times in a row, alerting",
                        context.source_id
                    );
                    if let Err(e) = self
                        .notifier
                        .send_consecutive_failures_alert(&context.source_id, streak)
                        .await
                    {
                        log::warn!("consecutive-failures alert delivery failed: {e}");
                    }
                }
            }
            Err(e) => {
                log::warn!(
                    "error-history lookup failed for source {}: {e}",
                    context.source_id
                );
            }
        }
    }
}
