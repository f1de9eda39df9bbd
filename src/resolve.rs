//! Resolution planning: decide what happens after a classified failure.
//!
//! The per-kind policy is tuned to how each failure class actually
//! resolves in practice. A rate limit waits on the server's schedule
//! (seconds to minutes); a transient network blip is client-paced and
//! short; credential and bot-detection failures go straight to a human
//! queue because no retry budget fixes them.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::RetryConfig;
use crate::context::ScrapeContext;
use crate::error::{ErrorKind, ScrapeFailure};
use crate::retry::backoff_delay;
use crate::track::ErrorTracker;

/// Fallback delay for rate limits when the message carries no usable
/// retry-after hint.
pub const RATE_LIMIT_DEFAULT_DELAY_MS: u64 = 60_000;
/// Delay before the single retry granted to a first parsing failure.
pub const PARSING_RETRY_DELAY_MS: u64 = 5_000;
/// Fixed delay for storage failures.
pub const STORAGE_RETRY_DELAY_MS: u64 = 10_000;
/// Fixed delay for proxy failures.
pub const PROXY_RETRY_DELAY_MS: u64 = 2_000;

/// What the caller should do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum ResolutionAction {
    /// Try again after the given delay.
    Retry {
        /// How long to wait before the next attempt.
        delay_ms: u64,
    },
    /// Abandon this item and move on.
    Skip,
    /// Queue for human attention; retrying cannot help.
    ManualReview,
}

/// A planned resolution for one failure, produced fresh on every call and
/// never persisted by this subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// The action the caller should take.
    pub action: ResolutionAction,
    /// Human-readable explanation of why.
    pub reason: String,
}

impl Resolution {
    fn retry(delay_ms: u64, reason: impl Into<String>) -> Self {
        Self {
            action: ResolutionAction::Retry { delay_ms },
            reason: reason.into(),
        }
    }

    fn skip(reason: impl Into<String>) -> Self {
        Self {
            action: ResolutionAction::Skip,
            reason: reason.into(),
        }
    }

    fn manual_review(reason: impl Into<String>) -> Self {
        Self {
            action: ResolutionAction::ManualReview,
            reason: reason.into(),
        }
    }

    /// The retry delay, when the action is a retry.
    #[must_use]
    pub fn delay(&self) -> Option<Duration> {
        match self.action {
            ResolutionAction::Retry { delay_ms } => Some(Duration::from_millis(delay_ms)),
            _ => None,
        }
    }
}

/// Retry-eligibility rule shared with the retry engine.
///
/// Authentication and bot-detection failures are never retried; all other
/// kinds are retried while the attempt number is within budget.
#[must_use]
pub fn should_retry(kind: ErrorKind, attempt_number: u32, max_retries: u32) -> bool {
    kind.is_retryable() && attempt_number <= max_retries
}

/// Parse a textual `retry-after: N` hint (seconds) out of a failure
/// message. Only this simple pattern is recognized; anything else falls
/// back to the fixed default, so server-dictated backoff is honored on a
/// best-effort basis only.
fn parse_retry_after_ms(message: &str) -> Option<u64> {
    static RETRY_AFTER: OnceLock<Regex> = OnceLock::new();
    // The pattern is a literal, so compilation cannot fail.
    #[allow(clippy::expect_used)]
    let re = RETRY_AFTER.get_or_init(|| {
        Regex::new(r"(?i)retry[-_ ]?after:?\s*(\d+)").expect("valid retry-after regex")
    });
    let captures = re.captures(message)?;
    let seconds: u64 = captures.get(1)?.as_str().parse().ok()?;
    Some(seconds.saturating_mul(1_000))
}

/// Delay for a rate-limit failure: the server's retry-after hint when the
/// message carries one, else the fixed default. Rate limits are paced by
/// the server, not by the generic backoff formula, so the retry engine
/// uses this rule too.
pub(crate) fn rate_limit_delay_ms(failure: &ScrapeFailure) -> u64 {
    parse_retry_after_ms(&failure.message).unwrap_or(RATE_LIMIT_DEFAULT_DELAY_MS)
}

/// Plans the next action for a classified failure.
#[derive(Clone)]
pub struct ResolutionPlanner {
    tracker: Arc<dyn ErrorTracker>,
    retry: RetryConfig,
}

impl std::fmt::Debug for ResolutionPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionPlanner")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ResolutionPlanner {
    /// Create a planner bound to the tracker and retry defaults.
    pub fn new(tracker: Arc<dyn ErrorTracker>, retry: RetryConfig) -> Self {
        Self { tracker, retry }
    }

    /// Decide the next action for one classified failure.
    ///
    /// Deterministic given the inputs and the tracker's current
    /// recurring-error state for the source. Tracker read failures are
    /// logged and treated as "not recurring" so a flaky tracker cannot
    /// block resolution.
    pub async fn determine(
        &self,
        kind: ErrorKind,
        failure: &ScrapeFailure,
        context: &ScrapeContext,
    ) -> Resolution {
        match kind {
            ErrorKind::RateLimit => {
                let delay_ms = rate_limit_delay_ms(failure);
                Resolution::retry(
                    delay_ms,
                    format!("rate limited by source, waiting {delay_ms}ms"),
                )
            }
            ErrorKind::Timeout | ErrorKind::Network => {
                if context.attempt < self.retry.max_retries {
                    let delay = backoff_delay(&self.retry, context.attempt);
                    Resolution::retry(
                        u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        format!("transient {kind} failure, attempt {}", context.attempt),
                    )
                } else {
                    Resolution::skip(format!(
                        "{kind} failure persisted through {} attempts",
                        context.attempt
                    ))
                }
            }
            ErrorKind::Authentication => {
                Resolution::manual_review("credentials rejected; needs key rotation or re-login")
            }
            ErrorKind::CaptchaOrBotDetection => {
                Resolution::manual_review("anti-bot defense triggered; needs human intervention")
            }
            ErrorKind::Parsing => {
                let recurring = match self
                    .tracker
                    .has_recurring_errors(&context.source_id, ErrorKind::Parsing)
                    .await
                {
                    Ok(recurring) => recurring,
                    Err(e) => {
                        log::warn!("recurring-error lookup failed for {}: {e}", context.source_id);
                        false
                    }
                };
                if recurring {
                    Resolution::manual_review(
                        "parsing keeps failing for this source; selectors likely stale",
                    )
                } else {
                    Resolution::retry(
                        PARSING_RETRY_DELAY_MS,
                        "first parsing failure for this source, retrying once",
                    )
                }
            }
            ErrorKind::Storage => Resolution::retry(
                STORAGE_RETRY_DELAY_MS,
                "storage layer failure, retrying after fixed delay",
            ),
            ErrorKind::ContentStructureChanged => {
                Resolution::manual_review("page structure changed; selectors need updating")
            }
            ErrorKind::Proxy => Resolution::retry(
                PROXY_RETRY_DELAY_MS,
                "proxy failure, retrying after fixed delay",
            ),
            ErrorKind::Unknown => Resolution::skip("unclassifiable failure, skipping item"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use uuid::Uuid;

    use crate::track::{RetryOutcome, TrackerError};

    struct StubTracker {
        recurring: bool,
    }

    #[async_trait]
    impl ErrorTracker for StubTracker {
        async fn track_error(
            &self,
            _failure: &ScrapeFailure,
            _context: &ScrapeContext,
        ) -> Result<(), TrackerError> {
            Ok(())
        }
        async fn record_successful_retry(
            &self,
            _kind: ErrorKind,
            _resolution_time_ms: u64,
        ) -> Result<(), TrackerError> {
            Ok(())
        }
        async fn record_failed_retry(&self, _kind: ErrorKind) -> Result<(), TrackerError> {
            Ok(())
        }
        async fn source_error_rate(&self, _source_id: &str) -> Result<f64, TrackerError> {
            Ok(0.0)
        }
        async fn source_error_history(
            &self,
            _source_id: &str,
            _limit: usize,
        ) -> Result<Vec<RetryOutcome>, TrackerError> {
            Ok(Vec::new())
        }
        async fn has_recurring_errors(
            &self,
            _source_id: &str,
            _kind: ErrorKind,
        ) -> Result<bool, TrackerError> {
            Ok(self.recurring)
        }
    }

    fn planner(recurring: bool) -> ResolutionPlanner {
        let config = RetryConfig {
            jitter_enabled: false,
            ..RetryConfig::default()
        };
        ResolutionPlanner::new(Arc::new(StubTracker { recurring }), config)
    }

    fn context() -> ScrapeContext {
        ScrapeContext::new("state-gov", Uuid::new_v4(), "https://grants.example.org")
    }

    #[test]
    fn retry_after_parsing_handles_common_shapes() {
        assert_eq!(
            parse_retry_after_ms("429 Too Many Requests, Retry-After: 30"),
            Some(30_000)
        );
        assert_eq!(parse_retry_after_ms("retry after 120"), Some(120_000));
        assert_eq!(parse_retry_after_ms("rate limit exceeded"), None);
        assert_eq!(parse_retry_after_ms("retry-after: soon"), None);
    }

    #[tokio::test]
    async fn rate_limit_honors_retry_after_hint() {
        let resolution = planner(false)
            .determine(
                ErrorKind::RateLimit,
                &ScrapeFailure::new("429 Too Many Requests, Retry-After: 30"),
                &context(),
            )
            .await;
        assert_eq!(resolution.action, ResolutionAction::Retry { delay_ms: 30_000 });
    }

    #[tokio::test]
    async fn rate_limit_without_hint_uses_default_delay() {
        let resolution = planner(false)
            .determine(
                ErrorKind::RateLimit,
                &ScrapeFailure::new("rate limit exceeded"),
                &context(),
            )
            .await;
        assert_eq!(
            resolution.action,
            ResolutionAction::Retry {
                delay_ms: RATE_LIMIT_DEFAULT_DELAY_MS
            }
        );
    }

    #[tokio::test]
    async fn network_skips_once_budget_is_spent() {
        let mut ctx = context();
        ctx.attempt = 3; // equals default max_retries
        let resolution = planner(false)
            .determine(ErrorKind::Network, &ScrapeFailure::new("ECONNRESET"), &ctx)
            .await;
        assert_eq!(resolution.action, ResolutionAction::Skip);
    }

    #[tokio::test]
    async fn network_retries_with_backoff_within_budget() {
        let resolution = planner(false)
            .determine(ErrorKind::Network, &ScrapeFailure::new("ECONNRESET"), &context())
            .await;
        assert_eq!(resolution.action, ResolutionAction::Retry { delay_ms: 1_000 });
    }

    #[tokio::test]
    async fn auth_and_bot_detection_escalate() {
        for kind in [ErrorKind::Authentication, ErrorKind::CaptchaOrBotDetection] {
            let resolution = planner(false)
                .determine(kind, &ScrapeFailure::new("blocked"), &context())
                .await;
            assert_eq!(resolution.action, ResolutionAction::ManualReview, "{kind}");
        }
    }

    #[tokio::test]
    async fn first_parsing_failure_retries_then_recurring_escalates() {
        let failure = ScrapeFailure::new("selector matched nothing");
        let first = planner(false)
            .determine(ErrorKind::Parsing, &failure, &context())
            .await;
        assert_eq!(
            first.action,
            ResolutionAction::Retry {
                delay_ms: PARSING_RETRY_DELAY_MS
            }
        );

        let recurring = planner(true)
            .determine(ErrorKind::Parsing, &failure, &context())
            .await;
        assert_eq!(recurring.action, ResolutionAction::ManualReview);
    }

    #[tokio::test]
    async fn fixed_delay_kinds() {
        let failure = ScrapeFailure::new("whatever");
        let storage = planner(false)
            .determine(ErrorKind::Storage, &failure, &context())
            .await;
        assert_eq!(
            storage.action,
            ResolutionAction::Retry {
                delay_ms: STORAGE_RETRY_DELAY_MS
            }
        );

        let proxy = planner(false)
            .determine(ErrorKind::Proxy, &failure, &context())
            .await;
        assert_eq!(
            proxy.action,
            ResolutionAction::Retry {
                delay_ms: PROXY_RETRY_DELAY_MS
            }
        );

        let structure = planner(false)
            .determine(ErrorKind::ContentStructureChanged, &failure, &context())
            .await;
        assert_eq!(structure.action, ResolutionAction::ManualReview);

        let unknown = planner(false)
            .determine(ErrorKind::Unknown, &failure, &context())
            .await;
        assert_eq!(unknown.action, ResolutionAction::Skip);
    }
}
