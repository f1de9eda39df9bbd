//! Graceful degradation for batch runs.
//!
//! When one source's batch produces a mix of successes and failures, the
//! controller decides whether the run keeps going and at what fidelity,
//! instead of aborting the whole batch on the first sign of trouble.

use serde::{Deserialize, Serialize};

use crate::classify::classify;
use crate::config::DegradationConfig;
use crate::context::ScrapeContext;
use crate::error::{ErrorKind, ScrapeFailure};

/// Error-rate fraction below which a batch continues with no fallback.
pub const ERROR_RATE_FLOOR: f64 = 0.3;
/// Fraction of Network/Timeout errors above which cached data is served.
pub const NETWORK_MAJORITY_THRESHOLD: f64 = 0.7;
/// Fraction of Parsing errors above which partial results are kept.
pub const PARSING_MAJORITY_THRESHOLD: f64 = 0.5;

/// Reduced-fidelity strategies for continuing a degraded batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Serve previously collected data for this source.
    UseCache,
    /// Persist the records that parsed; skip the rest.
    PartialProcessing,
    /// Abandon this source for the current run.
    SkipSource,
}

/// Decision for the remainder of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradationOutcome {
    /// Whether the batch keeps processing.
    pub should_continue: bool,
    /// Fallback to apply when continuing at reduced fidelity.
    pub fallback: Option<FallbackStrategy>,
}

impl DegradationOutcome {
    fn stop() -> Self {
        Self {
            should_continue: false,
            fallback: None,
        }
    }

    fn continue_with(fallback: Option<FallbackStrategy>) -> Self {
        Self {
            should_continue: true,
            fallback,
        }
    }
}

/// Decides whether a partially failed batch keeps running.
#[derive(Debug, Clone)]
pub struct DegradationController {
    config: DegradationConfig,
}

impl DegradationController {
    /// Create a controller with the given policy switch.
    #[must_use]
    pub fn new(config: DegradationConfig) -> Self {
        Self { config }
    }

    /// Decide the fate of a batch given its failures and success count.
    ///
    /// With degradation disabled the batch always stops. Below the
    /// [`ERROR_RATE_FLOOR`] the batch continues untouched. Above it, the
    /// majority failure type picks the fallback: mostly Network/Timeout
    /// means the source itself is unreachable so cached data is served;
    /// mostly Parsing means some records still extract cleanly so partial
    /// results are kept; anything else abandons the source for this run.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn handle_partial_failure(
        &self,
        errors: &[ScrapeFailure],
        successful_count: usize,
        context: &ScrapeContext,
    ) -> DegradationOutcome {
        if !self.config.enabled {
            log::info!(
                "degradation disabled, failing batch for source {}",
                context.source_id
            );
            return DegradationOutcome::stop();
        }

        let total = errors.len() + successful_count;
        if total == 0 || errors.is_empty() {
            return DegradationOutcome::continue_with(None);
        }

        let error_rate = errors.len() as f64 / total as f64;
        if error_rate < ERROR_RATE_FLOOR {
            log::debug!(
                "source {} error rate {error_rate:.2} within noise floor, continuing",
                context.source_id
            );
            return DegradationOutcome::continue_with(None);
        }

        let kinds: Vec<ErrorKind> = errors.iter().map(classify).collect();
        let share = |predicate: fn(&ErrorKind) -> bool| {
            kinds.iter().filter(|k| predicate(k)).count() as f64 / kinds.len() as f64
        };

        let network_share = share(|k| matches!(k, ErrorKind::Network | ErrorKind::Timeout));
        let parsing_share = share(|k| matches!(k, ErrorKind::Parsing));

        let fallback = if network_share >= NETWORK_MAJORITY_THRESHOLD {
            FallbackStrategy::UseCache
        } else if parsing_share >= PARSING_MAJORITY_THRESHOLD {
            FallbackStrategy::PartialProcessing
        } else {
            FallbackStrategy::SkipSource
        };

        log::warn!(
            "source {} degraded (error rate {error_rate:.2}), applying {fallback:?}",
            context.source_id
        );
        DegradationOutcome::continue_with(Some(fallback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn controller(enabled: bool) -> DegradationController {
        DegradationController::new(DegradationConfig { enabled })
    }

    fn context() -> ScrapeContext {
        ScrapeContext::new("state-gov", Uuid::new_v4(), "https://grants.example.org")
    }

    fn failures(message: &str, count: usize) -> Vec<ScrapeFailure> {
        (0..count).map(|_| ScrapeFailure::new(message)).collect()
    }

    #[test]
    fn disabled_degradation_fails_the_batch() {
        let outcome = controller(false).handle_partial_failure(
            &failures("timeout", 1),
            9,
            &context(),
        );
        assert!(!outcome.should_continue);
        assert!(outcome.fallback.is_none());
    }

    #[test]
    fn error_rate_boundary_at_the_floor() {
        // 29/100 = 0.29 < 0.3: continue with no fallback.
        let outcome =
            controller(true).handle_partial_failure(&failures("timeout", 29), 71, &context());
        assert!(outcome.should_continue);
        assert!(outcome.fallback.is_none());

        // 31/100 = 0.31 >= 0.3: a fallback is selected.
        let outcome =
            controller(true).handle_partial_failure(&failures("timeout", 31), 69, &context());
        assert!(outcome.should_continue);
        assert!(outcome.fallback.is_some());
    }

    #[test]
    fn network_majority_serves_cache() {
        let mut errors = failures("connection refused", 7);
        errors.extend(failures("selector matched nothing", 3));
        let outcome = controller(true).handle_partial_failure(&errors, 2, &context());
        assert_eq!(outcome.fallback, Some(FallbackStrategy::UseCache));
    }

    #[test]
    fn parsing_majority_keeps_partial_results() {
        // 6 of 8 parsing (75% >= 50%), 2 successes: rate 0.8 over the floor.
        let mut errors = failures("failed to parse listing page", 6);
        errors.extend(failures("proxy down", 2));
        let outcome = controller(true).handle_partial_failure(&errors, 2, &context());
        assert!(outcome.should_continue);
        assert_eq!(outcome.fallback, Some(FallbackStrategy::PartialProcessing));
    }

    #[test]
    fn mixed_failures_skip_the_source() {
        let mut errors = failures("proxy down", 4);
        errors.extend(failures("database is locked", 4));
        let outcome = controller(true).handle_partial_failure(&errors, 2, &context());
        assert_eq!(outcome.fallback, Some(FallbackStrategy::SkipSource));
    }

    #[test]
    fn fallback_wire_names_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&FallbackStrategy::UseCache).expect("serialize"),
            "\"use_cache\""
        );
        assert_eq!(
            serde_json::to_string(&FallbackStrategy::PartialProcessing).expect("serialize"),
            "\"partial_processing\""
        );
        assert_eq!(
            serde_json::to_string(&FallbackStrategy::SkipSource).expect("serialize"),
            "\"skip_source\""
        );
    }

    #[test]
    fn empty_batch_continues_untouched() {
        let outcome = controller(true).handle_partial_failure(&[], 0, &context());
        assert!(outcome.should_continue);
        assert!(outcome.fallback.is_none());
    }
}
