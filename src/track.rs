//! Error-tracker collaborator interface.
//!
//! The tracker owns all shared mutable state: per-source rolling error
//! rates, recurring-error counters, and retry outcome records. This
//! subsystem never keeps a competing local cache of error counts, so
//! concurrent source workers all observe the tracker's single view.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::ScrapeContext;
use crate::error::{ErrorKind, ScrapeFailure};

/// Errors surfaced by a tracker implementation.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The tracker's backing store rejected the operation.
    #[error("tracker storage error: {0}")]
    Storage(String),
    /// The tracker could not be reached.
    #[error("tracker unavailable: {0}")]
    Unavailable(String),
}

/// One recorded outcome in a source's history, most recent first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryOutcome {
    /// Classification of the attempt's failure, if it failed.
    pub kind: Option<ErrorKind>,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// When the outcome was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Persistence and bookkeeping for failures, implemented outside this
/// subsystem (typically atop the application database).
///
/// Implementations must be safe for concurrent invocation from multiple
/// source workers; calls from this subsystem carry at-least-once
/// semantics.
#[async_trait]
pub trait ErrorTracker: Send + Sync {
    /// Durably record one failure occurrence.
    async fn track_error(
        &self,
        failure: &ScrapeFailure,
        context: &ScrapeContext,
    ) -> Result<(), TrackerError>;

    /// Record that a retry sequence eventually succeeded, with the
    /// wall-clock time from first attempt to success.
    async fn record_successful_retry(
        &self,
        kind: ErrorKind,
        resolution_time_ms: u64,
    ) -> Result<(), TrackerError>;

    /// Record that a retry sequence gave up.
    async fn record_failed_retry(&self, kind: ErrorKind) -> Result<(), TrackerError>;

    /// Rolling error-rate fraction (0.0–1.0) for one source.
    async fn source_error_rate(&self, source_id: &str) -> Result<f64, TrackerError>;

    /// The most recent outcomes for one source, newest first, at most
    /// `limit` entries.
    async fn source_error_history(
        &self,
        source_id: &str,
        limit: usize,
    ) -> Result<Vec<RetryOutcome>, TrackerError>;

    /// Whether this source has crossed the recurring-error threshold for
    /// the given kind (a per-source counter maintained by the tracker).
    async fn has_recurring_errors(
        &self,
        source_id: &str,
        kind: ErrorKind,
    ) -> Result<bool, TrackerError>;
}
