//! Notification-sender collaborator interface.
//!
//! Alert rendering and delivery (email, Slack, webhooks) live outside
//! this subsystem; the orchestrator only decides *when* an alert fires.

use async_trait::async_trait;
use thiserror::Error;

use crate::context::ScrapeContext;
use crate::error::ErrorKind;

/// Errors surfaced by a notification transport.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Alert delivery, implemented outside this subsystem.
///
/// Implementations must be safe for concurrent invocation from multiple
/// source workers. Delivery failures never change a resolution; the
/// orchestrator logs them and moves on.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// A failure of a configured critical kind occurred.
    async fn send_critical_error_alert(
        &self,
        kind: ErrorKind,
        context: &ScrapeContext,
    ) -> Result<(), NotifyError>;

    /// A source's rolling error rate crossed the configured threshold.
    async fn send_high_error_rate_alert(
        &self,
        source_id: &str,
        rate: f64,
    ) -> Result<(), NotifyError>;

    /// A source failed the configured number of times in a row with no
    /// intervening success.
    async fn send_consecutive_failures_alert(
        &self,
        source_id: &str,
        count: u32,
    ) -> Result<(), NotifyError>;
}
