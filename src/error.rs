//! Error taxonomy for the collection pipeline.
//!
//! Every failure raised while scraping a grant source resolves to exactly
//! one [`ErrorKind`]. The kind drives all downstream policy: whether the
//! retry engine will try again, what delay the resolution planner picks,
//! and whether the orchestrator escalates to a human queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of failure categories for scraping operations.
///
/// The set is deliberately small: each variant corresponds to a distinct
/// recovery policy, not to a distinct upstream symptom. Two symptoms that
/// warrant the same recovery share a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Connection-level failure: refused, reset, host not found.
    Network,
    /// The operation exceeded its time budget.
    Timeout,
    /// The source is throttling us (HTTP 429 and friends).
    RateLimit,
    /// Credentials rejected (HTTP 401/403). Needs a human or a key rotation.
    Authentication,
    /// Captcha or anti-bot defense triggered. Needs a human.
    CaptchaOrBotDetection,
    /// A page fetched fine but our extraction logic failed on it.
    Parsing,
    /// The source changed its page structure; selectors need updating.
    ContentStructureChanged,
    /// The local persistence layer failed while storing results.
    Storage,
    /// An intermediate proxy or tunnel failed.
    Proxy,
    /// Could not be categorized at all.
    Unknown,
}

impl ErrorKind {
    /// Stable string label, used for logging and tracker persistence.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate-limit",
            Self::Authentication => "authentication",
            Self::CaptchaOrBotDetection => "captcha-or-bot-detection",
            Self::Parsing => "parsing",
            Self::ContentStructureChanged => "content-structure-changed",
            Self::Storage => "storage",
            Self::Proxy => "proxy",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the retry engine is ever allowed to retry this kind.
    ///
    /// Authentication and bot-detection failures require a credential fix
    /// or a human; retrying only burns budget and can deepen a lockout.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Authentication | Self::CaptchaOrBotDetection)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw failure occurrence, captured at the point an operation failed.
///
/// Immutable once created. Classification reads only the message; the URL
/// and trace travel along for the tracker and for alert rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeFailure {
    /// Human-readable failure message.
    pub message: String,
    /// URL being fetched when the failure occurred, if known.
    pub source_url: Option<String>,
    /// Stack trace or error-source chain, if available.
    pub trace: Option<String>,
    /// When the failure was captured.
    pub occurred_at: DateTime<Utc>,
}

impl ScrapeFailure {
    /// Capture a failure from a bare message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source_url: None,
            trace: None,
            occurred_at: Utc::now(),
        }
    }

    /// Capture a failure from any error value, recording its source chain
    /// as the trace.
    #[must_use]
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            source_url: None,
            trace: if chain.is_empty() {
                None
            } else {
                Some(chain.join(" <- "))
            },
            occurred_at: Utc::now(),
        }
    }

    /// Attach the URL that was being fetched.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Attach a stack trace or diagnostic dump.
    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }
}

impl std::fmt::Display for ScrapeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source_url {
            Some(url) => write!(f, "{} ({url})", self.message),
            None => f.write_str(&self.message),
        }
    }
}
