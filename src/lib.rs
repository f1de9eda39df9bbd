//! Error handling and recovery for the grantseek collection pipeline.
//!
//! Grant sources are unreliable upstreams: they rate-limit, drop
//! connections, lock accounts out, deploy anti-bot defenses, and change
//! their page structure without notice. This crate holds the decision
//! logic that sits between "an operation failed" and "what happens next":
//!
//! - [`classify`] maps any raw failure onto a closed [`ErrorKind`]
//!   taxonomy.
//! - [`RetryEngine`] runs operations under bounded exponential backoff
//!   with jitter, never retrying kinds a human has to fix.
//! - [`ResolutionPlanner`] picks per-kind next actions: retry with a
//!   tuned delay, skip, or escalate to manual review.
//! - [`DegradationController`] lets a partially failed batch continue at
//!   reduced fidelity instead of aborting outright.
//! - [`ScrapingErrorHandler`] orchestrates the above and fires alerts
//!   when thresholds are crossed.
//!
//! Fetching, parsing, persistence, and alert delivery are collaborators
//! behind the [`ErrorTracker`] and [`NotificationSender`] traits; this
//! crate performs no I/O of its own beyond the backoff sleeps.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod classify;
pub mod config;
pub mod context;
pub mod degrade;
pub mod error;
pub mod handler;
pub mod notify;
pub mod resolve;
pub mod retry;
pub mod track;

pub use classify::classify;
pub use config::{Config, DegradationConfig, NotificationThresholds, RetryConfig};
pub use context::ScrapeContext;
pub use degrade::{DegradationController, DegradationOutcome, FallbackStrategy};
pub use error::{ErrorKind, ScrapeFailure};
pub use handler::ScrapingErrorHandler;
pub use notify::{NotificationSender, NotifyError};
pub use resolve::{Resolution, ResolutionAction, ResolutionPlanner};
pub use retry::{backoff_delay, RetryEngine};
pub use track::{ErrorTracker, RetryOutcome, TrackerError};
