//! Per-run scraping context.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the run in which a failure occurred: one source, one job,
/// one retry sequence. Created when a job begins processing a source and
/// threaded by reference through every retry attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeContext {
    /// Stable identifier of the external source being scraped.
    pub source_id: String,
    /// The scheduled job execution this attempt belongs to.
    pub job_id: Uuid,
    /// URL currently being fetched.
    pub source_url: String,
    /// Current attempt number, 1-based within the active retry sequence.
    pub attempt: u32,
}

impl ScrapeContext {
    /// Start a new context at attempt 1.
    #[must_use]
    pub fn new(source_id: impl Into<String>, job_id: Uuid, source_url: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            job_id,
            source_url: source_url.into(),
            attempt: 1,
        }
    }

    /// Advance to the next attempt after a failure.
    pub fn next_attempt(&mut self) {
        self.attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_start_at_one_and_increment() {
        let mut ctx = ScrapeContext::new("state-gov", Uuid::new_v4(), "https://grants.example.org");
        assert_eq!(ctx.attempt, 1);
        ctx.next_attempt();
        assert_eq!(ctx.attempt, 2);
    }
}
