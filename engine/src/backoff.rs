//! Adaptive delay between failing loop iterations.
//!
//! The first [`FREE_FAILURES`] failures in a burst cost nothing. After that
//! each failure doubles the delay, starting at [`INITIAL_DELAY`]. A quiet
//! period longer than three delays plus a second halves the delay and
//! restarts the free count.

use std::time::{Duration, Instant};

pub const INITIAL_DELAY: Duration = Duration::from_millis(50);
pub const FREE_FAILURES: u32 = 3;
const QUIET_DELAYS: u32 = 3;
const QUIET_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct Backoff {
    fail_count: u32,
    fail_wait: Duration,
    fail_last: Option<Instant>,
}

impl Backoff {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure at `now` and return how long the caller must pause.
    pub fn record_failure(&mut self, now: Instant) -> Option<Duration> {
        if let Some(last) = self.fail_last {
            let quiet = self
                .fail_wait
                .saturating_mul(QUIET_DELAYS)
                .saturating_add(QUIET_GRACE);
            if now.saturating_duration_since(last) > quiet {
                self.fail_wait /= 2;
                self.fail_count = 0;
                tracing::info!(delay = ?self.fail_wait, "Error backoff delay reduced");
            }
        }

        self.fail_count = self.fail_count.saturating_add(1);
        self.fail_last = Some(now);

        if self.fail_count <= FREE_FAILURES {
            return None;
        }
        self.fail_wait = if self.fail_wait.is_zero() {
            INITIAL_DELAY
        } else {
            self.fail_wait.saturating_mul(2)
        };
        tracing::info!(delay = ?self.fail_wait, "Error backoff delay increased");
        Some(self.fail_wait)
    }

    /// Record a failure now and sleep for the resulting delay, if any.
    pub async fn wait(&mut self) {
        if let Some(delay) = self.record_failure(Instant::now()) {
            tokio::time::sleep(delay).await;
        }
    }

    #[must_use]
    pub fn fail_count(&self) -> u32 {
        self.fail_count
    }

    #[must_use]
    pub fn fail_wait(&self) -> Duration {
        self.fail_wait
    }
}
