use crate::utils::error::{CrawlError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant};

/// Stand-in for budgets too large to represent as an instant.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn from_now(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget).unwrap_or(now + FAR_FUTURE)
}

/// The overall collection deadline. Every remote interaction and every settle
/// wait runs under it, so nothing outlives the budget given to the crawl.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: from_now(budget),
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Runs `fut` under both this deadline and a narrower `budget`. Lapsing the
    /// budget yields [`CrawlError::Timeout`]; lapsing the deadline yields
    /// [`CrawlError::DeadlineExceeded`]. The future is dropped either way.
    pub async fn guard<T, F>(&self, operation: &str, budget: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_expired() {
            return Err(self.exceeded(operation));
        }

        let step_end = from_now(budget);
        if step_end < self.at {
            match time::timeout_at(step_end, fut).await {
                Ok(result) => result,
                Err(_) => Err(CrawlError::Timeout {
                    operation: operation.to_string(),
                    after: budget,
                }),
            }
        } else {
            match time::timeout_at(self.at, fut).await {
                Ok(result) => result,
                Err(_) => Err(self.exceeded(operation)),
            }
        }
    }

    /// Settle wait. Sleeps `delay`, cut short by the deadline.
    pub async fn settle(&self, operation: &str, delay: Duration) -> Result<()> {
        let wake = from_now(delay);
        if wake >= self.at {
            time::sleep_until(self.at).await;
            return Err(self.exceeded(operation));
        }
        time::sleep_until(wake).await;
        Ok(())
    }

    fn exceeded(&self, operation: &str) -> CrawlError {
        CrawlError::DeadlineExceeded {
            operation: operation.to_string(),
        }
    }
}
