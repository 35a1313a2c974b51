use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// In-memory sliding-window limiter for anonymous endpoints, keyed by caller
/// address. Lives in the shared state so the window survives across requests.
#[derive(Clone)]
pub struct RateLimiter {
    hits: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    max_hits: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_hits: usize, window_secs: u64) -> Self {
        Self {
            hits: Arc::new(Mutex::new(HashMap::new())),
            max_hits,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Records one attempt for `key` and reports whether it is still within
    /// the window's budget.
    pub async fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().await;
        let history = hits.entry(key.to_string()).or_default();
        history.retain(|at| now.duration_since(*at) < self.window);
        if history.len() < self.max_hits {
            history.push(now);
            true
        } else {
            false
        }
    }

    /// Drops identifiers whose whole history fell out of the window.
    pub async fn prune(&self) {
        let now = Instant::now();
        let mut hits = self.hits.lock().await;
        hits.retain(|_, history| {
            history.retain(|at| now.duration_since(*at) < self.window);
            !history.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_budget_is_enforced_per_key() {
        let limiter = RateLimiter::new(3, 60);

        assert!(limiter.allow("10.0.0.1").await);
        assert!(limiter.allow("10.0.0.1").await);
        assert!(limiter.allow("10.0.0.1").await);
        assert!(!limiter.allow("10.0.0.1").await);

        // Another caller has its own budget.
        assert!(limiter.allow("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_prune_drops_expired_histories() {
        let limiter = RateLimiter::new(5, 1);
        limiter.allow("10.0.0.1").await;
        limiter.allow("10.0.0.2").await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        limiter.prune().await;

        let hits = limiter.hits.lock().await;
        assert!(hits.is_empty());
    }
}
