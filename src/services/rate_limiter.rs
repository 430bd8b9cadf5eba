//! Login throttling
//!
//! Failed logins are counted per email over a sliding window; requests are
//! counted per client IP over a shorter one.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

/// Sliding-window counter keyed by `K`
struct AttemptLog<K> {
    entries: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
    limit: usize,
    window: Duration,
}

impl<K: Eq + Hash> AttemptLog<K> {
    fn new(limit: usize, window: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            limit,
            window,
        }
    }

    async fn is_limited(&self, key: &K) -> bool {
        let cutoff = Utc::now() - self.window;
        let entries = self.entries.read().await;
        entries
            .get(key)
            .map(|times| times.iter().filter(|t| **t > cutoff).count() >= self.limit)
            .unwrap_or(false)
    }

    async fn record(&self, key: K) {
        let now = Utc::now();
        let cutoff = now - self.window;
        let mut entries = self.entries.write().await;
        let times = entries.entry(key).or_default();
        times.retain(|t| *t > cutoff);
        times.push(now);
    }

    async fn clear(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

    async fn prune(&self) {
        let cutoff = Utc::now() - self.window;
        self.entries.write().await.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }
}

pub struct LoginRateLimiter {
    failures: AttemptLog<String>,
    requests: AttemptLog<IpAddr>,
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginRateLimiter {
    /// 5 failed logins per 15 minutes per email, 10 requests per minute per IP
    pub fn new() -> Self {
        Self::with_limits(5, Duration::minutes(15), 10, Duration::minutes(1))
    }

    pub fn with_limits(
        max_failures: usize,
        failure_window: Duration,
        max_requests: usize,
        request_window: Duration,
    ) -> Self {
        Self {
            failures: AttemptLog::new(max_failures, failure_window),
            requests: AttemptLog::new(max_requests, request_window),
        }
    }

    pub async fn is_email_limited(&self, email: &str) -> bool {
        self.failures.is_limited(&normalize(email)).await
    }

    pub async fn record_failure(&self, email: &str) {
        self.failures.record(normalize(email)).await;
    }

    /// Forget failures after a successful login
    pub async fn clear_failures(&self, email: &str) {
        self.failures.clear(&normalize(email)).await;
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.requests.is_limited(&ip).await
    }

    pub async fn record_request(&self, ip: IpAddr) {
        self.requests.record(ip).await;
    }

    /// Drop expired entries; called from the periodic cleanup task
    pub async fn cleanup(&self) {
        self.failures.prune().await;
        self.requests.prune().await;
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}
