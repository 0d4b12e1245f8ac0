//! Rate limiter for admin sign-in
//!
//! Two sliding windows guard the login form and the login API:
//! - failed attempts per email address (5 per 15 minutes)
//! - sign-in requests per client IP (10 per minute)

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

const EMAIL_LIMIT: usize = 5;
const EMAIL_WINDOW_MINUTES: i64 = 15;
const IP_LIMIT: usize = 10;
const IP_WINDOW_MINUTES: i64 = 1;

/// Why a sign-in was refused before reaching the auth service
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RateLimited {
    #[error("Too many failed sign-in attempts. Try again in 15 minutes.")]
    Email,
    #[error("Too many requests. Please slow down.")]
    Ip,
}

/// Timestamps of recent events per key, forgotten once older than `window`
struct SlidingWindow<K> {
    limit: usize,
    window: Duration,
    hits: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
}

impl<K: Eq + Hash> SlidingWindow<K> {
    fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: RwLock::new(HashMap::new()),
        }
    }

    async fn is_limited(&self, key: K) -> bool {
        let cutoff = Utc::now() - self.window;
        let mut hits = self.hits.write().await;
        let times = hits.entry(key).or_default();
        times.retain(|t| *t > cutoff);
        times.len() >= self.limit
    }

    async fn record(&self, key: K) {
        self.hits.write().await.entry(key).or_default().push(Utc::now());
    }

    async fn clear(&self, key: &K) {
        self.hits.write().await.remove(key);
    }

    async fn prune(&self) {
        let cutoff = Utc::now() - self.window;
        self.hits.write().await.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }
}

/// Login rate limiter
pub struct LoginRateLimiter {
    by_email: SlidingWindow<String>,
    by_ip: SlidingWindow<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            by_email: SlidingWindow::new(EMAIL_LIMIT, Duration::minutes(EMAIL_WINDOW_MINUTES)),
            by_ip: SlidingWindow::new(IP_LIMIT, Duration::minutes(IP_WINDOW_MINUTES)),
        }
    }

    /// Admit or refuse a sign-in attempt. Every admitted attempt counts
    /// against the IP window.
    pub async fn check(&self, email: &str, ip: Option<IpAddr>) -> Result<(), RateLimited> {
        if let Some(ip) = ip {
            if self.by_ip.is_limited(ip).await {
                return Err(RateLimited::Ip);
            }
        }
        if self.by_email.is_limited(normalize(email)).await {
            return Err(RateLimited::Email);
        }
        if let Some(ip) = ip {
            self.by_ip.record(ip).await;
        }
        Ok(())
    }

    pub async fn record_failure(&self, email: &str) {
        self.by_email.record(normalize(email)).await;
    }

    /// Forget failures after a successful sign-in
    pub async fn record_success(&self, email: &str) {
        self.by_email.clear(&normalize(email)).await;
    }

    /// Drop expired entries; run periodically
    pub async fn cleanup(&self) {
        self.by_email.prune().await;
        self.by_ip.prune().await;
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_email_failures_limit() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            assert!(limiter.check("eic@school.edu", None).await.is_ok());
            limiter.record_failure("eic@school.edu").await;
        }
        limiter.record_failure("EIC@school.edu ").await;
        assert_eq!(limiter.check("eic@school.edu", None).await, Err(RateLimited::Email));

        limiter.record_success("eic@school.edu").await;
        assert!(limiter.check("eic@school.edu", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_ip_request_limit() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::from_str("203.0.113.7").unwrap();

        for i in 0..10 {
            assert!(limiter.check(&format!("user{i}@school.edu"), Some(ip)).await.is_ok());
        }
        assert_eq!(limiter.check("other@school.edu", Some(ip)).await, Err(RateLimited::Ip));

        let other_ip = IpAddr::from_str("203.0.113.8").unwrap();
        assert!(limiter.check("other@school.edu", Some(other_ip)).await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_live_entries() {
        let limiter = LoginRateLimiter::new();
        for _ in 0..5 {
            limiter.record_failure("a@school.edu").await;
        }
        limiter.cleanup().await;
        assert_eq!(limiter.check("a@school.edu", None).await, Err(RateLimited::Email));
    }

    #[test]
    fn test_failures_are_per_email() {
        let limiter = LoginRateLimiter::default();
        tokio_test::block_on(async {
            for _ in 0..5 {
                limiter.record_failure("a@school.edu").await;
            }
            assert_eq!(limiter.check("a@school.edu", None).await, Err(RateLimited::Email));
            assert!(limiter.check("b@school.edu", None).await.is_ok());
        });
    }
}
