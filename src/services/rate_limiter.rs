//! Login rate limiting
//!
//! Two sliding windows guard the login endpoints:
//! - failed attempts per email (5 per 15 minutes)
//! - requests per client IP (10 per minute)

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

const EMAIL_WINDOW_MINUTES: i64 = 15;
const EMAIL_MAX_FAILURES: usize = 5;
const IP_WINDOW_MINUTES: i64 = 1;
const IP_MAX_REQUESTS: usize = 10;

/// Login rate limiter shared by the web and mobile login routes
pub struct LoginRateLimiter {
    email_failures: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
    ip_requests: Arc<RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            email_failures: Arc::new(RwLock::new(HashMap::new())),
            ip_requests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn is_email_limited(&self, email: &str) -> bool {
        let mut failures = self.email_failures.write().await;
        let cutoff = Utc::now() - Duration::minutes(EMAIL_WINDOW_MINUTES);

        let entry = failures.entry(email.trim().to_lowercase()).or_default();
        entry.retain(|time| *time > cutoff);

        entry.len() >= EMAIL_MAX_FAILURES
    }

    pub async fn record_failed_attempt(&self, email: &str) {
        let mut failures = self.email_failures.write().await;
        failures
            .entry(email.trim().to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures after a successful login
    pub async fn clear_email(&self, email: &str) {
        self.email_failures
            .write()
            .await
            .remove(&email.trim().to_lowercase());
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        let mut requests = self.ip_requests.write().await;
        let cutoff = Utc::now() - Duration::minutes(IP_WINDOW_MINUTES);

        let entry = requests.entry(ip).or_default();
        entry.retain(|time| *time > cutoff);

        entry.len() >= IP_MAX_REQUESTS
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.ip_requests
            .write()
            .await
            .entry(ip)
            .or_default()
            .push(Utc::now());
    }

    /// Drop expired entries; run periodically
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let email_cutoff = now - Duration::minutes(EMAIL_WINDOW_MINUTES);
        let ip_cutoff = now - Duration::minutes(IP_WINDOW_MINUTES);

        {
            let mut failures = self.email_failures.write().await;
            failures.retain(|_, times| {
                times.retain(|time| *time > email_cutoff);
                !times.is_empty()
            });
        }

        {
            let mut requests = self.ip_requests.write().await;
            requests.retain(|_, times| {
                times.retain(|time| *time > ip_cutoff);
                !times.is_empty()
            });
        }
    }

    #[cfg(test)]
    async fn tracked_emails(&self) -> usize {
        self.email_failures.read().await.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
