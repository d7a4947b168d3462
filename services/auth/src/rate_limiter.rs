//! Rate limiter for login attempts
//!
//! Failed attempts are counted per key (client address and normalized email)
//! within a window; reaching the limit bans the key for a fixed duration.
//! Entries whose window and ban have both run out are evicted.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of failed attempts allowed per window
    pub max_attempts: u32,
    pub window: Duration,
    pub ban_duration: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(300),
            ban_duration: Duration::from_secs(3600),
        }
    }
}

/// Limiter key for login attempts of `email` coming from `client`
pub fn login_key(client: IpAddr, email: &str) -> String {
    format!("{}/{}", client, email.trim().to_lowercase())
}

#[derive(Debug)]
struct Entry {
    failures: u32,
    window_start: Instant,
    ban_expires: Option<Instant>,
}

impl Entry {
    fn is_banned(&self, now: Instant) -> bool {
        self.ban_expires.is_some_and(|expires| now < expires)
    }

    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        !self.is_banned(now) && now.duration_since(self.window_start) >= window
    }
}

/// Rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Tell whether `key` is currently banned
    pub async fn is_blocked(&self, key: &str) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .is_some_and(|entry| entry.is_banned(Instant::now()))
    }

    /// Count a failed attempt for `key`, banning it once the limit is reached
    pub async fn record_failure(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = self.config.window;
        entries.retain(|_, entry| !entry.is_stale(now, window));

        let entry = entries.entry(key.to_string()).or_insert(Entry {
            failures: 0,
            window_start: now,
            ban_expires: None,
        });

        if entry.ban_expires.is_some_and(|expires| now >= expires) {
            entry.failures = 0;
            entry.ban_expires = None;
            entry.window_start = now;
        }

        entry.failures += 1;
        if entry.failures >= self.config.max_attempts && entry.ban_expires.is_none() {
            entry.ban_expires = Some(now + self.config.ban_duration);
            warn!(
                "Too many failed logins for {}, blocked for {:?}",
                key, self.config.ban_duration
            );
        }
    }

    /// Forget the failures of `key`, after a successful login
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.entries.lock().await.len()
    }
}
