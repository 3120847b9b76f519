//! Fixed-window in-memory rate limiter.
//!
//! Suitable for a single-server deployment; state lives and dies with the
//! process. Only the login endpoint is limited.

use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Login attempts allowed per window per client IP.
pub const LOGIN_LIMIT: u32 = 5;
pub const LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Entries are purged lazily once the map grows past this.
const CLEANUP_THRESHOLD: usize = 1024;

struct Entry {
    count: u32,
    reset_at: Instant,
}

#[derive(Debug)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_in: Duration,
}

#[derive(Clone, Default)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request against `key`.
    pub fn check(&self, key: &str, limit: u32, window: Duration) -> Decision {
        self.check_at(key, limit, window, Instant::now())
    }

    fn check_at(&self, key: &str, limit: u32, window: Duration, now: Instant) -> Decision {
        let mut map = self.inner.lock().expect("rate limiter mutex poisoned");

        if map.len() > CLEANUP_THRESHOLD {
            map.retain(|_, entry| now < entry.reset_at);
        }

        let entry = map.entry(key.to_string()).or_insert(Entry {
            count: 0,
            reset_at: now + window,
        });

        // Window expired: start a fresh one.
        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + window;
        }

        if entry.count >= limit {
            return Decision {
                allowed: false,
                remaining: 0,
                reset_in: entry.reset_at.saturating_duration_since(now),
            };
        }

        entry.count += 1;
        Decision {
            allowed: true,
            remaining: limit - entry.count,
            reset_in: entry.reset_at.saturating_duration_since(now),
        }
    }
}

/// Best-effort client IP: x-forwarded-for (first hop), then x-real-ip.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return real_ip.to_string();
    }
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixth_attempt_in_window_is_rejected() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for i in 0..5 {
            let d = limiter.check_at("1.2.3.4", 5, Duration::from_secs(60), now);
            assert!(d.allowed, "attempt {i} should pass");
        }
        let d = limiter.check_at("1.2.3.4", 5, Duration::from_secs(60), now);
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
    }

    #[test]
    fn window_expiry_resets_the_counter() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..5 {
            limiter.check_at("k", 5, Duration::from_secs(60), now);
        }
        assert!(!limiter.check_at("k", 5, Duration::from_secs(60), now).allowed);

        let later = now + Duration::from_secs(61);
        let d = limiter.check_at("k", 5, Duration::from_secs(60), later);
        assert!(d.allowed);
        assert_eq!(d.remaining, 4);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..5 {
            limiter.check_at("a", 5, Duration::from_secs(60), now);
        }
        assert!(limiter.check_at("b", 5, Duration::from_secs(60), now).allowed);
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 10.0.0.2".parse().unwrap());
        headers.insert("x-real-ip", "10.9.9.9".parse().unwrap());
        assert_eq!(client_ip(&headers), "10.0.0.1");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "10.9.9.9".parse().unwrap());
        assert_eq!(client_ip(&headers), "10.9.9.9");

        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
