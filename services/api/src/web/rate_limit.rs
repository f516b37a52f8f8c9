//! services/api/src/web/rate_limit.rs
//!
//! Fixed-window, per-client rate limiting with in-memory storage. Each route
//! group owns its own limiter so auth traffic and content traffic are counted
//! separately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Bucket used when no client address can be resolved.
pub const GLOBAL_KEY: &str = "global";

#[derive(Debug, Clone)]
struct Window {
    count: u64,
    started: Instant,
}

pub struct RateLimiter {
    name: &'static str,
    max: u64,
    window: Duration,
    store: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, max: u64, window: Duration) -> Self {
        Self {
            name,
            max,
            window,
            store: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Counts one request for `key`. Fails with the number of seconds until
    /// the current window closes once `max` requests were already counted.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        match store.get_mut(key) {
            Some(entry) => {
                let elapsed = now.duration_since(entry.started);
                if elapsed >= self.window {
                    entry.count = 1;
                    entry.started = now;
                    Ok(())
                } else if entry.count >= self.max {
                    Err((self.window - elapsed).as_secs() + 1)
                } else {
                    entry.count += 1;
                    Ok(())
                }
            }
            None => {
                store.insert(
                    key.to_string(),
                    Window {
                        count: 1,
                        started: now,
                    },
                );
                Ok(())
            }
        }
    }

    /// Removes windows that have closed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let before = store.len();
        store.retain(|_, entry| now.duration_since(entry.started) < self.window);
        before - store.len()
    }
}

/// Periodically sweeps closed windows out of every limiter.
pub fn spawn_sweeper(limiters: Vec<Arc<RateLimiter>>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            for limiter in &limiters {
                let removed = limiter.sweep();
                if removed > 0 {
                    debug!(limiter = limiter.name(), removed, "Swept rate limit windows");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max_then_rejects() {
        let limiter = RateLimiter::new("test", 3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check("1.2.3.4").is_ok());
        }
        let retry_after = limiter.check("1.2.3.4").unwrap_err();
        assert!(retry_after >= 1 && retry_after <= 61);
    }

    #[test]
    fn keys_are_counted_separately() {
        let limiter = RateLimiter::new("test", 1, Duration::from_secs(60));
        assert!(limiter.check("1.2.3.4").is_ok());
        assert!(limiter.check("1.2.3.4").is_err());
        assert!(limiter.check("5.6.7.8").is_ok());
    }

    #[test]
    fn window_resets_after_it_closes() {
        let limiter = RateLimiter::new("test", 1, Duration::from_millis(20));
        assert!(limiter.check("k").is_ok());
        assert!(limiter.check("k").is_err());
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check("k").is_ok());
    }

    #[test]
    fn sweep_drops_closed_windows() {
        let limiter = RateLimiter::new("test", 5, Duration::from_millis(10));
        limiter.check("a").unwrap();
        limiter.check("b").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(limiter.sweep(), 2);
    }
}
