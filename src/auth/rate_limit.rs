//! Fixed-window login limiter keyed by client IP.
//!
//! Every attempt counts, successful or not. Once `max_attempts` have been
//! seen inside the current window the remaining attempts are refused until
//! the window that started with the first attempt has elapsed.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    attempts: u32,
}

#[derive(Clone)]
pub struct LoginLimiter {
    windows: Arc<DashMap<IpAddr, Window>>,
    max_attempts: u32,
    window: Duration,
}

impl LoginLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            max_attempts: max_attempts.max(1),
            window,
        }
    }

    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        Self::new(cfg.max_attempts, Duration::from_secs(cfg.window_secs.max(1)))
    }

    /// Records an attempt; `Err` carries the time left until the window resets.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.check_at(ip, Instant::now())
    }

    pub fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        let mut entry = self.windows.entry(ip).or_insert(Window {
            started: now,
            attempts: 0,
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            entry.started = now;
            entry.attempts = 0;
        }

        if entry.attempts >= self.max_attempts {
            let retry_after = self
                .window
                .saturating_sub(now.saturating_duration_since(entry.started));
            warn!(%ip, attempts = entry.attempts, "login rate limit exceeded");
            return Err(retry_after);
        }

        entry.attempts += 1;
        debug!(%ip, attempts = entry.attempts, "login attempt recorded");
        Ok(())
    }

    /// Drops windows that have already elapsed.
    pub fn prune(&self) {
        self.prune_at(Instant::now());
    }

    pub fn prune_at(&self, now: Instant) {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!(removed, "pruned stale login windows");
        }
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
