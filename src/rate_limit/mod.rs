//! Fixed-window, per-client rate limiting.
//!
//! State is process-local: separate instances each enforce their own limit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;

use crate::config::RateLimitSettings;

/// Request count for one client within its current window.
#[derive(Debug, Clone, Copy)]
struct WindowRecord {
    count: u32,
    window_start: DateTime<Utc>,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    /// Time until the window resets; only set when the request was denied.
    pub retry_after: Option<TimeDelta>,
}

impl RateLimitDecision {
    /// Retry delay rounded up to whole seconds, for the `Retry-After` header.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after.map(|delay| {
            let millis = delay.num_milliseconds().max(0) as u64;
            millis.div_ceil(1000)
        })
    }
}

/// Fixed-window rate limiter keyed by client identifier.
pub struct RateLimiter {
    max_requests: u32,
    window: TimeDelta,
    records: Mutex<HashMap<String, WindowRecord>>,
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self::with_window(settings.max_requests, settings.window)
    }

    pub fn with_window(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window: TimeDelta::from_std(window).unwrap_or(TimeDelta::weeks(52)),
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request from `client_id` against its current window.
    pub fn check(&self, client_id: &str) -> RateLimitDecision {
        self.check_at(client_id, Utc::now())
    }

    /// [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(&self, client_id: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let mut records = self.lock();

        let record = match records.get_mut(client_id) {
            Some(record) if now - record.window_start < self.window => {
                record.count = record.count.saturating_add(1);
                *record
            }
            _ => {
                let fresh = WindowRecord {
                    count: 1,
                    window_start: now,
                };
                records.insert(client_id.to_string(), fresh);
                fresh
            }
        };
        drop(records);

        let reset_at = record.window_start + self.window;
        let allowed = record.count <= self.max_requests;

        RateLimitDecision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(record.count),
            reset_at,
            retry_after: (!allowed).then(|| reset_at - now),
        }
    }

    /// Drop records whose window has already expired. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Utc::now())
    }

    pub fn cleanup_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, record| now - record.window_start < self.window);
        before - records.len()
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    /// Run [`cleanup_expired`](Self::cleanup_expired) every `interval` until the task is aborted.
    pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.cleanup_expired();
                if removed > 0 {
                    tracing::debug!(
                        removed,
                        remaining = limiter.tracked_clients(),
                        "Swept expired rate-limit records"
                    );
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, WindowRecord>> {
        // A panic while holding the lock cannot leave a record half-written.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}
