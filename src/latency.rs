//! Round-trip latency accounting for correlated frame/response pairs.
//!
//! Send and receive paths plus the periodic eviction pass all mutate the same
//! record collection, so everything goes through one internal mutex. Stats
//! are computed from a bounded window of completed round trips.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tracing::debug;

/// 表示用に保持する直近サンプル数
const RECENT_DISPLAY: usize = 30;

/// Order statistics over the completed round-trip window (milliseconds).
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub p95: f64,
    /// Most recent durations, oldest first.
    pub recent: Vec<f64>,
}

struct Inner {
    /// request id → send timestamp (ms)
    pending: HashMap<String, f64>,
    /// completed round-trip durations (ms), bounded to the window size
    completed: VecDeque<f64>,
    evicted: u64,
}

pub struct LatencyTracker {
    window: usize,
    inner: Mutex<Inner>,
}

impl LatencyTracker {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            inner: Mutex::new(Inner {
                pending: HashMap::new(),
                completed: VecDeque::new(),
                evicted: 0,
            }),
        }
    }

    /// Register an outgoing frame. `start_ms` is the caller's clock.
    pub fn record_send(&self, request_id: &str, start_ms: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.pending.insert(request_id.to_string(), start_ms);
    }

    /// Match a response against its pending record.
    ///
    /// Returns the round-trip duration, or `None` for an unmatched id
    /// (unknown, already matched, or evicted). Unmatched responses are not
    /// an error; they are logged and dropped.
    pub fn record_receive(&self, request_id: &str, end_ms: f64) -> Option<f64> {
        let mut inner = self.inner.lock().unwrap();
        let start_ms = match inner.pending.remove(request_id) {
            Some(start) => start,
            None => {
                debug!(request_id, "unmatched response");
                return None;
            }
        };
        let duration = end_ms - start_ms;
        inner.completed.push_back(duration);
        while inner.completed.len() > self.window {
            inner.completed.pop_front();
        }
        Some(duration)
    }

    /// Drop a pending record without completing it. Used when a send fails
    /// after registration, so the record cannot linger until eviction.
    pub fn forget(&self, request_id: &str) -> bool {
        self.inner.lock().unwrap().pending.remove(request_id).is_some()
    }

    /// Remove pending records older than `ttl_ms`. Returns how many were
    /// dropped. Completed durations are never touched here.
    pub fn evict_stale(&self, now_ms: f64, ttl_ms: f64) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.pending.len();
        inner.pending.retain(|_, start| now_ms - *start <= ttl_ms);
        let removed = before - inner.pending.len();
        if removed > 0 {
            inner.evicted += removed as u64;
            debug!(removed, "evicted stale latency records");
        }
        removed
    }

    /// Frames sent but not yet answered.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    /// Total pending records dropped by eviction since construction. Together
    /// with the completed count this gives an implicit timeout rate.
    pub fn evicted_total(&self) -> u64 {
        self.inner.lock().unwrap().evicted
    }

    /// Compute order statistics over the completed window.
    ///
    /// Returns `None` when no round trip has completed yet.
    pub fn stats(&self) -> Option<LatencyStats> {
        let inner = self.inner.lock().unwrap();
        if inner.completed.is_empty() {
            return None;
        }

        let mut sorted: Vec<f64> = inner.completed.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let recent: Vec<f64> = inner
            .completed
            .iter()
            .copied()
            .skip(inner.completed.len().saturating_sub(RECENT_DISPLAY))
            .collect();

        Some(LatencyStats {
            count: n,
            min: sorted[0],
            max: sorted[n - 1],
            mean,
            median: sorted[n / 2],
            p95: sorted[(0.95 * n as f64) as usize],
            recent,
        })
    }
}
