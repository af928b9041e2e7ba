//! # Node Liveness Tracker
//!
//! In-memory mapping of node identifier to last-heartbeat time. State is
//! process-scoped: constructed at startup and lost on restart, which is
//! acceptable for a small operator-controlled fleet. Entries are never
//! evicted; stale nodes only drop out of the active count via the window
//! check.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Liveness tracking errors
#[derive(Debug, Clone, Error)]
pub enum LivenessError {
    /// Heartbeat without a node identifier
    #[error("Missing node_id")]
    MissingNodeId,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Tracks node heartbeats and process start time.
#[derive(Debug)]
pub struct LivenessTracker {
    heartbeats: RwLock<HashMap<String, DateTime<Utc>>>,
    started_at: DateTime<Utc>,
}

impl LivenessTracker {
    /// Create a tracker anchored at the current wall-clock time
    pub fn new() -> Self {
        Self {
            heartbeats: RwLock::new(HashMap::new()),
            started_at: Utc::now(),
        }
    }

    /// Record a heartbeat for `node_id`, overwriting any previous timestamp.
    ///
    /// Identifiers are caller-supplied and not validated against a fixed
    /// node list; a backward clock jump is accepted as-is.
    pub fn heartbeat(&self, node_id: &str) -> Result<DateTime<Utc>, LivenessError> {
        if node_id.is_empty() {
            return Err(LivenessError::MissingNodeId);
        }

        let now = Utc::now();
        match self.heartbeats.write() {
            Ok(mut map) => {
                map.insert(node_id.to_string(), now);
                Ok(now)
            }
            Err(_) => Err(LivenessError::Internal("Lock poisoned".into())),
        }
    }

    /// Count nodes whose last heartbeat is at most `window_secs` before `now`
    pub fn active_count(&self, window_secs: u64, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::seconds(window_secs as i64);
        self.heartbeats
            .read()
            .map(|map| map.values().filter(|seen| **seen >= cutoff).count())
            .unwrap_or(0)
    }

    /// Whole seconds since the tracker was constructed
    pub fn uptime_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds()
    }
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_rejects_empty_node_id() {
        let tracker = LivenessTracker::new();
        assert!(matches!(
            tracker.heartbeat(""),
            Err(LivenessError::MissingNodeId)
        ));
        assert_eq!(tracker.active_count(60, Utc::now()), 0);
    }

    #[test]
    fn test_active_count_within_window() {
        let tracker = LivenessTracker::new();
        tracker.heartbeat("node-1").unwrap();
        tracker.heartbeat("node-2").unwrap();

        assert_eq!(tracker.active_count(60, Utc::now()), 2);
    }

    #[test]
    fn test_stale_heartbeat_excluded() {
        let tracker = LivenessTracker::new();
        tracker.heartbeat("node-1").unwrap();

        // Pretend two minutes pass without another heartbeat
        let later = Utc::now() + Duration::seconds(120);
        assert_eq!(tracker.active_count(60, later), 0);
    }

    #[test]
    fn test_reheartbeat_moves_node_back_above_cutoff() {
        let tracker = LivenessTracker::new();
        tracker.heartbeat("node-1").unwrap();

        let later = Utc::now() + Duration::seconds(120);
        assert_eq!(tracker.active_count(60, later), 0);

        let last_seen = tracker.heartbeat("node-1").unwrap();
        assert_eq!(tracker.active_count(60, Utc::now()), 1);
        assert!(last_seen <= Utc::now());
    }

    #[test]
    fn test_uptime_is_non_negative() {
        let tracker = LivenessTracker::new();
        assert!(tracker.uptime_seconds(Utc::now()) >= 0);
    }
}
