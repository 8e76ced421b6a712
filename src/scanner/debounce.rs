//! Per-payload suppression window

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Remembers when each payload was last accepted
///
/// Scoped to one kiosk session. The key space is the set of distinct cards
/// scanned, so the map is not pruned.
#[derive(Debug)]
pub struct ScanDebouncer {
    window: Duration,
    last_accepted: Mutex<HashMap<String, Instant>>,
}

impl ScanDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Accept `payload` at `now` unless it was accepted less than one window ago
    ///
    /// A rejected call leaves the stored timestamp untouched, so a card held
    /// in place is re-accepted once per window rather than never.
    pub fn accept(&self, payload: &str, now: Instant) -> bool {
        let mut map = self
            .last_accepted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(last) = map.get(payload) {
            if now.saturating_duration_since(*last) < self.window {
                return false;
            }
        }
        map.insert(payload.to_string(), now);
        true
    }

    /// Number of distinct payloads seen
    pub fn len(&self) -> usize {
        self.last_accepted
            .lock()
            .map(|m| m.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything, e.g. when the active session changes
    pub fn clear(&self) {
        self.last_accepted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}
