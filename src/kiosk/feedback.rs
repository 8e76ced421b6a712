//! Feedback channel between scan workers and the display
//!
//! Holds at most one overlay. Writers replace it (last write wins) and the
//! display drops it once its time-to-live has passed. The status line is
//! separate and persists until the next write.

use crate::types::{HighlightColor, Rect, ScanOutcome, ScanReport};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// What the display draws over the live frame
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub region: Option<Rect>,
    pub message: String,
    pub color: HighlightColor,
    pub outcome: ScanOutcome,
    pub expires_at: Instant,
}

impl Overlay {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct FeedbackState {
    overlay: Option<Overlay>,
    status_line: String,
    /// Bumped on every overlay write
    revision: u64,
}

/// Single-slot overlay plus status line, shared by clones
#[derive(Debug, Clone)]
pub struct FeedbackChannel {
    state: Arc<Mutex<FeedbackState>>,
    ttl: Duration,
}

impl FeedbackChannel {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(FeedbackState::default())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FeedbackState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the overlay with `report` and update the status line
    pub fn publish(&self, report: &ScanReport) {
        self.publish_at(report, Instant::now());
    }

    pub fn publish_at(&self, report: &ScanReport, now: Instant) {
        let mut state = self.lock();
        state.overlay = Some(Overlay {
            region: report.region,
            message: report.message.clone(),
            color: report.color(),
            outcome: report.outcome.clone(),
            expires_at: now + self.ttl,
        });
        state.status_line = report.message.clone();
        state.revision += 1;
    }

    /// Set the status line without touching the overlay
    pub fn set_status(&self, text: impl Into<String>) {
        self.lock().status_line = text.into();
    }

    pub fn status_line(&self) -> String {
        self.lock().status_line.clone()
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// The live overlay at `now`; an expired one is cleared
    pub fn current_overlay(&self, now: Instant) -> Option<Overlay> {
        let mut state = self.lock();
        if state.overlay.as_ref().is_some_and(|o| o.is_expired(now)) {
            state.overlay = None;
        }
        state.overlay.clone()
    }

    pub fn clear(&self) {
        self.lock().overlay = None;
    }
}
