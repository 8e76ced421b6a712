//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use chrono::{NaiveDate, NaiveDateTime};
use haajar_kiosk::kiosk::KioskHandle;
use haajar_kiosk::KioskMessage;
use std::time::{Duration, Instant};

/// Lab day used throughout the tests
pub fn lab_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

/// Wall-clock time on the lab day
pub fn ts(h: u32, m: u32) -> NaiveDateTime {
    lab_day().and_hms_opt(h, m, 0).unwrap()
}

/// Default wait for messages from the capture thread
pub fn test_timeout() -> Duration {
    Duration::from_secs(3)
}

/// Poll the handle until a message matches or the timeout passes
pub fn wait_for<F>(handle: &KioskHandle, timeout: Duration, mut pred: F) -> Option<KioskMessage>
where
    F: FnMut(&KioskMessage) -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        while let Some(msg) = handle.try_recv() {
            if pred(&msg) {
                return Some(msg);
            }
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    None
}

/// Everything currently queued on the handle
pub fn drain_for(handle: &KioskHandle, period: Duration) -> Vec<KioskMessage> {
    let deadline = Instant::now() + period;
    let mut out = Vec::new();
    while Instant::now() < deadline {
        out.extend(handle.drain());
        std::thread::sleep(Duration::from_millis(10));
    }
    out
}
