//! Audible scan feedback
//!
//! Best effort only. A kiosk without a speaker behaves identically.

use crate::config::UiConfig;
use std::io::Write;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
pub trait Notifier: Send + Sync {
    /// Attendance was written
    fn success(&self);
    /// Anything else
    fn failure(&self);
}

/// Rings the terminal bell on stderr: once for success, twice for failure
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl TerminalBell {
    fn ring(times: usize) {
        let mut err = std::io::stderr().lock();
        for _ in 0..times {
            let _ = err.write_all(b"\x07");
        }
        let _ = err.flush();
    }
}

impl Notifier for TerminalBell {
    fn success(&self) {
        Self::ring(1);
    }

    fn failure(&self) {
        Self::ring(2);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn success(&self) {}
    fn failure(&self) {}
}

pub fn notifier_from_config(ui: &UiConfig) -> Arc<dyn Notifier> {
    if ui.sound_enabled {
        Arc::new(TerminalBell)
    } else {
        Arc::new(SilentNotifier)
    }
}
