//! Frame sources for the kiosk camera
//!
//! This module provides a common trait for everything that can produce
//! frames, so the capture loop does not care whether frames come from a
//! file-drop directory or a scripted mock.
//!
//! # Implementations
//!
//! - [`DirectorySource`] - Replays image files from a directory
//! - [`MockFrameSource`] - Scripted frames and read failures for tests
//!
//! # Contract
//!
//! `open` fails with [`crate::error::KioskError::DeviceUnavailable`]; `read_frame` fails
//! with [`crate::error::KioskError::ReadFailed`] for transient problems, in which case the
//! device stays open and the caller retries after a short pause.

pub mod directory;
pub mod mock_source;

pub use directory::DirectorySource;
pub use mock_source::{MockFrameSource, MockSourceProbe, MockStep};

use crate::config::{CameraConfig, SourceConfig};
use crate::error::Result;
use crate::types::Frame;

/// Unified interface for capture devices
///
/// Implementations must be `Send` so the capture loop can own them on its
/// own thread.
pub trait FrameSource: Send {
    /// Human readable device name for logs and the status bar
    fn name(&self) -> String;

    /// Open the device
    fn open(&mut self) -> Result<()>;

    /// Read the next frame
    ///
    /// `Ok(None)` means the device is open but has nothing new yet.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the device. Safe to call when already closed.
    fn close(&mut self);

    /// Whether the device is currently open
    fn is_open(&self) -> bool;
}

/// Build the source described by the configuration
pub fn source_from_config(config: &CameraConfig) -> Box<dyn FrameSource> {
    match &config.source {
        SourceConfig::Directory { path, loop_frames } => {
            Box::new(DirectorySource::new(path.clone()).looping(*loop_frames))
        }
        SourceConfig::Mock => Box::new(MockFrameSource::blank(640, 480)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_source_from_config() {
        let mut config = CameraConfig::default();
        config.source = SourceConfig::Mock;
        let source = source_from_config(&config);
        assert_eq!(source.name(), "mock");
        assert!(!source.is_open());

        config.source = SourceConfig::Directory {
            path: PathBuf::from("/tmp/haajar-frames"),
            loop_frames: true,
        };
        let source = source_from_config(&config);
        assert!(source.name().contains("haajar-frames"));
    }
}
