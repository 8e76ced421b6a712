//! Mock frame source for testing and demos
//!
//! Plays back a script of frames, empty reads and transient failures.
//! Once the script is exhausted it either repeats a blank frame or reports
//! "nothing new", depending on how it was built.
//!
//! # Example
//!
//! ```ignore
//! use haajar_kiosk::capture::{MockFrameSource, MockStep};
//!
//! let source = MockFrameSource::scripted(vec![
//!     MockStep::Fail("usb hiccup".into()),
//!     MockStep::Frame(card_image),
//! ]);
//! ```

use super::FrameSource;
use crate::error::{KioskError, Result};
use crate::types::Frame;
use image::{GrayImage, Luma};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// One scripted read
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Deliver this image
    Frame(GrayImage),
    /// Device open, nothing new
    Empty,
    /// Transient read failure
    Fail(String),
}

/// Handles shared with a test so it can observe the device from outside
#[derive(Debug, Clone, Default)]
pub struct MockSourceProbe {
    open: Arc<AtomicBool>,
    opens: Arc<AtomicU64>,
    reads: Arc<AtomicU64>,
}

impl MockSourceProbe {
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

/// Scripted frame source
pub struct MockFrameSource {
    script: VecDeque<MockStep>,
    idle_frame: Option<GrayImage>,
    fail_open: bool,
    sequence: u64,
    probe: MockSourceProbe,
}

impl MockFrameSource {
    /// Play `steps` once, then report nothing new
    pub fn scripted(steps: Vec<MockStep>) -> Self {
        Self {
            script: steps.into(),
            idle_frame: None,
            fail_open: false,
            sequence: 0,
            probe: MockSourceProbe::default(),
        }
    }

    /// Endless blank frames
    pub fn blank(width: u32, height: u32) -> Self {
        Self::scripted(Vec::new()).repeat_when_done(GrayImage::from_pixel(width, height, Luma([255])))
    }

    /// Repeat `frame` after the script runs out
    pub fn repeat_when_done(mut self, frame: GrayImage) -> Self {
        self.idle_frame = Some(frame);
        self
    }

    /// Make `open` fail as if the camera were missing
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Observer handle for tests
    pub fn probe(&self) -> MockSourceProbe {
        self.probe.clone()
    }

    fn next_frame(&mut self, image: GrayImage) -> Frame {
        self.sequence += 1;
        Frame::new(self.sequence, image)
    }
}

impl FrameSource for MockFrameSource {
    fn name(&self) -> String {
        "mock".to_string()
    }

    fn open(&mut self) -> Result<()> {
        if self.fail_open {
            return Err(KioskError::DeviceUnavailable(
                "mock camera configured to fail".to_string(),
            ));
        }
        self.probe.open.store(true, Ordering::SeqCst);
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if !self.is_open() {
            return Err(KioskError::ReadFailed("source is not open".to_string()));
        }
        self.probe.reads.fetch_add(1, Ordering::SeqCst);

        match self.script.pop_front() {
            Some(MockStep::Frame(image)) => Ok(Some(self.next_frame(image))),
            Some(MockStep::Empty) => Ok(None),
            Some(MockStep::Fail(reason)) => Err(KioskError::ReadFailed(reason)),
            None => match self.idle_frame.clone() {
                Some(image) => Ok(Some(self.next_frame(image))),
                None => Ok(None),
            },
        }
    }

    fn close(&mut self) {
        self.probe.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.probe.is_open()
    }
}
