//! Core data types for the Haajar kiosk
//!
//! This module contains the values that flow through the scanning pipeline,
//! from captured frames to the outcome shown on the display.
//!
//! # Main Types
//!
//! - [`Frame`] - A single greyscale image from the capture source
//! - [`Rect`] - Detection region in frame coordinates
//! - [`ScanEvent`] - A decoded payload with its region and capture time
//! - [`AttendanceMode`] / [`ModeState`] - Check-in vs check-out window
//! - [`ScanOutcome`] / [`ScanReport`] - Result of resolving one scan
//! - [`SessionInfo`] / [`Participant`] - Read-only registry metadata

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Axis-aligned region in the coordinate space of the frame it was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Bounding box of a set of corner points, clamped to the frame
    pub fn bounding(points: &[(i32, i32)], frame_width: u32, frame_height: u32) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let clamp_x = |v: i32| v.clamp(0, frame_width as i32) as u32;
        let clamp_y = |v: i32| v.clamp(0, frame_height as i32) as u32;

        let min_x = points.iter().map(|p| clamp_x(p.0)).min().unwrap_or(0);
        let max_x = points.iter().map(|p| clamp_x(p.0)).max().unwrap_or(0);
        let min_y = points.iter().map(|p| clamp_y(p.1)).min().unwrap_or(0);
        let max_y = points.iter().map(|p| clamp_y(p.1)).max().unwrap_or(0);

        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Right edge (exclusive)
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive)
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether two regions overlap
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Scale the region, e.g. from capture to display resolution
    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(
            (self.x as f32 * factor) as u32,
            (self.y as f32 * factor) as u32,
            (self.width as f32 * factor) as u32,
            (self.height as f32 * factor) as u32,
        )
    }
}

/// A captured greyscale frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic frame number assigned by the source
    pub sequence: u64,
    /// When the frame was read from the device
    pub captured_at: Instant,
    /// Pixel data
    pub image: GrayImage,
}

impl Frame {
    /// Wrap an image as a frame captured now
    pub fn new(sequence: u64, image: GrayImage) -> Self {
        Self {
            sequence,
            captured_at: Instant::now(),
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Polarity-inverted copy of this frame
    pub fn inverted(&self) -> Frame {
        let mut image = self.image.clone();
        image::imageops::invert(&mut image);
        Frame {
            sequence: self.sequence,
            captured_at: self.captured_at,
            image,
        }
    }
}

/// A decoded payload from a single frame
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEvent {
    pub payload: String,
    pub region: Rect,
    pub captured_at: Instant,
}

/// Which kind of event a scan records right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AttendanceMode {
    #[default]
    CheckIn,
    CheckOut,
}

impl std::fmt::Display for AttendanceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendanceMode::CheckIn => write!(f, "CHECK-IN"),
            AttendanceMode::CheckOut => write!(f, "CHECK-OUT"),
        }
    }
}

/// Derived mode snapshot, recomputed from wall-clock time on every query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeState {
    pub mode: AttendanceMode,
    pub cutover: NaiveDateTime,
    /// Time left until cutover, never negative
    pub remaining: TimeDelta,
    /// Past the scheduled end of the session
    pub session_ended: bool,
    /// Session timing was missing and the cutover was derived from kiosk start
    pub degraded: bool,
}

impl ModeState {
    /// Countdown label as `MM:SS` (hours folded into minutes)
    pub fn countdown_label(&self) -> String {
        let secs = self.remaining.num_seconds().max(0);
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

/// Highlight class for a scan outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightColor {
    Success,
    Caution,
    Error,
}

impl HighlightColor {
    /// RGB used by the display
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            HighlightColor::Success => [46, 204, 113],
            HighlightColor::Caution => [241, 196, 15],
            HighlightColor::Error => [231, 76, 60],
        }
    }
}

/// Result of resolving one accepted scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A new open record was created
    CheckedIn,
    /// An open record already exists; nothing written
    AlreadyCheckedIn,
    /// The open record was closed
    CheckedOut,
    /// Check-out window but no open record; operator may use late check-in
    NotCheckedIn,
    /// Operator-confirmed late check-in was recorded
    LateCheckedIn,
    /// Payload does not match any participant
    UnknownCode,
    /// Scheduled end time has passed
    SessionEnded,
    /// The store rejected the unit of work; nothing was kept
    StoreError(String),
}

impl ScanOutcome {
    pub fn color(&self) -> HighlightColor {
        match self {
            ScanOutcome::CheckedIn | ScanOutcome::CheckedOut | ScanOutcome::LateCheckedIn => {
                HighlightColor::Success
            }
            ScanOutcome::AlreadyCheckedIn | ScanOutcome::NotCheckedIn => HighlightColor::Caution,
            ScanOutcome::UnknownCode | ScanOutcome::SessionEnded | ScanOutcome::StoreError(_) => {
                HighlightColor::Error
            }
        }
    }

    /// Whether the scan changed attendance
    pub fn is_success(&self) -> bool {
        self.color() == HighlightColor::Success
    }

    /// Short operator-facing message
    pub fn message(&self, who: Option<&str>, payload: &str) -> String {
        let who = who.unwrap_or(payload);
        match self {
            ScanOutcome::CheckedIn => format!("Checked IN: {}", who),
            ScanOutcome::AlreadyCheckedIn => format!("Already checked in: {}", who),
            ScanOutcome::CheckedOut => format!("Checked OUT: {}", who),
            ScanOutcome::NotCheckedIn => {
                format!("{} has not checked in. Use late check-in.", who)
            }
            ScanOutcome::LateCheckedIn => format!("Late check-in recorded: {}", who),
            ScanOutcome::UnknownCode => format!("Unknown code: {}", payload),
            ScanOutcome::SessionEnded => "Session ended. Scanning closed.".to_string(),
            ScanOutcome::StoreError(_) => "Could not save attendance. Please rescan.".to_string(),
        }
    }
}

impl std::fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanOutcome::CheckedIn => write!(f, "CheckedIn"),
            ScanOutcome::AlreadyCheckedIn => write!(f, "AlreadyCheckedIn"),
            ScanOutcome::CheckedOut => write!(f, "CheckedOut"),
            ScanOutcome::NotCheckedIn => write!(f, "NotCheckedIn"),
            ScanOutcome::LateCheckedIn => write!(f, "LateCheckedIn"),
            ScanOutcome::UnknownCode => write!(f, "UnknownCode"),
            ScanOutcome::SessionEnded => write!(f, "SessionEnded"),
            ScanOutcome::StoreError(e) => write!(f, "StoreError({})", e),
        }
    }
}

/// A resolved scan, ready for the feedback channel
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub payload: String,
    pub participant: Option<String>,
    pub outcome: ScanOutcome,
    pub message: String,
    /// Detection region; `None` for operator actions such as late check-in
    pub region: Option<Rect>,
}

impl ScanReport {
    pub fn new(
        payload: impl Into<String>,
        participant: Option<String>,
        outcome: ScanOutcome,
        region: Option<Rect>,
    ) -> Self {
        let payload = payload.into();
        let message = outcome.message(participant.as_deref(), &payload);
        Self {
            payload,
            participant,
            outcome,
            message,
            region,
        }
    }

    pub fn color(&self) -> HighlightColor {
        self.outcome.color()
    }
}

/// Session metadata supplied to the kiosk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: i64,
    pub subject_title: String,
    pub faculty_name: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub is_active: bool,
}

impl SessionInfo {
    /// Scheduled start as a timestamp, if known
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        self.start_time.map(|t| self.date.and_time(t))
    }

    /// Scheduled end as a timestamp, if known
    pub fn ends_at(&self) -> Option<NaiveDateTime> {
        self.end_time.map(|t| self.date.and_time(t))
    }

    /// One-line header for the display
    pub fn headline(&self) -> String {
        let fmt = |t: Option<NaiveTime>| {
            t.map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|| "--:--".to_string())
        };
        format!(
            "{} | {} | {} {}-{}",
            self.subject_title,
            self.faculty_name,
            self.date.format("%Y-%m-%d"),
            fmt(self.start_time),
            fmt(self.end_time)
        )
    }
}

/// A participant known to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: i64,
    pub name: String,
    pub roll_no: Option<String>,
    pub admission_no: Option<String>,
}

/// State of the capture loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureStatus {
    /// Not capturing
    #[default]
    Idle,
    /// Opening the device
    Opening,
    /// Reading and decoding frames
    Scanning,
    /// Device could not be opened
    Error,
    /// Session ended; scanning is closed for good
    Ended,
}

impl std::fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureStatus::Idle => write!(f, "Idle"),
            CaptureStatus::Opening => write!(f, "Opening camera..."),
            CaptureStatus::Scanning => write!(f, "Scanning"),
            CaptureStatus::Error => write!(f, "Camera error"),
            CaptureStatus::Ended => write!(f, "Session ended"),
        }
    }
}

/// Counters for the capture loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames_read: u64,
    pub read_failures: u64,
    pub codes_decoded: u64,
    pub scans_accepted: u64,
    pub scans_suppressed: u64,
}

/// Headcount for the active session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Rows with a check-in time
    pub checked_in: u64,
    /// Rows that are closed
    pub checked_out: u64,
}

impl SessionSummary {
    /// Participants currently in the lab
    pub fn present(&self) -> u64 {
        self.checked_in.saturating_sub(self.checked_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_bounding_clamps() {
        let r = Rect::bounding(&[(-5, 10), (40, 12), (38, 60), (0, 58)], 32, 64);
        assert_eq!(r, Rect::new(0, 10, 32, 50));
    }

    #[test]
    fn test_rect_intersects() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(a.intersects(&Rect::new(5, 5, 10, 10)));
        assert!(!a.intersects(&Rect::new(10, 0, 5, 5)));
    }

    #[test]
    fn test_frame_inverted() {
        let img = GrayImage::from_pixel(2, 2, image::Luma([10]));
        let frame = Frame::new(7, img);
        let inv = frame.inverted();
        assert_eq!(inv.sequence, 7);
        assert_eq!(inv.image.get_pixel(1, 1).0[0], 245);
        // source untouched
        assert_eq!(frame.image.get_pixel(1, 1).0[0], 10);
    }

    #[test]
    fn test_outcome_colors() {
        assert_eq!(ScanOutcome::CheckedIn.color(), HighlightColor::Success);
        assert_eq!(ScanOutcome::AlreadyCheckedIn.color(), HighlightColor::Caution);
        assert_eq!(ScanOutcome::NotCheckedIn.color(), HighlightColor::Caution);
        assert_eq!(ScanOutcome::UnknownCode.color(), HighlightColor::Error);
        assert_eq!(
            ScanOutcome::StoreError("x".into()).color(),
            HighlightColor::Error
        );
    }

    #[test]
    fn test_report_message_falls_back_to_payload() {
        let report = ScanReport::new("ZZ999", None, ScanOutcome::UnknownCode, None);
        assert_eq!(report.message, "Unknown code: ZZ999");

        let report = ScanReport::new(
            "25MCA07",
            Some("Asha".into()),
            ScanOutcome::CheckedIn,
            None,
        );
        assert_eq!(report.message, "Checked IN: Asha");
    }

    #[test]
    fn test_countdown_label() {
        let state = ModeState {
            mode: AttendanceMode::CheckIn,
            cutover: NaiveDate::from_ymd_opt(2025, 1, 6)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap(),
            remaining: TimeDelta::seconds(14 * 60 + 5),
            session_ended: false,
            degraded: false,
        };
        assert_eq!(state.countdown_label(), "14:05");
    }

    #[test]
    fn test_session_headline() {
        let info = SessionInfo {
            id: 1,
            subject_title: "Networks Lab".into(),
            faculty_name: "Dr. Rao".into(),
            date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0),
            end_time: None,
            is_active: true,
        };
        assert_eq!(info.headline(), "Networks Lab | Dr. Rao | 2025-01-06 09:00---:--");
    }

    #[test]
    fn test_summary_present() {
        let s = SessionSummary {
            checked_in: 10,
            checked_out: 4,
        };
        assert_eq!(s.present(), 6);
    }
}
