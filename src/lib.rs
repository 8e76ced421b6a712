//! # Haajar Kiosk: lab attendance by card scan
//!
//! A kiosk watches a camera feed, decodes the QR code on each student's
//! identity card and records a check-in or check-out against the active lab
//! session. Attendance switches from check-in to check-out a fixed grace
//! period after the session starts.
//!
//! ## Architecture
//!
//! - **Capture loop** ([`kiosk::CaptureWorker`]): owns the [`capture::FrameSource`]
//!   on a dedicated thread, decodes frames ([`decoder`]) and drops repeated
//!   reads ([`scanner`])
//! - **Scheduling** ([`schedule`]): check-in/check-out mode as a pure function
//!   of the session start and the wall clock, republished on a timer
//! - **Persistence** ([`kiosk::PersistenceWorker`]): one tokio task per
//!   accepted scan, one store transaction per task ([`store`])
//! - **Display** ([`frontend`]): eframe/egui, fed by crossbeam channels and
//!   the single-slot [`kiosk::FeedbackChannel`]
//!
//! ## Configuration
//!
//! Settings live in `kiosk.toml` under the platform data directory
//! (`dev.haajar.kiosk`), or wherever `HAAJAR_KIOSK_CONFIG` points:
//!
//! - **Linux**: `~/.local/share/dev.haajar.kiosk/`
//! - **macOS**: `~/Library/Application Support/dev.haajar.kiosk/`
//! - **Windows**: `%APPDATA%\dev.haajar.kiosk\`

pub mod capture;
pub mod config;
pub mod decoder;
pub mod error;
pub mod frontend;
pub mod kiosk;
pub mod scanner;
pub mod schedule;
pub mod store;
pub mod types;

pub use config::{AppState, KioskConfig};
pub use error::{KioskError, Result};
pub use frontend::KioskApp;
pub use kiosk::{KioskBackend, KioskCommand, KioskHandle, KioskMessage};
pub use store::AttendanceStore;
pub use types::{AttendanceMode, ModeState, ScanOutcome, ScanReport, SessionInfo};
