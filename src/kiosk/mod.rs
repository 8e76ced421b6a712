//! Kiosk backend: the capture loop and its bridge to the display
//!
//! The capture loop runs on its own thread and owns the frame source. The
//! display talks to it through crossbeam channels and reads three pieces of
//! shared state directly:
//!
//! - [`FrameSlot`] - the latest preview frame (last write wins)
//! - [`FeedbackChannel`] - the scan overlay and status line
//! - a `tokio::sync::watch` receiver of [`ModeState`], fed by the mode ticker
//!
//! Accepted scans are handed to the [`PersistenceWorker`], which resolves and
//! writes each one on its own tokio task.
//!
//! # Example
//!
//! ```ignore
//! let (backend, handle) = KioskBackend::new(config, store, runtime.handle().clone(), source, session);
//! std::thread::spawn(move || backend.run());
//!
//! handle.start_capture();
//! for msg in handle.drain() {
//!     if let KioskMessage::ScanResolved(report) = msg {
//!         println!("{}", report.message);
//!     }
//! }
//! ```

pub mod feedback;
pub mod notify;
pub mod persistence;
pub mod resolver;
pub mod worker;

pub use feedback::{FeedbackChannel, Overlay};
pub use notify::{notifier_from_config, Notifier, SilentNotifier, TerminalBell};
pub use persistence::PersistenceWorker;
pub use resolver::{decide, AttendanceResolver, Decision, Rejection, Resolution};
pub use worker::CaptureWorker;

use crate::capture::FrameSource;
use crate::config::KioskConfig;
use crate::decoder::DecoderChain;
use crate::schedule::{Clock, ModeScheduler, SharedSchedule, SystemClock};
use crate::store::AttendanceStore;
use crate::types::{
    CaptureStats, CaptureStatus, Frame, ModeState, ScanReport, SessionInfo, SessionSummary,
};
use chrono::NaiveDateTime;
use crossbeam_channel::{bounded, Receiver, Sender};
use image::GrayImage;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Message sent from the display to the capture loop
#[derive(Debug, Clone)]
pub enum KioskCommand {
    /// Open the frame source and start scanning
    StartCapture,
    /// Stop scanning and release the frame source
    StopCapture,
    /// Make another session active
    SwitchSession(i64),
    /// Operator-confirmed check-in with a reason
    LateCheckIn {
        lookup_key: String,
        justification: String,
    },
    /// Ask for the active sessions (answered with `Sessions`)
    ListSessions,
    /// Ask for the headcount (answered with `Summary`)
    RequestSummary,
    /// Stop the loop
    Shutdown,
}

/// Message sent from the capture loop to the display
#[derive(Debug, Clone)]
pub enum KioskMessage {
    CaptureStatus(CaptureStatus),
    SessionChanged(SessionInfo),
    Sessions(Vec<SessionInfo>),
    Summary(SessionSummary),
    Stats(CaptureStats),
    /// A scan or late check-in finished
    ScanResolved(ScanReport),
    /// Scheduled end passed; scanning is closed for this session
    SessionEnded,
    Error(String),
    Shutdown,
}

/// Downscaled copy of the latest frame for display
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub sequence: u64,
    pub image: GrayImage,
    /// Preview pixels per source pixel, for mapping overlay regions
    pub scale: f32,
}

impl PreviewFrame {
    /// Shrink `frame` so its longer side is at most `max_side`
    pub fn from_frame(frame: &Frame, max_side: u32) -> Self {
        let (w, h) = (frame.width(), frame.height());
        let longest = w.max(h);
        if max_side == 0 || longest <= max_side {
            return Self {
                sequence: frame.sequence,
                image: frame.image.clone(),
                scale: 1.0,
            };
        }

        let scale = max_side as f32 / longest as f32;
        let nw = ((w as f32 * scale).round() as u32).max(1);
        let nh = ((h as f32 * scale).round() as u32).max(1);
        Self {
            sequence: frame.sequence,
            image: image::imageops::thumbnail(&frame.image, nw, nh),
            scale,
        }
    }
}

/// Latest preview frame, shared by clones
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
    inner: Arc<Mutex<Option<PreviewFrame>>>,
}

impl FrameSlot {
    pub fn put(&self, frame: PreviewFrame) {
        *self.inner.lock().unwrap_or_else(|p| p.into_inner()) = Some(frame);
    }

    /// The stored frame if it is newer than `seen`
    pub fn newer_than(&self, seen: Option<u64>) -> Option<PreviewFrame> {
        let slot = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        match (slot.as_ref(), seen) {
            (Some(f), Some(seen)) if f.sequence <= seen => None,
            (Some(f), _) => Some(f.clone()),
            (None, _) => None,
        }
    }

    pub fn clear(&self) {
        *self.inner.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }
}

/// Display-side handle to the capture loop
pub struct KioskHandle {
    /// Receiver for loop messages
    pub receiver: Receiver<KioskMessage>,
    /// Sender for commands to the loop
    pub command_sender: Sender<KioskCommand>,
    pub frames: FrameSlot,
    pub feedback: FeedbackChannel,
    pub mode: watch::Receiver<ModeState>,
}

impl KioskHandle {
    pub fn try_recv(&self) -> Option<KioskMessage> {
        self.receiver.try_recv().ok()
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<KioskMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.receiver.try_recv() {
            messages.push(msg);
        }
        messages
    }

    pub fn send_command(&self, cmd: KioskCommand) -> bool {
        self.command_sender.send(cmd).is_ok()
    }

    pub fn start_capture(&self) {
        let _ = self.command_sender.send(KioskCommand::StartCapture);
    }

    pub fn stop_capture(&self) {
        let _ = self.command_sender.send(KioskCommand::StopCapture);
    }

    pub fn switch_session(&self, id: i64) {
        let _ = self.command_sender.send(KioskCommand::SwitchSession(id));
    }

    pub fn late_check_in(&self, lookup_key: impl Into<String>, justification: impl Into<String>) {
        let _ = self.command_sender.send(KioskCommand::LateCheckIn {
            lookup_key: lookup_key.into(),
            justification: justification.into(),
        });
    }

    pub fn list_sessions(&self) {
        let _ = self.command_sender.send(KioskCommand::ListSessions);
    }

    pub fn request_summary(&self) {
        let _ = self.command_sender.send(KioskCommand::RequestSummary);
    }

    pub fn shutdown(&self) {
        let _ = self.command_sender.send(KioskCommand::Shutdown);
    }

    /// Latest published mode state
    pub fn mode_state(&self) -> ModeState {
        *self.mode.borrow()
    }
}

/// The kiosk capture loop, ready to run on its own thread
pub struct KioskBackend {
    config: KioskConfig,
    store: AttendanceStore,
    runtime: tokio::runtime::Handle,
    source: Box<dyn FrameSource>,
    session: SessionInfo,
    decoder: DecoderChain,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    schedule: SharedSchedule,
    kiosk_started: NaiveDateTime,
    command_receiver: Receiver<KioskCommand>,
    message_sender: Sender<KioskMessage>,
    frames: FrameSlot,
    feedback: FeedbackChannel,
    mode_tx: watch::Sender<ModeState>,
    running: Arc<AtomicBool>,
}

impl KioskBackend {
    /// Create the backend and its display handle for `session`
    pub fn new(
        config: KioskConfig,
        store: AttendanceStore,
        runtime: tokio::runtime::Handle,
        source: Box<dyn FrameSource>,
        session: SessionInfo,
    ) -> (Self, KioskHandle) {
        let (cmd_tx, cmd_rx) = bounded(256);
        let (msg_tx, msg_rx) = bounded(1024);

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let kiosk_started = clock.now();
        let scheduler =
            ModeScheduler::for_session(&session, config.scanning.grace_period(), kiosk_started);
        let (mode_tx, mode_rx) = watch::channel(scheduler.state(kiosk_started));

        let feedback = FeedbackChannel::new(config.scanning.overlay_ttl());
        let frames = FrameSlot::default();
        let notifier = notifier_from_config(&config.ui);

        let backend = Self {
            config,
            store,
            runtime,
            source,
            session,
            decoder: DecoderChain::default(),
            clock,
            notifier,
            schedule: SharedSchedule::new(scheduler),
            kiosk_started,
            command_receiver: cmd_rx,
            message_sender: msg_tx,
            frames: frames.clone(),
            feedback: feedback.clone(),
            mode_tx,
            running: Arc::new(AtomicBool::new(true)),
        };

        let handle = KioskHandle {
            receiver: msg_rx,
            command_sender: cmd_tx,
            frames,
            feedback,
            mode: mode_rx,
        };

        (backend, handle)
    }

    /// Replace the decoder chain
    pub fn with_decoder(mut self, decoder: DecoderChain) -> Self {
        self.decoder = decoder;
        self
    }

    /// Replace the wall clock; the schedule is rebuilt from the new clock's now
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.kiosk_started = clock.now();
        self.schedule.replace(ModeScheduler::for_session(
            &self.session,
            self.config.scanning.grace_period(),
            self.kiosk_started,
        ));
        self.mode_tx
            .send_replace(self.schedule.state(self.kiosk_started));
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Run the capture loop until shutdown
    pub fn run(self) {
        let ticker = crate::schedule::ModeTicker::spawn(
            &self.runtime,
            self.schedule.clone(),
            self.clock.clone(),
            self.config.scanning.mode_tick(),
            self.mode_tx,
        );

        let persistence = PersistenceWorker::new(
            self.runtime.clone(),
            AttendanceResolver::new(self.store.clone()),
            self.schedule.clone(),
            self.clock.clone(),
            self.feedback.clone(),
            self.notifier,
            self.session.id,
        )
        .with_messages(self.message_sender.clone());

        let mut worker = CaptureWorker::new(
            self.config,
            self.store,
            self.runtime,
            self.command_receiver,
            self.message_sender,
            self.running,
            self.source,
            self.decoder,
            persistence,
            self.schedule,
            self.clock,
            self.session,
            self.frames,
            self.feedback,
        );
        worker.run();
        ticker.stop();
    }

    /// Get a handle to stop the backend
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}
