//! Capture loop
//!
//! Runs on a dedicated thread and owns the frame source. Each iteration:
//!
//! - **Commands**: drains pending display commands (start, stop, switch, ...)
//! - **Capture**: reads one frame; transient read failures back off and retry
//!   without closing the device
//! - **Decode**: runs the decoder chain and publishes a preview frame
//! - **Debounce**: drops repeats of the same payload inside the window
//! - **Dispatch**: hands every accepted scan to the persistence worker
//!
//! Store access never happens on this thread except for a session switch,
//! which is an explicit operator action.

use super::{FeedbackChannel, FrameSlot, KioskCommand, KioskMessage, PersistenceWorker, PreviewFrame};
use crate::capture::FrameSource;
use crate::config::KioskConfig;
use crate::decoder::{CodeDecoder, DecoderChain};
use crate::error::{KioskError, Result};
use crate::scanner::ScanDebouncer;
use crate::schedule::{Clock, ModeScheduler, SharedSchedule};
use crate::store::AttendanceStore;
use crate::types::{
    CaptureStats, CaptureStatus, Frame, ScanEvent, ScanOutcome, ScanReport, SessionInfo,
};
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Loop period while not scanning
const IDLE_INTERVAL: Duration = Duration::from_millis(50);
/// How often stats go to the display while scanning
const STATS_INTERVAL: Duration = Duration::from_millis(500);
/// How long shutdown waits for in-flight scans
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The capture loop state
pub struct CaptureWorker {
    config: KioskConfig,
    store: AttendanceStore,
    runtime: tokio::runtime::Handle,
    command_rx: Receiver<KioskCommand>,
    message_tx: Sender<KioskMessage>,
    running: Arc<AtomicBool>,
    source: Box<dyn FrameSource>,
    decoder: DecoderChain,
    debouncer: ScanDebouncer,
    persistence: PersistenceWorker,
    schedule: SharedSchedule,
    clock: Arc<dyn Clock>,
    session: SessionInfo,
    frames: FrameSlot,
    feedback: FeedbackChannel,
    status: CaptureStatus,
    stats: CaptureStats,
    last_tick: Instant,
    last_stats_time: Instant,
}

impl CaptureWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: KioskConfig,
        store: AttendanceStore,
        runtime: tokio::runtime::Handle,
        command_rx: Receiver<KioskCommand>,
        message_tx: Sender<KioskMessage>,
        running: Arc<AtomicBool>,
        source: Box<dyn FrameSource>,
        decoder: DecoderChain,
        persistence: PersistenceWorker,
        schedule: SharedSchedule,
        clock: Arc<dyn Clock>,
        session: SessionInfo,
        frames: FrameSlot,
        feedback: FeedbackChannel,
    ) -> Self {
        let debouncer = ScanDebouncer::new(config.scanning.debounce_window());
        Self {
            config,
            store,
            runtime,
            command_rx,
            message_tx,
            running,
            source,
            decoder,
            debouncer,
            persistence,
            schedule,
            clock,
            session,
            frames,
            feedback,
            status: CaptureStatus::Idle,
            stats: CaptureStats::default(),
            last_tick: Instant::now(),
            last_stats_time: Instant::now(),
        }
    }

    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Run until shutdown or until the display drops its handle
    pub fn run(&mut self) {
        tracing::info!(session_id = self.session.id, "Capture loop started");
        let _ = self.post(KioskMessage::SessionChanged(self.session.clone()));
        self.feedback.set_status(format!("Ready: {}", self.session.headline()));

        while self.running.load(Ordering::SeqCst) {
            self.process_commands();

            if self.status == CaptureStatus::Scanning {
                self.capture_once();

                if self.last_stats_time.elapsed() >= STATS_INTERVAL {
                    self.send_stats();
                    self.last_stats_time = Instant::now();
                }
            }

            self.rate_limit();
        }

        self.source.close();
        if !self.persistence.wait_idle(DRAIN_TIMEOUT) {
            tracing::warn!(
                in_flight = self.persistence.in_flight(),
                "Shutting down with scans still in flight"
            );
        }
        let _ = self.post(KioskMessage::Shutdown);
        tracing::info!("Capture loop stopped");
    }

    fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    /// Handle a single command
    pub fn handle_command(&mut self, cmd: KioskCommand) {
        match cmd {
            KioskCommand::StartCapture => self.start_capture(),
            KioskCommand::StopCapture => self.stop_capture(),
            KioskCommand::SwitchSession(id) => self.switch_session(id),
            KioskCommand::LateCheckIn {
                lookup_key,
                justification,
            } => {
                // reported through the feedback channel when done
                drop(self.persistence.late_check_in(lookup_key, justification));
            }
            KioskCommand::ListSessions => self.list_sessions(),
            KioskCommand::RequestSummary => self.request_summary(),
            KioskCommand::Shutdown => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    fn start_capture(&mut self) {
        match self.status {
            CaptureStatus::Scanning | CaptureStatus::Opening => {
                let err = KioskError::AlreadyCapturing;
                tracing::warn!("{}", err);
                self.send_error(err.to_string());
                return;
            }
            CaptureStatus::Ended => {
                self.send_error("Session ended. Switch session to scan again.".to_string());
                return;
            }
            CaptureStatus::Idle | CaptureStatus::Error => {}
        }

        if self.schedule.state(self.clock.now()).session_ended {
            self.end_session();
            return;
        }

        self.update_status(CaptureStatus::Opening);
        match self.source.open() {
            Ok(()) => {
                self.stats = CaptureStats::default();
                self.update_status(CaptureStatus::Scanning);
                self.feedback.set_status(format!("Scanning: {}", self.session.headline()));
                tracing::info!(source = %self.source.name(), "Capture started");
            }
            Err(e) => {
                tracing::error!(source = %self.source.name(), "Failed to start capture: {}", e);
                self.update_status(CaptureStatus::Error);
                self.feedback.set_status(e.to_string());
                self.send_error(e.to_string());
            }
        }
    }

    fn stop_capture(&mut self) {
        if self.source.is_open() {
            self.source.close();
        }
        if self.status != CaptureStatus::Ended {
            self.update_status(CaptureStatus::Idle);
            self.feedback.set_status("Scanning stopped");
        }
        tracing::info!("Capture stopped");
    }

    fn switch_session(&mut self, id: i64) {
        let session = match self.runtime.block_on(self.store.load_session(id)) {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(session_id = id, "Cannot switch session: {}", e);
                self.send_error(e.to_string());
                return;
            }
        };

        let now = self.clock.now();
        self.schedule.replace(ModeScheduler::for_session(
            &session,
            self.config.scanning.grace_period(),
            now,
        ));
        self.persistence.set_session(session.id);
        self.debouncer.clear();
        self.feedback.clear();
        self.feedback.set_status(format!("Session: {}", session.headline()));

        if self.status == CaptureStatus::Ended {
            self.update_status(CaptureStatus::Idle);
        }

        tracing::info!(session_id = session.id, "Active session changed");
        self.session = session.clone();
        let _ = self.post(KioskMessage::SessionChanged(session));
        self.request_summary();
    }

    fn list_sessions(&self) {
        let store = self.store.clone();
        let tx = self.message_tx.clone();
        self.runtime.spawn(async move {
            let msg = match store.list_active_sessions().await {
                Ok(sessions) => KioskMessage::Sessions(sessions),
                Err(e) => {
                    tracing::error!("Failed to list sessions: {}", e);
                    KioskMessage::Error(e.to_string())
                }
            };
            let _ = post(&tx, msg);
        });
    }

    fn request_summary(&self) {
        let store = self.store.clone();
        let tx = self.message_tx.clone();
        let session_id = self.session.id;
        self.runtime.spawn(async move {
            match store.session_summary(session_id).await {
                Ok(summary) => {
                    let _ = post(&tx, KioskMessage::Summary(summary));
                }
                Err(e) => tracing::warn!(session_id, "Failed to load summary: {}", e),
            }
        });
    }

    /// One capture iteration
    pub fn capture_once(&mut self) {
        if self.schedule.state(self.clock.now()).session_ended {
            self.end_session();
            return;
        }

        match self.source.read_frame() {
            Ok(Some(frame)) => {
                self.stats.frames_read += 1;
                self.handle_frame(frame);
            }
            Ok(None) => {}
            Err(e) if e.is_transient() => {
                self.stats.read_failures += 1;
                tracing::debug!("Frame read failed, retrying: {}", e);
                std::thread::sleep(self.config.camera.read_backoff());
            }
            Err(e) => {
                tracing::error!("Capture device failed: {}", e);
                self.source.close();
                self.update_status(CaptureStatus::Error);
                self.feedback.set_status(e.to_string());
                self.send_error(e.to_string());
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        let codes = self.decoder.decode(&frame);
        self.frames.put(PreviewFrame::from_frame(
            &frame,
            self.config.camera.display_max_side,
        ));

        for code in codes {
            self.stats.codes_decoded += 1;
            let event = ScanEvent {
                payload: self.config.scanning.normalize_payload(&code.payload),
                region: code.region,
                captured_at: frame.captured_at,
            };
            if event.payload.is_empty() {
                continue;
            }

            if self.debouncer.accept(&event.payload, event.captured_at) {
                self.stats.scans_accepted += 1;
                tracing::info!(payload = %event.payload, frame = frame.sequence, "Scan accepted");
                drop(self.persistence.process(event.payload, event.region));
            } else {
                self.stats.scans_suppressed += 1;
                tracing::trace!(payload = %event.payload, "Scan suppressed");
            }
        }
    }

    /// Stop scanning for good and tell the display
    fn end_session(&mut self) {
        if self.status == CaptureStatus::Ended {
            return;
        }
        tracing::info!(session_id = self.session.id, "Session ended; scanning closed");
        self.source.close();
        self.update_status(CaptureStatus::Ended);

        let report = ScanReport::new("", None, ScanOutcome::SessionEnded, None);
        self.feedback.publish(&report);
        let _ = self.post(KioskMessage::SessionEnded);
    }

    fn rate_limit(&mut self) {
        let interval = if self.status == CaptureStatus::Scanning {
            self.config.camera.frame_interval()
        } else {
            IDLE_INTERVAL
        };
        let elapsed = self.last_tick.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
        self.last_tick = Instant::now();
    }

    fn update_status(&mut self, status: CaptureStatus) {
        self.status = status;
        let _ = self.post(KioskMessage::CaptureStatus(status));
    }

    fn send_stats(&self) {
        let _ = post(&self.message_tx, KioskMessage::Stats(self.stats.clone()));
    }

    fn send_error(&self, msg: String) {
        let _ = self.post(KioskMessage::Error(msg));
    }

    /// Queue a message for the display without blocking the capture thread
    pub fn post(&self, msg: KioskMessage) -> Result<()> {
        post(&self.message_tx, msg)
    }
}

/// Non-blocking send to the display; a full or closed queue drops the message
fn post(tx: &Sender<KioskMessage>, msg: KioskMessage) -> Result<()> {
    match tx.try_send(msg) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(msg)) => {
            tracing::debug!("Display queue full, dropped {:?}", msg);
            Err(KioskError::Channel("display queue full".to_string()))
        }
        Err(TrySendError::Disconnected(_)) => {
            Err(KioskError::Channel("display disconnected".to_string()))
        }
    }
}
