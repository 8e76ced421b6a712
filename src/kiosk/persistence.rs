//! Per-scan units of work
//!
//! Each accepted scan is resolved and written on its own tokio task, so a
//! slow store never holds up the capture loop. The finished [`ScanReport`]
//! goes to the feedback channel, the notifier and (optionally) the display's
//! message queue. Failures are rolled back by the resolver and reported as
//! `StoreError`; nothing is retried.

use super::feedback::FeedbackChannel;
use super::notify::Notifier;
use super::resolver::AttendanceResolver;
use super::KioskMessage;
use crate::error::{KioskError, Result};
use crate::schedule::{Clock, SharedSchedule};
use crate::types::{Rect, ScanOutcome, ScanReport};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Decrements the in-flight count even if the task unwinds
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Spawns and runs resolve-then-write units of work
#[derive(Clone)]
pub struct PersistenceWorker {
    runtime: Handle,
    resolver: AttendanceResolver,
    schedule: SharedSchedule,
    clock: Arc<dyn Clock>,
    feedback: FeedbackChannel,
    notifier: Arc<dyn Notifier>,
    messages: Option<Sender<KioskMessage>>,
    session_id: Arc<AtomicI64>,
    in_flight: Arc<AtomicUsize>,
}

impl PersistenceWorker {
    pub fn new(
        runtime: Handle,
        resolver: AttendanceResolver,
        schedule: SharedSchedule,
        clock: Arc<dyn Clock>,
        feedback: FeedbackChannel,
        notifier: Arc<dyn Notifier>,
        session_id: i64,
    ) -> Self {
        Self {
            runtime,
            resolver,
            schedule,
            clock,
            feedback,
            notifier,
            messages: None,
            session_id: Arc::new(AtomicI64::new(session_id)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Also forward every report to the display
    pub fn with_messages(mut self, tx: Sender<KioskMessage>) -> Self {
        self.messages = Some(tx);
        self
    }

    pub fn session_id(&self) -> i64 {
        self.session_id.load(Ordering::SeqCst)
    }

    /// Scans spawned after this call belong to `id`
    pub fn set_session(&self, id: i64) {
        self.session_id.store(id, Ordering::SeqCst);
    }

    /// Units of work not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Block the calling thread until nothing is in flight or `timeout` passes.
    /// Returns whether the worker went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }

    /// Resolve and persist one accepted scan in the background
    pub fn process(&self, payload: String, region: Rect) -> JoinHandle<ScanReport> {
        let worker = self.clone();
        let session_id = self.session_id();
        let guard = InFlight::enter(&self.in_flight);
        self.runtime.spawn(async move {
            let _guard = guard;
            worker.run_scan(session_id, &payload, Some(region)).await
        })
    }

    /// The unit of work behind [`process`](Self::process)
    pub async fn run_scan(&self, session_id: i64, payload: &str, region: Option<Rect>) -> ScanReport {
        let now = self.clock.now();
        let state = self.schedule.state(now);

        let report = match self.resolver.resolve(session_id, &state, payload, now).await {
            Ok(resolution) => ScanReport::new(
                payload,
                resolution.participant.map(|p| p.name),
                resolution.outcome,
                region,
            ),
            Err(e) => {
                tracing::error!(payload, session_id, "Scan could not be saved: {}", e);
                ScanReport::new(payload, None, ScanOutcome::StoreError(e.to_string()), region)
            }
        };

        self.deliver(&report);
        report
    }

    /// Operator late check-in in the background
    pub fn late_check_in(
        &self,
        lookup_key: String,
        justification: String,
    ) -> JoinHandle<Result<ScanReport>> {
        let worker = self.clone();
        let session_id = self.session_id();
        let guard = InFlight::enter(&self.in_flight);
        self.runtime.spawn(async move {
            let _guard = guard;
            worker
                .run_late_check_in(session_id, &lookup_key, &justification)
                .await
        })
    }

    /// Validation failures are returned and shown on the status line only;
    /// store failures become a `StoreError` report.
    pub async fn run_late_check_in(
        &self,
        session_id: i64,
        lookup_key: &str,
        justification: &str,
    ) -> Result<ScanReport> {
        let now = self.clock.now();
        let state = self.schedule.state(now);

        match self
            .resolver
            .late_check_in(session_id, &state, lookup_key, justification, now)
            .await
        {
            Ok(resolution) => {
                let report = ScanReport::new(
                    lookup_key,
                    resolution.participant.map(|p| p.name),
                    resolution.outcome,
                    None,
                );
                self.deliver(&report);
                Ok(report)
            }
            Err(KioskError::Validation(msg)) => {
                tracing::warn!(lookup_key, "Late check-in rejected: {}", msg);
                self.feedback.set_status(msg.clone());
                self.notifier.failure();
                self.send(KioskMessage::Error(msg.clone()));
                Err(KioskError::Validation(msg))
            }
            Err(e) => {
                tracing::error!(lookup_key, session_id, "Late check-in could not be saved: {}", e);
                let report =
                    ScanReport::new(lookup_key, None, ScanOutcome::StoreError(e.to_string()), None);
                self.deliver(&report);
                Ok(report)
            }
        }
    }

    fn deliver(&self, report: &ScanReport) {
        self.feedback.publish(report);
        if report.outcome.is_success() {
            self.notifier.success();
        } else {
            self.notifier.failure();
        }
        self.send(KioskMessage::ScanResolved(report.clone()));
    }

    fn send(&self, msg: KioskMessage) {
        if let Some(tx) = &self.messages {
            if tx.try_send(msg).is_err() {
                tracing::debug!("Display queue full or closed; report dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::kiosk::notify::MockNotifier;
    use crate::schedule::{ManualClock, ModeScheduler};
    use crate::store::{AttendanceStore, NewSession};
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    async fn worker(notifier: MockNotifier) -> (PersistenceWorker, Arc<ManualClock>, FeedbackChannel) {
        let store = AttendanceStore::connect(&StoreConfig::in_memory())
            .await
            .unwrap();
        let session = store
            .insert_session(NewSession {
                subject_title: "Physics Lab".into(),
                faculty_name: "Dr. Rao".into(),
                date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
                start_time: NaiveTime::from_hms_opt(9, 0, 0),
                end_time: NaiveTime::from_hms_opt(11, 0, 0),
            })
            .await
            .unwrap();
        store
            .insert_student("Asha K", Some("25MCA01"), None)
            .await
            .unwrap();

        let clock = Arc::new(ManualClock::new(ts(9, 5)));
        let schedule = SharedSchedule::new(ModeScheduler::for_session(
            &session,
            TimeDelta::minutes(15),
            ts(8, 0),
        ));
        let feedback = FeedbackChannel::new(Duration::from_millis(1500));
        let worker = PersistenceWorker::new(
            Handle::current(),
            AttendanceResolver::new(store),
            schedule,
            clock.clone(),
            feedback.clone(),
            Arc::new(notifier),
            session.id,
        );
        (worker, clock, feedback)
    }

    #[tokio::test]
    async fn test_process_publishes_feedback_and_rings() {
        let mut notifier = MockNotifier::new();
        notifier.expect_success().times(1).return_const(());
        notifier.expect_failure().times(0);
        let (worker, _clock, feedback) = worker(notifier).await;

        let report = worker
            .process("25MCA01".into(), Rect::new(10, 10, 50, 50))
            .await
            .unwrap();
        assert_eq!(report.outcome, ScanOutcome::CheckedIn);
        assert_eq!(report.participant.as_deref(), Some("Asha K"));

        let overlay = feedback.current_overlay(Instant::now()).unwrap();
        assert_eq!(overlay.region, Some(Rect::new(10, 10, 50, 50)));
        assert_eq!(worker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_unknown_code_rings_failure() {
        let mut notifier = MockNotifier::new();
        notifier.expect_failure().times(1).return_const(());
        let (worker, _clock, feedback) = worker(notifier).await;

        let report = worker
            .process("ZZ999".into(), Rect::new(0, 0, 1, 1))
            .await
            .unwrap();
        assert_eq!(report.outcome, ScanOutcome::UnknownCode);
        assert_eq!(feedback.status_line(), "Unknown code: ZZ999");
    }

    #[tokio::test]
    async fn test_late_check_in_validation_goes_to_status_line() {
        let mut notifier = MockNotifier::new();
        notifier.expect_failure().times(1).return_const(());
        let (worker, clock, feedback) = worker(notifier).await;
        clock.set(ts(10, 0));

        let result = worker
            .late_check_in("25MCA01".into(), "".into())
            .await
            .unwrap();
        assert!(matches!(result, Err(KioskError::Validation(_))));
        assert_eq!(feedback.status_line(), "A reason is required");
        assert!(feedback.current_overlay(Instant::now()).is_none());
    }

    #[tokio::test]
    async fn test_messages_forwarded() {
        let mut notifier = MockNotifier::new();
        notifier.expect_success().return_const(());
        let (worker, _clock, _feedback) = worker(notifier).await;
        let (tx, rx) = crossbeam_channel::bounded(4);
        let worker = worker.with_messages(tx);

        worker
            .process("25MCA01".into(), Rect::new(0, 0, 1, 1))
            .await
            .unwrap();
        match rx.try_recv().unwrap() {
            KioskMessage::ScanResolved(report) => assert_eq!(report.outcome, ScanOutcome::CheckedIn),
            other => panic!("unexpected message {:?}", other),
        }
    }
}
