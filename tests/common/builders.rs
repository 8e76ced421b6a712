//! Builders for stores, sessions and workers used across integration tests

use super::{lab_day, ts};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use haajar_kiosk::config::StoreConfig;
use haajar_kiosk::decoder::{CodeDecoder, DecodedCode, DecoderChain};
use haajar_kiosk::kiosk::{AttendanceResolver, FeedbackChannel, PersistenceWorker, SilentNotifier};
use haajar_kiosk::schedule::{ManualClock, ModeScheduler, SharedSchedule};
use haajar_kiosk::store::NewSession;
use haajar_kiosk::types::{Frame, Participant, Rect};
use haajar_kiosk::{AttendanceStore, SessionInfo};
use image::{GrayImage, Luma};
use std::sync::Arc;
use std::time::Duration;

/// Roll number printed on the test card
pub const CARD: &str = "25MCA01";

/// Builder for a lab session row
pub struct SessionBuilder {
    subject: String,
    faculty: String,
    start: Option<NaiveTime>,
    end: Option<NaiveTime>,
}

impl SessionBuilder {
    pub fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            faculty: "Dr. Menon".to_string(),
            start: NaiveTime::from_hms_opt(9, 0, 0),
            end: NaiveTime::from_hms_opt(11, 0, 0),
        }
    }

    pub fn hours(mut self, start: (u32, u32), end: (u32, u32)) -> Self {
        self.start = NaiveTime::from_hms_opt(start.0, start.1, 0);
        self.end = NaiveTime::from_hms_opt(end.0, end.1, 0);
        self
    }

    pub fn unscheduled(mut self) -> Self {
        self.start = None;
        self.end = None;
        self
    }

    pub fn build(self) -> NewSession {
        NewSession {
            subject_title: self.subject,
            faculty_name: self.faculty,
            date: lab_day(),
            start_time: self.start,
            end_time: self.end,
        }
    }
}

/// In-memory store with one 09:00-11:00 session and one student
pub async fn seeded_store() -> (AttendanceStore, SessionInfo, Participant) {
    seeded_store_with(&StoreConfig::in_memory()).await
}

/// Same seed as [`seeded_store`] on any store configuration
pub async fn seeded_store_with(config: &StoreConfig) -> (AttendanceStore, SessionInfo, Participant) {
    let store = AttendanceStore::connect(config)
        .await
        .expect("store");
    let session = store
        .insert_session(SessionBuilder::new("Data Structures Lab").build())
        .await
        .expect("seed session");
    let student = store
        .insert_student("Asha K", Some(CARD), Some("ADM-1001"))
        .await
        .expect("seed student");
    (store, session, student)
}

/// A persistence worker driven by a manual clock
pub struct ScanHarness {
    pub store: AttendanceStore,
    pub session: SessionInfo,
    pub student: Participant,
    pub clock: Arc<ManualClock>,
    pub feedback: FeedbackChannel,
    pub worker: PersistenceWorker,
}

impl ScanHarness {
    /// Clock at 09:05, schedule from the seeded session with a 15 minute grace
    pub async fn new() -> Self {
        Self::with_store(&StoreConfig::in_memory()).await
    }

    pub async fn with_store(config: &StoreConfig) -> Self {
        let (store, session, student) = seeded_store_with(config).await;
        let clock = Arc::new(ManualClock::new(ts(9, 5)));
        let schedule = SharedSchedule::new(ModeScheduler::for_session(
            &session,
            TimeDelta::minutes(15),
            ts(8, 0),
        ));
        let feedback = FeedbackChannel::new(Duration::from_millis(1500));
        let worker = PersistenceWorker::new(
            tokio::runtime::Handle::current(),
            AttendanceResolver::new(store.clone()),
            schedule,
            clock.clone(),
            feedback.clone(),
            Arc::new(SilentNotifier),
            session.id,
        );

        Self {
            store,
            session,
            student,
            clock,
            feedback,
            worker,
        }
    }

    pub fn set_time(&self, at: NaiveDateTime) {
        self.clock.set(at);
    }

    pub async fn records(&self) -> Vec<haajar_kiosk::store::entities::registry::Model> {
        self.store
            .records_for(self.student.id, self.session.id)
            .await
            .expect("records")
    }
}

/// File-backed store config with the default pool size
pub fn file_store(dir: &std::path::Path) -> StoreConfig {
    StoreConfig {
        database_url: format!("sqlite://{}?mode=rwc", dir.join("kiosk.db").display()),
        ..StoreConfig::default()
    }
}

/// Dark card frame recognized by [`shade_decoder`]
pub fn card_frame() -> GrayImage {
    GrayImage::from_pixel(32, 32, Luma([10]))
}

/// Frame with nothing on it
pub fn empty_frame() -> GrayImage {
    GrayImage::from_pixel(32, 32, Luma([240]))
}

/// Decoder that reads [`CARD`] from any frame whose first pixel is dark
pub fn shade_decoder() -> DecoderChain {
    let primary: Box<dyn CodeDecoder> = Box::new(|_: &Frame| Vec::new());
    let fallback: Box<dyn CodeDecoder> = Box::new(|f: &Frame| {
        if f.image.get_pixel(0, 0).0[0] < 128 {
            vec![DecodedCode::new(CARD, Rect::new(0, 0, 16, 16))]
        } else {
            Vec::new()
        }
    });
    DecoderChain::new(primary, fallback)
}
