//! End-to-end scan resolution against an in-memory store
//!
//! Drives the persistence worker the way the capture loop does, with a
//! manual clock standing in for the wall clock.

mod common;

use common::builders::{file_store, ScanHarness, SessionBuilder, CARD};
use common::ts;
use haajar_kiosk::kiosk::AttendanceResolver;
use haajar_kiosk::scanner::ScanDebouncer;
use haajar_kiosk::schedule::ModeScheduler;
use haajar_kiosk::types::{AttendanceMode, HighlightColor, Rect};
use haajar_kiosk::{KioskError, ScanOutcome};
use chrono::TimeDelta;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_unknown_code_leaves_store_untouched() {
    let h = ScanHarness::new().await;

    let report = h.worker.run_scan(h.session.id, "ZZ999", None).await;

    assert_eq!(report.outcome, ScanOutcome::UnknownCode);
    assert_eq!(report.message, "Unknown code: ZZ999");
    assert!(report.participant.is_none());
    let summary = h.store.session_summary(h.session.id).await.unwrap();
    assert_eq!(summary.checked_in + summary.checked_out, 0);
}

#[tokio::test]
async fn test_first_scan_checks_in() {
    let h = ScanHarness::new().await;

    let report = h
        .worker
        .run_scan(h.session.id, CARD, Some(Rect::new(4, 4, 20, 20)))
        .await;

    assert_eq!(report.outcome, ScanOutcome::CheckedIn);
    assert_eq!(report.participant.as_deref(), Some("Asha K"));
    let records = h.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].check_in_time, Some(ts(9, 5)));
    assert!(records[0].check_out_time.is_none());

    let overlay = h.feedback.current_overlay(Instant::now()).unwrap();
    assert_eq!(overlay.color, HighlightColor::Success);
    assert_eq!(overlay.region, Some(Rect::new(4, 4, 20, 20)));
}

#[tokio::test]
async fn test_rescan_inside_window_never_reaches_store() {
    let h = ScanHarness::new().await;
    let debouncer = ScanDebouncer::new(Duration::from_millis(1500));
    let t0 = Instant::now();

    let mut outcomes = Vec::new();
    for offset in [0u64, 200, 900] {
        if debouncer.accept(CARD, t0 + Duration::from_millis(offset)) {
            outcomes.push(h.worker.run_scan(h.session.id, CARD, None).await.outcome);
        }
    }

    assert_eq!(outcomes, vec![ScanOutcome::CheckedIn]);
    assert_eq!(h.records().await.len(), 1);
}

#[tokio::test]
async fn test_scan_after_cutover_checks_out() {
    let h = ScanHarness::new().await;
    h.worker.run_scan(h.session.id, CARD, None).await;

    h.set_time(ts(9, 40));
    let report = h.worker.run_scan(h.session.id, CARD, None).await;

    assert_eq!(report.outcome, ScanOutcome::CheckedOut);
    let records = h.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].check_out_time, Some(ts(9, 40)));
}

#[tokio::test]
async fn test_late_check_in_after_refused_check_out() {
    let h = ScanHarness::new().await;
    h.set_time(ts(9, 30));

    let refused = h.worker.run_scan(h.session.id, CARD, None).await;
    assert_eq!(refused.outcome, ScanOutcome::NotCheckedIn);
    assert!(h.records().await.is_empty());

    let report = h
        .worker
        .run_late_check_in(h.session.id, CARD, "traffic")
        .await
        .unwrap();

    assert_eq!(report.outcome, ScanOutcome::LateCheckedIn);
    let records = h.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].late_check_in_reason.as_deref(), Some("traffic"));
    assert_eq!(records[0].check_in_time, Some(ts(9, 30)));
    assert!(records[0].check_out_time.is_none());

    // the late row is an ordinary open row for check-out
    h.set_time(ts(10, 45));
    let out = h.worker.run_scan(h.session.id, CARD, None).await;
    assert_eq!(out.outcome, ScanOutcome::CheckedOut);
}

#[tokio::test]
async fn test_late_check_in_requires_reason() {
    let h = ScanHarness::new().await;
    h.set_time(ts(9, 30));

    let err = h
        .worker
        .run_late_check_in(h.session.id, CARD, "   ")
        .await
        .unwrap_err();

    assert!(matches!(err, KioskError::Validation(_)));
    assert!(h.records().await.is_empty());
    assert!(!h.feedback.status_line().is_empty());
}

#[tokio::test]
async fn test_everything_rejected_after_session_end() {
    let h = ScanHarness::new().await;
    h.set_time(ts(11, 1));

    for payload in [CARD, "ZZ999"] {
        let report = h.worker.run_scan(h.session.id, payload, None).await;
        assert_eq!(report.outcome, ScanOutcome::SessionEnded);
        assert_eq!(report.message, "Session ended. Scanning closed.");
    }
    let late = h
        .worker
        .run_late_check_in(h.session.id, CARD, "traffic")
        .await
        .unwrap();
    assert_eq!(late.outcome, ScanOutcome::SessionEnded);
    assert!(h.records().await.is_empty());
}

#[tokio::test]
async fn test_already_checked_in_is_caution() {
    let h = ScanHarness::new().await;
    h.worker.run_scan(h.session.id, CARD, None).await;
    h.set_time(ts(9, 10));

    let report = h.worker.run_scan(h.session.id, CARD, None).await;

    assert_eq!(report.outcome, ScanOutcome::AlreadyCheckedIn);
    assert_eq!(report.outcome.color(), HighlightColor::Caution);
    assert_eq!(h.records().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scans_keep_one_open_record() {
    let h = ScanHarness::new().await;

    let handles: Vec<_> = (0..6)
        .map(|_| h.worker.process(CARD.to_string(), Rect::new(0, 0, 8, 8)))
        .collect();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().outcome);
    }

    let checked_in = outcomes
        .iter()
        .filter(|o| **o == ScanOutcome::CheckedIn)
        .count();
    assert_eq!(checked_in, 1, "outcomes: {:?}", outcomes);
    let open: Vec<_> = h
        .records()
        .await
        .into_iter()
        .filter(|r| r.check_out_time.is_none())
        .collect();
    assert_eq!(open.len(), 1);
    assert_eq!(h.worker.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scans_on_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_store(dir.path());
    assert!(config.max_connections > 1);
    let h = ScanHarness::with_store(&config).await;

    let mut students = vec![h.student.clone()];
    for i in 0..6 {
        let roll = format!("R{}", i);
        let s = h
            .store
            .insert_student(&format!("Student {}", i), Some(&roll), None)
            .await
            .unwrap();
        students.push(s);
    }

    let mut handles: Vec<_> = (0..6)
        .map(|i| h.worker.process(format!("R{}", i), Rect::new(0, 0, 8, 8)))
        .collect();
    handles.extend((0..6).map(|_| h.worker.process(CARD.to_string(), Rect::new(0, 0, 8, 8))));

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().outcome);
    }

    assert!(
        !outcomes.iter().any(|o| matches!(o, ScanOutcome::StoreError(_))),
        "outcomes: {:?}",
        outcomes
    );
    assert_eq!(
        outcomes[..6].iter().filter(|o| **o == ScanOutcome::CheckedIn).count(),
        6,
        "outcomes: {:?}",
        outcomes
    );
    assert_eq!(
        outcomes[6..].iter().filter(|o| **o == ScanOutcome::CheckedIn).count(),
        1,
        "outcomes: {:?}",
        outcomes
    );
    for student in &students {
        let open = h
            .store
            .records_for(student.id, h.session.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.check_out_time.is_none())
            .count();
        assert_eq!(open, 1, "student {}", student.name);
    }
    assert_eq!(h.worker.in_flight(), 0);
}

#[tokio::test]
async fn test_check_out_never_precedes_check_in() {
    let h = ScanHarness::new().await;

    for (check_in, check_out) in [((9, 1), (9, 20)), ((9, 14), (9, 15)), ((9, 0), (10, 59))] {
        let store = h.store.clone();
        let session = store
            .insert_session(SessionBuilder::new("Round Trip Lab").build())
            .await
            .unwrap();
        let resolver = AttendanceResolver::new(store.clone());
        let schedule = ModeScheduler::for_session(&session, TimeDelta::minutes(15), ts(8, 0));

        let t_in = ts(check_in.0, check_in.1);
        let t_out = ts(check_out.0, check_out.1);
        let first = resolver
            .resolve(session.id, &schedule.state(t_in), CARD, t_in)
            .await
            .unwrap();
        let second = resolver
            .resolve(session.id, &schedule.state(t_out), CARD, t_out)
            .await
            .unwrap();

        assert_eq!(first.outcome, ScanOutcome::CheckedIn);
        assert_eq!(second.outcome, ScanOutcome::CheckedOut);
        let rows = store.records_for(h.student.id, session.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].check_in_time <= rows[0].check_out_time);
    }
}

#[tokio::test]
async fn test_unscheduled_session_counts_grace_from_kiosk_start() {
    let h = ScanHarness::new().await;
    let session = h
        .store
        .insert_session(SessionBuilder::new("Open Lab").unscheduled().build())
        .await
        .unwrap();
    let schedule = ModeScheduler::for_session(&session, TimeDelta::minutes(15), ts(13, 0));

    assert!(schedule.is_degraded());
    assert_eq!(schedule.current_mode(ts(13, 14)), AttendanceMode::CheckIn);
    assert_eq!(schedule.current_mode(ts(13, 15)), AttendanceMode::CheckOut);
    assert!(!schedule.is_session_ended(ts(23, 59)));
}

#[tokio::test]
async fn test_later_report_replaces_overlay() {
    let h = ScanHarness::new().await;
    h.worker.run_scan(h.session.id, CARD, None).await;
    h.worker.run_scan(h.session.id, "ZZ999", None).await;

    let overlay = h.feedback.current_overlay(Instant::now()).unwrap();
    assert_eq!(overlay.outcome, ScanOutcome::UnknownCode);
    assert_eq!(overlay.color, HighlightColor::Error);
    assert!(h
        .feedback
        .current_overlay(Instant::now() + Duration::from_secs(2))
        .is_none());
}
