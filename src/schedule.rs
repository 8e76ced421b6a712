//! Attendance mode scheduling
//!
//! The kiosk is in check-in mode until `start_time + grace_period` (the
//! cutover) and in check-out mode afterwards. The mode is never stored: it is
//! a pure function of the session metadata and the wall clock, recomputed on
//! every query.
//!
//! A recurring ticker task republishes the current [`ModeState`] on a
//! `tokio::sync::watch` channel so the display can show the mode and a
//! countdown without polling the scheduler itself.

use crate::types::{AttendanceMode, ModeState, SessionInfo};
use chrono::{Local, NaiveDateTime, TimeDelta};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The real local clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Computes check-in / check-out mode for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeScheduler {
    cutover: NaiveDateTime,
    ends_at: Option<NaiveDateTime>,
    degraded: bool,
}

impl ModeScheduler {
    /// Scheduler for `session`
    ///
    /// Without a start time the cutover is measured from `kiosk_started`
    /// instead, so the kiosk stays usable.
    pub fn for_session(
        session: &SessionInfo,
        grace: TimeDelta,
        kiosk_started: NaiveDateTime,
    ) -> Self {
        let (start, degraded) = match session.starts_at() {
            Some(start) => (start, false),
            None => {
                tracing::warn!(
                    session_id = session.id,
                    "Session has no start time; cutover measured from kiosk start"
                );
                (kiosk_started, true)
            }
        };

        // An end before the start means the session runs past midnight
        let ends_at = session.ends_at().map(|end| {
            if session.starts_at().is_some_and(|s| end <= s) {
                end + TimeDelta::days(1)
            } else {
                end
            }
        });

        Self {
            cutover: start + grace,
            ends_at,
            degraded,
        }
    }

    /// Scheduler from raw timestamps
    pub fn new(start: NaiveDateTime, grace: TimeDelta, ends_at: Option<NaiveDateTime>) -> Self {
        Self {
            cutover: start + grace,
            ends_at,
            degraded: false,
        }
    }

    pub fn cutover(&self) -> NaiveDateTime {
        self.cutover
    }

    pub fn ends_at(&self) -> Option<NaiveDateTime> {
        self.ends_at
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// CheckIn strictly before the cutover, CheckOut from the cutover on
    pub fn current_mode(&self, now: NaiveDateTime) -> AttendanceMode {
        if now < self.cutover {
            AttendanceMode::CheckIn
        } else {
            AttendanceMode::CheckOut
        }
    }

    /// `max(0, cutover - now)`
    pub fn time_to_cutover(&self, now: NaiveDateTime) -> TimeDelta {
        (self.cutover - now).max(TimeDelta::zero())
    }

    /// Whether `now` is past the scheduled end
    pub fn is_session_ended(&self, now: NaiveDateTime) -> bool {
        self.ends_at.is_some_and(|end| now > end)
    }

    /// Full snapshot at `now`
    pub fn state(&self, now: NaiveDateTime) -> ModeState {
        ModeState {
            mode: self.current_mode(now),
            cutover: self.cutover,
            remaining: self.time_to_cutover(now),
            session_ended: self.is_session_ended(now),
            degraded: self.degraded,
        }
    }
}

/// Scheduler shared between the ticker, the resolver and the capture loop.
/// Replaced wholesale when the active session changes.
#[derive(Debug, Clone)]
pub struct SharedSchedule {
    inner: Arc<RwLock<ModeScheduler>>,
}

impl SharedSchedule {
    pub fn new(scheduler: ModeScheduler) -> Self {
        Self {
            inner: Arc::new(RwLock::new(scheduler)),
        }
    }

    /// Copy of the current scheduler
    pub fn get(&self) -> ModeScheduler {
        *self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    pub fn replace(&self, scheduler: ModeScheduler) {
        *self.inner.write().unwrap_or_else(|p| p.into_inner()) = scheduler;
    }

    pub fn state(&self, now: NaiveDateTime) -> ModeState {
        self.get().state(now)
    }
}

/// Recurring task that republishes the mode state
pub struct ModeTicker {
    handle: JoinHandle<()>,
}

impl ModeTicker {
    /// Spawn on `runtime`; the first state is published immediately
    pub fn spawn(
        runtime: &tokio::runtime::Handle,
        schedule: SharedSchedule,
        clock: Arc<dyn Clock>,
        tick: Duration,
        tx: watch::Sender<ModeState>,
    ) -> Self {
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let state = schedule.state(clock.now());
                if tx.send(state).is_err() {
                    tracing::debug!("Mode ticker stopping: no subscribers");
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for ModeTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use proptest::prelude::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn session(start: Option<(u32, u32)>, end: Option<(u32, u32)>) -> SessionInfo {
        SessionInfo {
            id: 7,
            subject_title: "OS Lab".into(),
            faculty_name: "Dr. Nair".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: start.and_then(|(h, m)| NaiveTime::from_hms_opt(h, m, 0)),
            end_time: end.and_then(|(h, m)| NaiveTime::from_hms_opt(h, m, 0)),
            is_active: true,
        }
    }

    #[test]
    fn test_mode_flips_at_cutover() {
        let sched = ModeScheduler::for_session(
            &session(Some((9, 0)), Some((11, 0))),
            TimeDelta::minutes(15),
            at(8, 0, 0),
        );
        assert_eq!(sched.cutover(), at(9, 15, 0));
        assert_eq!(sched.current_mode(at(9, 14, 59)), AttendanceMode::CheckIn);
        assert_eq!(sched.current_mode(at(9, 15, 0)), AttendanceMode::CheckOut);
        assert!(!sched.is_degraded());
    }

    #[test]
    fn test_time_to_cutover_never_negative() {
        let sched = ModeScheduler::new(at(9, 0, 0), TimeDelta::minutes(15), None);
        assert_eq!(sched.time_to_cutover(at(9, 5, 0)), TimeDelta::minutes(10));
        assert_eq!(sched.time_to_cutover(at(10, 0, 0)), TimeDelta::zero());
    }

    #[test]
    fn test_missing_start_uses_kiosk_start() {
        let sched = ModeScheduler::for_session(
            &session(None, None),
            TimeDelta::minutes(15),
            at(13, 2, 0),
        );
        assert!(sched.is_degraded());
        assert_eq!(sched.cutover(), at(13, 17, 0));
        assert!(!sched.is_session_ended(at(23, 59, 0)));
    }

    #[test]
    fn test_session_end() {
        let sched = ModeScheduler::for_session(
            &session(Some((9, 0)), Some((11, 0))),
            TimeDelta::minutes(15),
            at(8, 0, 0),
        );
        assert!(!sched.is_session_ended(at(11, 0, 0)));
        assert!(sched.is_session_ended(at(11, 0, 1)));
        assert!(sched.state(at(12, 0, 0)).session_ended);
    }

    #[test]
    fn test_overnight_end_rolls_to_next_day() {
        let sched = ModeScheduler::for_session(
            &session(Some((22, 0)), Some((1, 0))),
            TimeDelta::minutes(15),
            at(8, 0, 0),
        );
        assert!(!sched.is_session_ended(at(23, 30, 0)));
        assert_eq!(sched.ends_at(), Some(at(1, 0, 0) + TimeDelta::days(1)));
    }

    #[test]
    fn test_shared_schedule_replace() {
        let shared = SharedSchedule::new(ModeScheduler::new(at(9, 0, 0), TimeDelta::zero(), None));
        assert_eq!(shared.state(at(9, 30, 0)).mode, AttendanceMode::CheckOut);
        shared.replace(ModeScheduler::new(at(10, 0, 0), TimeDelta::zero(), None));
        assert_eq!(shared.state(at(9, 30, 0)).mode, AttendanceMode::CheckIn);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(at(9, 0, 0));
        clock.advance(TimeDelta::minutes(20));
        assert_eq!(clock.now(), at(9, 20, 0));
        clock.set(at(7, 0, 0));
        assert_eq!(clock.now(), at(7, 0, 0));
    }

    #[tokio::test]
    async fn test_ticker_publishes_state() {
        let clock = Arc::new(ManualClock::new(at(9, 0, 0)));
        let schedule = SharedSchedule::new(ModeScheduler::new(
            at(9, 0, 0),
            TimeDelta::minutes(15),
            None,
        ));
        let (tx, mut rx) = watch::channel(schedule.state(at(0, 0, 0)));
        let ticker = ModeTicker::spawn(
            &tokio::runtime::Handle::current(),
            schedule,
            clock.clone(),
            Duration::from_millis(10),
            tx,
        );

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().mode, AttendanceMode::CheckIn);
        assert_eq!(rx.borrow().remaining, TimeDelta::minutes(15));

        clock.advance(TimeDelta::minutes(16));
        loop {
            rx.changed().await.unwrap();
            if rx.borrow().mode == AttendanceMode::CheckOut {
                break;
            }
        }
        ticker.stop();
    }

    proptest! {
        #[test]
        fn prop_mode_is_check_in_iff_before_cutover(
            start_min in 0i64..1440,
            grace_min in 0i64..120,
            offset_s in -20_000i64..20_000,
        ) {
            let start = at(0, 0, 0) + TimeDelta::minutes(start_min);
            let grace = TimeDelta::minutes(grace_min);
            let sched = ModeScheduler::new(start, grace, None);
            let now = start + TimeDelta::seconds(offset_s);

            let expect_in = now < start + grace;
            prop_assert_eq!(sched.current_mode(now) == AttendanceMode::CheckIn, expect_in);
            // pure: same input, same answer
            prop_assert_eq!(sched.current_mode(now), sched.current_mode(now));
            prop_assert!(sched.time_to_cutover(now) >= TimeDelta::zero());
        }
    }
}
