//! Attendance resolution
//!
//! Turns an accepted payload into a [`ScanOutcome`], reading and writing the
//! registry inside one transaction. The transaction is committed only after
//! the write succeeds; any error rolls it back and is returned to the caller,
//! which reports it as `StoreError`.

use crate::error::{KioskError, Result};
use crate::store::entities::registry;
use crate::store::{self, AttendanceStore, WriteTxn};
use crate::types::{AttendanceMode, ModeState, Participant, ScanOutcome};
use chrono::NaiveDateTime;
use sea_orm::DatabaseTransaction;

/// What to do with the registry for one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Insert a new open row
    CheckIn,
    /// Close the latest row
    CheckOut,
    /// Nothing to write
    Reject(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlreadyCheckedIn,
    NotCheckedIn,
}

impl Rejection {
    pub fn outcome(self) -> ScanOutcome {
        match self {
            Rejection::AlreadyCheckedIn => ScanOutcome::AlreadyCheckedIn,
            Rejection::NotCheckedIn => ScanOutcome::NotCheckedIn,
        }
    }
}

/// Mode gate over the latest row for the pair
///
/// A closed latest row counts as "no open record": in check-in mode the
/// participant may check in again.
pub fn decide(mode: AttendanceMode, latest: Option<&registry::Model>) -> Decision {
    let open = latest.is_some_and(|r| r.is_open());
    match (mode, open) {
        (AttendanceMode::CheckIn, false) => Decision::CheckIn,
        (AttendanceMode::CheckIn, true) => Decision::Reject(Rejection::AlreadyCheckedIn),
        (AttendanceMode::CheckOut, true) => Decision::CheckOut,
        (AttendanceMode::CheckOut, false) => Decision::Reject(Rejection::NotCheckedIn),
    }
}

/// Outcome plus the participant it concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: ScanOutcome,
    pub participant: Option<Participant>,
}

impl Resolution {
    fn new(outcome: ScanOutcome, participant: Option<Participant>) -> Self {
        Self {
            outcome,
            participant,
        }
    }
}

/// Resolves scans for one session against the store
#[derive(Debug, Clone)]
pub struct AttendanceResolver {
    store: AttendanceStore,
}

impl AttendanceResolver {
    pub fn new(store: AttendanceStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &AttendanceStore {
        &self.store
    }

    /// Resolve one scanned payload
    ///
    /// A session past its end rejects every payload before any lookup.
    pub async fn resolve(
        &self,
        session_id: i64,
        state: &ModeState,
        payload: &str,
        now: NaiveDateTime,
    ) -> Result<Resolution> {
        if state.session_ended {
            return Ok(Resolution::new(ScanOutcome::SessionEnded, None));
        }

        let txn = self.store.begin().await?;
        match Self::resolve_in(&txn, session_id, state.mode, payload, now).await {
            Ok(resolution) => {
                txn.commit().await?;
                Ok(resolution)
            }
            Err(e) => {
                Self::rollback(txn, payload).await;
                Err(e)
            }
        }
    }

    async fn resolve_in(
        txn: &DatabaseTransaction,
        session_id: i64,
        mode: AttendanceMode,
        payload: &str,
        now: NaiveDateTime,
    ) -> Result<Resolution> {
        let Some(participant) = store::find_participant(txn, payload).await? else {
            return Ok(Resolution::new(ScanOutcome::UnknownCode, None));
        };

        let latest = store::latest_record(txn, participant.id, session_id).await?;
        let outcome = match decide(mode, latest.as_ref()) {
            Decision::CheckIn => {
                store::insert_check_in(txn, participant.id, session_id, now, None).await?;
                ScanOutcome::CheckedIn
            }
            Decision::CheckOut => {
                // decide() only returns CheckOut when a latest row exists
                let record = latest.ok_or_else(|| {
                    KioskError::Validation("no open record to close".to_string())
                })?;
                store::close_record(txn, record, now).await?;
                ScanOutcome::CheckedOut
            }
            Decision::Reject(rejection) => rejection.outcome(),
        };

        tracing::debug!(
            payload,
            student_id = participant.id,
            session_id,
            mode = %mode,
            outcome = %outcome,
            "Scan resolved"
        );
        Ok(Resolution::new(outcome, Some(participant)))
    }

    /// Operator-confirmed check-in outside the check-in window
    ///
    /// Both fields must be non-blank and the key must name a known
    /// participant; otherwise `Validation` is returned and nothing is
    /// written. An existing open row is left alone (`AlreadyCheckedIn`).
    pub async fn late_check_in(
        &self,
        session_id: i64,
        state: &ModeState,
        lookup_key: &str,
        justification: &str,
        now: NaiveDateTime,
    ) -> Result<Resolution> {
        let lookup_key = lookup_key.trim();
        let justification = justification.trim();
        if lookup_key.is_empty() {
            return Err(KioskError::Validation("Student ID is required".to_string()));
        }
        if justification.is_empty() {
            return Err(KioskError::Validation("A reason is required".to_string()));
        }
        if state.session_ended {
            return Ok(Resolution::new(ScanOutcome::SessionEnded, None));
        }

        let txn = self.store.begin().await?;
        match Self::late_in(&txn, session_id, lookup_key, justification, now).await {
            Ok(resolution) => {
                txn.commit().await?;
                Ok(resolution)
            }
            Err(e) => {
                Self::rollback(txn, lookup_key).await;
                Err(e)
            }
        }
    }

    async fn late_in(
        txn: &DatabaseTransaction,
        session_id: i64,
        lookup_key: &str,
        justification: &str,
        now: NaiveDateTime,
    ) -> Result<Resolution> {
        let participant = store::find_participant(txn, lookup_key)
            .await?
            .ok_or_else(|| KioskError::Validation(format!("No student matches '{}'", lookup_key)))?;

        let latest = store::latest_record(txn, participant.id, session_id).await?;
        if latest.is_some_and(|r| r.is_open()) {
            return Ok(Resolution::new(
                ScanOutcome::AlreadyCheckedIn,
                Some(participant),
            ));
        }

        store::insert_check_in(
            txn,
            participant.id,
            session_id,
            now,
            Some(justification.to_string()),
        )
        .await?;
        tracing::info!(
            student_id = participant.id,
            session_id,
            reason = justification,
            "Late check-in recorded"
        );
        Ok(Resolution::new(ScanOutcome::LateCheckedIn, Some(participant)))
    }

    async fn rollback(txn: WriteTxn, payload: &str) {
        if let Err(e) = txn.rollback().await {
            tracing::error!(payload, "Rollback failed: {}", e);
        }
    }
}
