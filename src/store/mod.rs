//! Durable attendance store
//!
//! SQLite through sea-orm. The store is the serialization point for the
//! open-record invariant: every scan runs inside its own transaction, and a
//! partial unique index rejects a second open row for the same
//! (student, session) pair even if two transactions race.
//!
//! Write transactions take a single writer slot before `BEGIN`. Two deferred
//! SQLite transactions that both read and then write cannot both upgrade to
//! the write lock, and SQLite fails one of them with `SQLITE_BUSY` without
//! waiting. Queueing them on the slot keeps the pool usable for readers.

pub mod entities;

use crate::config::StoreConfig;
use crate::error::{KioskError, Result, ResultExt};
use crate::types::{Participant, SessionInfo, SessionSummary};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use entities::{faculty, registry, session, student, subject};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    DatabaseTransaction, EntityTrait, Schema, Set, TransactionTrait,
};
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Name of the index that keeps at most one open row per pair
pub const OPEN_RECORD_INDEX: &str = "registry_one_open_per_student_session";

/// Fields for seeding a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub subject_title: String,
    pub faculty_name: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

/// Handle to the attendance database
#[derive(Debug, Clone)]
pub struct AttendanceStore {
    db: DatabaseConnection,
    writer: Arc<Mutex<()>>,
}

/// A transaction holding the store's writer slot until it commits or rolls back
pub struct WriteTxn {
    txn: DatabaseTransaction,
    _slot: OwnedMutexGuard<()>,
}

impl WriteTxn {
    pub async fn commit(self) -> Result<()> {
        let Self { txn, _slot } = self;
        txn.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        let Self { txn, _slot } = self;
        txn.rollback().await?;
        Ok(())
    }
}

impl Deref for WriteTxn {
    type Target = DatabaseTransaction;

    fn deref(&self) -> &DatabaseTransaction {
        &self.txn
    }
}

impl AttendanceStore {
    /// Connect and make sure the schema exists
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let mut opts = ConnectOptions::new(config.database_url.clone());
        opts.max_connections(config.max_connections.max(1))
            .sqlx_logging(false);

        let db = Database::connect(opts)
            .await
            .with_context(|| format!("Failed to open store at {}", config.database_url))?;

        let store = Self::from_connection(db);
        store.ensure_schema().await?;
        tracing::info!(url = %config.database_url, "Attendance store ready");
        Ok(store)
    }

    /// Wrap an existing connection; the schema is not touched
    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self {
            db,
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Create missing tables and the open-record index
    pub async fn ensure_schema(&self) -> Result<()> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);

        let mut tables = vec![
            schema.create_table_from_entity(subject::Entity),
            schema.create_table_from_entity(faculty::Entity),
            schema.create_table_from_entity(student::Entity),
            schema.create_table_from_entity(session::Entity),
            schema.create_table_from_entity(registry::Entity),
        ];
        for table in tables.iter_mut() {
            table.if_not_exists();
            self.db
                .execute(backend.build(&*table))
                .await
                .context("Failed to create table")?;
        }

        self.db
            .execute_unprepared(&format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON registry (student_id, session_id) \
                 WHERE check_out_time IS NULL",
                OPEN_RECORD_INDEX
            ))
            .await
            .context("Failed to create open-record index")?;

        Ok(())
    }

    /// Start the unit of work for one scan
    ///
    /// Waits for the writer slot first; callers queue in arrival order.
    pub async fn begin(&self) -> Result<WriteTxn> {
        let slot = self.writer.clone().lock_owned().await;
        let txn = self.db.begin().await?;
        Ok(WriteTxn { txn, _slot: slot })
    }

    pub async fn load_session(&self, id: i64) -> Result<SessionInfo> {
        let model = session::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(KioskError::SessionNotFound(id))?;
        Ok(model.info(&self.db).await?)
    }

    pub async fn list_active_sessions(&self) -> Result<Vec<SessionInfo>> {
        let models = session::Model::find_active(&self.db).await?;
        let mut sessions = Vec::with_capacity(models.len());
        for model in models {
            sessions.push(model.info(&self.db).await?);
        }
        Ok(sessions)
    }

    pub async fn session_summary(&self, session_id: i64) -> Result<SessionSummary> {
        let (checked_in, checked_out) = registry::Model::counts(&self.db, session_id).await?;
        Ok(SessionSummary {
            checked_in,
            checked_out,
        })
    }

    /// All rows for a pair, oldest first
    pub async fn records_for(&self, student_id: i64, session_id: i64) -> Result<Vec<registry::Model>> {
        Ok(registry::Model::for_pair(&self.db, student_id, session_id).await?)
    }

    pub async fn insert_student(
        &self,
        name: &str,
        roll_no: Option<&str>,
        admission_no: Option<&str>,
    ) -> Result<Participant> {
        let model = student::Model::create(&self.db, name, roll_no, admission_no).await?;
        Ok(model.into())
    }

    /// Insert a session together with fresh subject and faculty rows
    pub async fn insert_session(&self, new: NewSession) -> Result<SessionInfo> {
        let txn = self.begin().await?;

        let subject = subject::ActiveModel {
            title: Set(new.subject_title),
            course_code: Set(None),
            ..Default::default()
        }
        .insert(&*txn)
        .await?;

        let faculty = faculty::ActiveModel {
            name: Set(new.faculty_name),
            faculty_no: Set(None),
            department: Set(None),
            ..Default::default()
        }
        .insert(&*txn)
        .await?;

        let session = session::ActiveModel {
            subject_id: Set(subject.id),
            faculty_id: Set(faculty.id),
            date: Set(new.date),
            start_time: Set(new.start_time),
            end_time: Set(new.end_time),
            is_active: Set(true),
            remarks: Set(None),
            ..Default::default()
        }
        .insert(&*txn)
        .await?;

        let info = session.info(&*txn).await?;
        txn.commit().await?;
        Ok(info)
    }
}

/// Lookup used by the resolver inside its transaction
pub async fn find_participant<C>(db: &C, payload: &str) -> Result<Option<Participant>>
where
    C: ConnectionTrait,
{
    Ok(student::Model::find_by_payload(db, payload)
        .await?
        .map(Participant::from))
}

pub async fn latest_record<C>(
    db: &C,
    student_id: i64,
    session_id: i64,
) -> Result<Option<registry::Model>>
where
    C: ConnectionTrait,
{
    Ok(registry::Model::latest(db, student_id, session_id).await?)
}

pub async fn insert_check_in<C>(
    db: &C,
    student_id: i64,
    session_id: i64,
    at: NaiveDateTime,
    late_reason: Option<String>,
) -> Result<registry::Model>
where
    C: ConnectionTrait,
{
    Ok(registry::Model::check_in(db, student_id, session_id, at, late_reason).await?)
}

pub async fn close_record<C>(
    db: &C,
    record: registry::Model,
    at: NaiveDateTime,
) -> Result<registry::Model>
where
    C: ConnectionTrait,
{
    Ok(record.check_out(db, at).await?)
}
