use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use sea_orm::{PaginatorTrait, QueryFilter, QueryOrder, Set};

/// One attendance row (`registry` table)
///
/// A row is *open* while `check_out_time` is null. At most one open row may
/// exist per (student, session); a partial unique index enforces this.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "registry")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub session_id: i64,
    pub check_in_time: Option<NaiveDateTime>,
    pub check_out_time: Option<NaiveDateTime>,
    pub late_check_in_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id"
    )]
    Student,
    #[sea_orm(
        belongs_to = "super::session::Entity",
        from = "Column::SessionId",
        to = "super::session::Column::Id"
    )]
    Session,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_open(&self) -> bool {
        self.check_out_time.is_none()
    }

    /// Most recent row for the pair, open or closed
    pub async fn latest<C>(db: &C, student_id: i64, session_id: i64) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::SessionId.eq(session_id))
            .order_by_desc(Column::Id)
            .one(db)
            .await
    }

    pub async fn check_in<C>(
        db: &C,
        student_id: i64,
        session_id: i64,
        at: NaiveDateTime,
        late_reason: Option<String>,
    ) -> Result<Model, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            student_id: Set(student_id),
            session_id: Set(session_id),
            check_in_time: Set(Some(at)),
            check_out_time: Set(None),
            late_check_in_reason: Set(late_reason),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Set the check-out time on this row
    pub async fn check_out<C>(self, db: &C, at: NaiveDateTime) -> Result<Model, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active: ActiveModel = self.into();
        active.check_out_time = Set(Some(at));
        active.update(db).await
    }

    pub async fn for_pair<C>(db: &C, student_id: i64, session_id: i64) -> Result<Vec<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::SessionId.eq(session_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// (rows with a check-in, rows with a check-out) for a session
    pub async fn counts<C>(db: &C, session_id: i64) -> Result<(u64, u64), DbErr>
    where
        C: ConnectionTrait,
    {
        let checked_in = Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .filter(Column::CheckInTime.is_not_null())
            .count(db)
            .await?;
        let checked_out = Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .filter(Column::CheckOutTime.is_not_null())
            .count(db)
            .await?;
        Ok((checked_in, checked_out))
    }
}
