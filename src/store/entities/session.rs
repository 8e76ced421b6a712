use chrono::{NaiveDate, NaiveTime};
use sea_orm::entity::prelude::*;
use sea_orm::{QueryFilter, QueryOrder};

use crate::types::SessionInfo;

/// One scheduled lab occurrence (`sessions` table)
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub subject_id: i64,
    pub faculty_id: i64,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub is_active: bool,
    pub remarks: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::subject::Entity",
        from = "Column::SubjectId",
        to = "super::subject::Column::Id"
    )]
    Subject,
    #[sea_orm(
        belongs_to = "super::faculty::Entity",
        from = "Column::FacultyId",
        to = "super::faculty::Column::Id"
    )]
    Faculty,
    #[sea_orm(has_many = "super::registry::Entity")]
    Registry,
}

impl Related<super::subject::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subject.def()
    }
}

impl Related<super::faculty::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Faculty.def()
    }
}

impl Related<super::registry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Registry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Session metadata with subject title and faculty name filled in
    pub async fn info<C>(&self, db: &C) -> Result<SessionInfo, DbErr>
    where
        C: ConnectionTrait,
    {
        let subject = super::subject::Entity::find_by_id(self.subject_id)
            .one(db)
            .await?
            .map(|s| s.title)
            .unwrap_or_default();
        let faculty = super::faculty::Entity::find_by_id(self.faculty_id)
            .one(db)
            .await?
            .map(|f| f.name)
            .unwrap_or_default();

        Ok(SessionInfo {
            id: self.id,
            subject_title: subject,
            faculty_name: faculty,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            is_active: self.is_active,
        })
    }

    /// Active sessions, most recent first
    pub async fn find_active<C>(db: &C) -> Result<Vec<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::IsActive.eq(true))
            .order_by_desc(Column::Date)
            .order_by_asc(Column::StartTime)
            .all(db)
            .await
    }
}
