use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use sea_orm::{Condition, QueryFilter, QueryOrder, Set};

use crate::types::Participant;

/// A registered student (`students` table)
///
/// Any of `id`, `roll_no`, `admission_no` or `name` may appear on a card.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "students")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub roll_no: Option<String>,
    pub admission_no: Option<String>,
    pub dob: Option<NaiveDate>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::registry::Entity")]
    Registry,
}

impl Related<super::registry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Registry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Resolve a scanned payload to a student.
    ///
    /// An all-digit payload is tried as the primary key first. Otherwise, or
    /// when no such id exists, the payload is matched exactly against roll
    /// number, admission number and name.
    pub async fn find_by_payload<C>(db: &C, payload: &str) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        let key = payload.trim();
        if key.is_empty() {
            return Ok(None);
        }

        if key.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = key.parse::<i64>() {
                if let Some(student) = Entity::find_by_id(id).one(db).await? {
                    return Ok(Some(student));
                }
            }
        }

        Entity::find()
            .filter(
                Condition::any()
                    .add(Column::RollNo.eq(key))
                    .add(Column::AdmissionNo.eq(key))
                    .add(Column::Name.eq(key)),
            )
            .order_by_asc(Column::Id)
            .one(db)
            .await
    }

    pub async fn create<C>(
        db: &C,
        name: &str,
        roll_no: Option<&str>,
        admission_no: Option<&str>,
    ) -> Result<Model, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            name: Set(name.to_string()),
            roll_no: Set(roll_no.map(str::to_string)),
            admission_no: Set(admission_no.map(str::to_string)),
            dob: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
    }
}

impl From<Model> for Participant {
    fn from(m: Model) -> Self {
        Participant {
            id: m.id,
            name: m.name,
            roll_no: m.roll_no,
            admission_no: m.admission_no,
        }
    }
}
