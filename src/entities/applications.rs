use sea_orm::entity::prelude::*;

use crate::domain::ApplicationStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "applications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub applicant_id: i32,

    pub school_id: i32,

    pub student_name: String,

    pub email: String,

    pub phone: Option<String>,

    pub guardian_name: Option<String>,

    pub guardian_phone: Option<String>,

    pub current_grade: Option<String>,

    pub applying_grade: Option<String>,

    pub notes: Option<String>,

    pub status: ApplicationStatus,

    /// Present iff status is rejected
    pub rejection_reason: Option<String>,

    /// Present iff status is approved or rejected
    pub reviewer_id: Option<i32>,

    pub reviewed_at: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::ApplicantId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Applicant,
    #[sea_orm(
        belongs_to = "super::schools::Entity",
        from = "Column::SchoolId",
        to = "super::schools::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    School,
}

impl Related<super::schools::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::School.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
