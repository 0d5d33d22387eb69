use sea_orm::entity::prelude::*;

/// One-time login code. At most one live row per email: issuing a new code
/// deletes every older row for the same email first.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "verification_codes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub email: String,

    /// 6-digit numeric code
    pub code: String,

    /// RFC 3339 UTC
    pub expires_at: String,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
