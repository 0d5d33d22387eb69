use crate::entities::applications;
use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Schools)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Applications)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // One application per applicant and school, whatever its status.
        manager
            .create_index(
                Index::create()
                    .name("idx_applications_applicant_school")
                    .table(Applications)
                    .col(applications::Column::ApplicantId)
                    .col(applications::Column::SchoolId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_applications_school_id")
                    .table(Applications)
                    .col(applications::Column::SchoolId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Applications).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Schools).to_owned())
            .await
    }
}
