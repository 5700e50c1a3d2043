use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Images: listed and cascaded by owning record
        manager
            .create_index(
                Index::create()
                    .name("idx_service_history_image_history")
                    .table(ServiceHistoryImage::Table)
                    .col(ServiceHistoryImage::ServiceHistoryId)
                    .to_owned(),
            )
            .await?;

        // Images: migration sweep selects by missing public_id
        manager
            .create_index(
                Index::create()
                    .name("idx_service_history_image_public_id")
                    .table(ServiceHistoryImage::Table)
                    .col(ServiceHistoryImage::PublicId)
                    .to_owned(),
            )
            .await?;

        // ServiceHistory: customer timeline
        manager
            .create_index(
                Index::create()
                    .name("idx_service_history_customer_date")
                    .table(ServiceHistory::Table)
                    .col(ServiceHistory::CustomerId)
                    .col(ServiceHistory::ServiceDate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_service_history_customer_date").table(ServiceHistory::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_service_history_image_public_id").table(ServiceHistoryImage::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_service_history_image_history").table(ServiceHistoryImage::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ServiceHistoryImage { Table, ServiceHistoryId, PublicId }

#[derive(DeriveIden)]
enum ServiceHistory { Table, CustomerId, ServiceDate }
