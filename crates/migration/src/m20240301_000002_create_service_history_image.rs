//! Create `service_history_image` table with FK to `service_history`.
//!
//! `public_id` is nullable: present for objects held by the remote store,
//! absent for files under the local upload root.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ServiceHistoryImage::Table)
                    .if_not_exists()
                    .col(pk_auto(ServiceHistoryImage::Id))
                    .col(integer(ServiceHistoryImage::ServiceHistoryId).not_null())
                    .col(string_len(ServiceHistoryImage::ImageUrl, 512).not_null())
                    .col(
                        ColumnDef::new(ServiceHistoryImage::PublicId)
                            .string_len(255)
                            .null(),
                    )
                    .col(timestamp_with_time_zone(ServiceHistoryImage::CreatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_service_history_image_history")
                            .from(ServiceHistoryImage::Table, ServiceHistoryImage::ServiceHistoryId)
                            .to(ServiceHistory::Table, ServiceHistory::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(ServiceHistoryImage::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum ServiceHistoryImage { Table, Id, ServiceHistoryId, ImageUrl, PublicId, CreatedAt }

#[derive(DeriveIden)]
enum ServiceHistory { Table, Id }
