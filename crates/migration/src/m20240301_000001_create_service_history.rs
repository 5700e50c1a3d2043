//! Create `service_history` table.
//!
//! One row per rendered service. Customer, service and employee ids point into
//! tables owned by the back-office screens and are not constrained here.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ServiceHistory::Table)
                    .if_not_exists()
                    .col(pk_auto(ServiceHistory::Id))
                    .col(integer(ServiceHistory::CustomerId).not_null())
                    .col(integer(ServiceHistory::ServiceId).not_null())
                    .col(integer(ServiceHistory::EmployeeId).not_null())
                    .col(date(ServiceHistory::ServiceDate).not_null())
                    .col(double(ServiceHistory::Price).not_null())
                    .col(string_len(ServiceHistory::PaymentMethod, 64).not_null())
                    .col(
                        ColumnDef::new(ServiceHistory::Notes)
                            .text()
                            .null(),
                    )
                    .col(timestamp_with_time_zone(ServiceHistory::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(ServiceHistory::UpdatedAt).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(ServiceHistory::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum ServiceHistory {
    Table,
    Id,
    CustomerId,
    ServiceId,
    EmployeeId,
    ServiceDate,
    Price,
    PaymentMethod,
    Notes,
    CreatedAt,
    UpdatedAt,
}
