use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bus::Table)
                    .if_not_exists()
                    .col(uuid(Bus::Id).primary_key())
                    .col(string_len(Bus::Registration, 32).not_null().unique_key())
                    .col(
                        timestamp_with_time_zone(Bus::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Seat::Table)
                    .if_not_exists()
                    .col(uuid(Seat::Id).primary_key())
                    .col(uuid(Seat::BusId).not_null())
                    .col(integer(Seat::Number).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_seat_bus")
                            .from(Seat::Table, Seat::BusId)
                            .to(Bus::Table, Bus::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_seat_bus_number")
                    .table(Seat::Table)
                    .col(Seat::BusId)
                    .col(Seat::Number)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Seat::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Bus::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Bus {
    Table,
    Id,
    Registration,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Seat {
    Table,
    Id,
    BusId,
    Number,
}
