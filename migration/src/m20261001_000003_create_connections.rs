use sea_orm_migration::{prelude::*, schema::*};

use super::m20261001_000002_create_fleet::Bus;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Connection::Table)
                    .if_not_exists()
                    .col(uuid(Connection::Id).primary_key())
                    .col(integer(Connection::Line).not_null())
                    .col(string_len(Connection::DepartureCountry, 56).not_null())
                    .col(string_len(Connection::DestinationCountry, 56).not_null())
                    .col(timestamp_with_time_zone(Connection::DepartureTime).not_null())
                    .col(timestamp_with_time_zone(Connection::ArrivalTime).not_null())
                    .col(big_integer(Connection::Price).not_null())
                    .col(uuid(Connection::BusId).not_null())
                    .col(
                        timestamp_with_time_zone(Connection::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_connection_bus")
                            .from(Connection::Table, Connection::BusId)
                            .to(Bus::Table, Bus::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Connection::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Connection {
    Table,
    Id,
    Line,
    DepartureCountry,
    DestinationCountry,
    DepartureTime,
    ArrivalTime,
    Price,
    BusId,
    CreatedAt,
}
