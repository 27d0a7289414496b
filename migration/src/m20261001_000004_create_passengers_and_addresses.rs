use sea_orm_migration::{prelude::*, schema::*};

use super::m20261001_000001_create_users::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Passenger::Table)
                    .if_not_exists()
                    .col(uuid(Passenger::Id).primary_key())
                    .col(uuid(Passenger::UserId).not_null())
                    .col(string_len(Passenger::Name, 255).not_null())
                    .col(string_len(Passenger::Surname, 255).not_null())
                    .col(date(Passenger::DateOfBirth).not_null())
                    .col(
                        timestamp_with_time_zone(Passenger::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_passenger_user")
                            .from(Passenger::Table, Passenger::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Address::Table)
                    .if_not_exists()
                    .col(uuid(Address::Id).primary_key())
                    .col(uuid(Address::UserId).not_null())
                    .col(string_len(Address::Country, 56).not_null())
                    .col(string_len(Address::City, 56).not_null())
                    .col(string_len(Address::Street, 255).not_null())
                    .col(integer(Address::HouseNumber).not_null())
                    .col(integer_null(Address::ApartmentNumber))
                    .col(string_len(Address::MapLink, 255).not_null())
                    .col(
                        timestamp_with_time_zone(Address::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_address_user")
                            .from(Address::Table, Address::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Address::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Passenger::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Passenger {
    Table,
    Id,
    UserId,
    Name,
    Surname,
    DateOfBirth,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Address {
    Table,
    Id,
    UserId,
    Country,
    City,
    Street,
    HouseNumber,
    ApartmentNumber,
    MapLink,
    CreatedAt,
}
