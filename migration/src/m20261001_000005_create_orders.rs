use sea_orm_migration::{prelude::*, schema::*};

use super::m20261001_000001_create_users::User;
use super::m20261001_000002_create_fleet::Seat;
use super::m20261001_000003_create_connections::Connection;
use super::m20261001_000004_create_passengers_and_addresses::{Address, Passenger};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TicketOrder::Table)
                    .if_not_exists()
                    .col(uuid(TicketOrder::Id).primary_key())
                    .col(uuid(TicketOrder::UserId).not_null())
                    .col(uuid(TicketOrder::ConnectionId).not_null())
                    .col(string_len(TicketOrder::Status, 16).not_null())
                    .col(string_len_null(TicketOrder::ReleaseReason, 32))
                    .col(string_len_null(TicketOrder::SessionId, 255))
                    .col(big_integer(TicketOrder::TotalPrice).not_null())
                    .col(string_len(TicketOrder::Email, 255).not_null())
                    .col(string_len(TicketOrder::PhoneNumber, 32).not_null())
                    .col(
                        timestamp_with_time_zone(TicketOrder::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(TicketOrder::CommittedAt))
                    .col(timestamp_with_time_zone_null(TicketOrder::ReleasedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_order_user")
                            .from(TicketOrder::Table, TicketOrder::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_order_connection")
                            .from(TicketOrder::Table, TicketOrder::ConnectionId)
                            .to(Connection::Table, Connection::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Correlation key of gateway callbacks; NULL until the session exists
        manager
            .create_index(
                Index::create()
                    .name("idx_ticket_order_session")
                    .table(TicketOrder::Table)
                    .col(TicketOrder::SessionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // The sweeper scans pending orders by age
        manager
            .create_index(
                Index::create()
                    .name("idx_ticket_order_status_created")
                    .table(TicketOrder::Table)
                    .col(TicketOrder::Status)
                    .col(TicketOrder::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Ticket::Table)
                    .if_not_exists()
                    .col(uuid(Ticket::Id).primary_key())
                    .col(uuid(Ticket::OrderId).not_null())
                    .col(uuid(Ticket::UserId).not_null())
                    .col(uuid(Ticket::ConnectionId).not_null())
                    .col(uuid(Ticket::SeatId).not_null())
                    .col(uuid(Ticket::PassengerId).not_null())
                    .col(uuid(Ticket::PickUpAddressId).not_null())
                    .col(uuid(Ticket::DropOffAddressId).not_null())
                    .col(
                        timestamp_with_time_zone(Ticket::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(Ticket::ConfirmedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_order")
                            .from(Ticket::Table, Ticket::OrderId)
                            .to(TicketOrder::Table, TicketOrder::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_connection")
                            .from(Ticket::Table, Ticket::ConnectionId)
                            .to(Connection::Table, Connection::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_seat")
                            .from(Ticket::Table, Ticket::SeatId)
                            .to(Seat::Table, Seat::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_passenger")
                            .from(Ticket::Table, Ticket::PassengerId)
                            .to(Passenger::Table, Passenger::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_pick_up_address")
                            .from(Ticket::Table, Ticket::PickUpAddressId)
                            .to(Address::Table, Address::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_drop_off_address")
                            .from(Ticket::Table, Ticket::DropOffAddressId)
                            .to(Address::Table, Address::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // A seat can be held by at most one live ticket. Released orders
        // delete their tickets, so this covers exactly the live claims.
        manager
            .create_index(
                Index::create()
                    .name("idx_ticket_connection_seat")
                    .table(Ticket::Table)
                    .col(Ticket::ConnectionId)
                    .col(Ticket::SeatId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Payment::Table)
                    .if_not_exists()
                    .col(uuid(Payment::Id).primary_key())
                    .col(uuid(Payment::OrderId).not_null().unique_key())
                    .col(big_integer(Payment::Price).not_null())
                    .col(string_len(Payment::Method, 16).not_null())
                    .col(string_len(Payment::SessionId, 255).not_null().unique_key())
                    .col(
                        timestamp_with_time_zone(Payment::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_order")
                            .from(Payment::Table, Payment::OrderId)
                            .to(TicketOrder::Table, TicketOrder::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Stop::Table)
                    .if_not_exists()
                    .col(uuid(Stop::Id).primary_key())
                    .col(uuid(Stop::TicketId).not_null())
                    .col(uuid(Stop::ConnectionId).not_null())
                    .col(uuid(Stop::AddressId).not_null())
                    .col(string_len(Stop::Kind, 16).not_null())
                    .col(string_len(Stop::Status, 16).not_null())
                    .col(
                        timestamp_with_time_zone(Stop::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stop_ticket")
                            .from(Stop::Table, Stop::TicketId)
                            .to(Ticket::Table, Ticket::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stop_connection")
                            .from(Stop::Table, Stop::ConnectionId)
                            .to(Connection::Table, Connection::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stop_address")
                            .from(Stop::Table, Stop::AddressId)
                            .to(Address::Table, Address::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Stop::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Payment::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Ticket::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(TicketOrder::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum TicketOrder {
    Table,
    Id,
    UserId,
    ConnectionId,
    Status,
    ReleaseReason,
    SessionId,
    TotalPrice,
    Email,
    PhoneNumber,
    CreatedAt,
    CommittedAt,
    ReleasedAt,
}

#[derive(DeriveIden)]
pub enum Ticket {
    Table,
    Id,
    OrderId,
    UserId,
    ConnectionId,
    SeatId,
    PassengerId,
    PickUpAddressId,
    DropOffAddressId,
    CreatedAt,
    ConfirmedAt,
}

#[derive(DeriveIden)]
pub enum Payment {
    Table,
    Id,
    OrderId,
    Price,
    Method,
    SessionId,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Stop {
    Table,
    Id,
    TicketId,
    ConnectionId,
    AddressId,
    Kind,
    Status,
    CreatedAt,
}
