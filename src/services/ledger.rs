//! Seat availability per connection.
//!
//! A seat is claimed by the existence of a ticket row; the unique index on
//! `ticket(connection_id, seat_id)` makes a claim linearizable with every
//! other claim on the same connection. Releasing an order deletes its
//! tickets, which returns the seats to the free pool.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sea_orm::{
    sqlx, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, RuntimeErr, Set, SqlErr,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::ticket_order::OrderStatus;
use crate::entities::{connection, seat, ticket, ticket_order};
use crate::error::{AppError, AppResult};
use crate::services::assembler::SeatClaim;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatAvailability {
    Free,
    /// Held by an order that is waiting for its payment callback
    Pending,
    Taken,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatState {
    pub seat_id: Uuid,
    pub number: i32,
    pub state: SeatAvailability,
}

/// Seats held by pending or committed orders on a connection
pub async fn taken_seats<C: ConnectionTrait>(db: &C, connection_id: Uuid) -> AppResult<HashSet<Uuid>> {
    let seats: Vec<Uuid> = ticket::Entity::find()
        .select_only()
        .column(ticket::Column::SeatId)
        .filter(ticket::Column::ConnectionId.eq(connection_id))
        .into_tuple()
        .all(db)
        .await?;

    Ok(seats.into_iter().collect())
}

/// Fail fast if any of `seat_ids` is already held on the connection.
///
/// Runs outside the purchase transaction and takes no locks, so it only
/// saves a doomed transaction; [`claim_seats`] stays the arbiter.
pub async fn ensure_free<C: ConnectionTrait>(
    db: &C,
    connection_id: Uuid,
    seat_ids: &[Uuid],
) -> AppResult<()> {
    let held = ticket::Entity::find()
        .filter(ticket::Column::ConnectionId.eq(connection_id))
        .filter(ticket::Column::SeatId.is_in(seat_ids.iter().copied()))
        .order_by_asc(ticket::Column::SeatId)
        .one(db)
        .await?;

    match held {
        Some(held) => Err(AppError::SeatAlreadyTaken(held.seat_id)),
        None => Ok(()),
    }
}

/// Insert one pending ticket per claim for `order`.
///
/// Must run inside the purchase transaction. Tickets are inserted in
/// ascending seat id order so that overlapping claims lock index entries in
/// the same order and queue behind each other instead of deadlocking. Fails
/// with [`AppError::SeatAlreadyTaken`] if any seat is held, including by a
/// concurrent claim that committed first; the caller then rolls back so no
/// partial claim survives.
pub async fn claim_seats(
    txn: &DatabaseTransaction,
    order: &ticket_order::Model,
    claims: &[SeatClaim],
    now: DateTime<Utc>,
) -> AppResult<Vec<ticket::Model>> {
    let mut ordered: Vec<&SeatClaim> = claims.iter().collect();
    ordered.sort_by_key(|c| c.seat_id);

    let mut tickets = Vec::with_capacity(ordered.len());
    for claim in ordered {
        let ticket = ticket::ActiveModel {
            id: Set(claim.ticket_id),
            order_id: Set(order.id),
            user_id: Set(order.user_id),
            connection_id: Set(order.connection_id),
            seat_id: Set(claim.seat_id),
            passenger_id: Set(claim.passenger_id),
            pick_up_address_id: Set(claim.pick_up_address_id),
            drop_off_address_id: Set(claim.drop_off_address_id),
            created_at: Set(now.fixed_offset()),
            confirmed_at: Set(None),
        }
        .insert(txn)
        .await
        .map_err(|e| claim_error(e, claim.seat_id))?;

        tickets.push(ticket);
    }

    Ok(tickets)
}

fn claim_error(err: DbErr, seat_id: Uuid) -> AppError {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) || is_lock_conflict(&err) {
        tracing::debug!(%seat_id, error = %err, "Seat claimed by a concurrent order");
        return AppError::SeatAlreadyTaken(seat_id);
    }
    AppError::Database(err)
}

/// Postgres deadlock (40P01) or serialization failure (40001). Claims are
/// ordered, so these only surface when another writer locks tickets in a
/// different order; the seat is contended either way.
fn is_lock_conflict(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Exec(e) | DbErr::Query(e) => e,
        _ => return false,
    };

    match runtime {
        RuntimeErr::SqlxError(sqlx::Error::Database(db_err)) => {
            is_lock_conflict_code(db_err.code().as_deref())
        }
        _ => false,
    }
}

fn is_lock_conflict_code(code: Option<&str>) -> bool {
    matches!(code, Some("40P01" | "40001"))
}

/// Drop every seat claim of an order. Returns the number of seats freed.
pub async fn release_seats<C: ConnectionTrait>(db: &C, order_id: Uuid) -> AppResult<u64> {
    let result = ticket::Entity::delete_many()
        .filter(ticket::Column::OrderId.eq(order_id))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Every seat of the connection's bus with its current availability
pub async fn seat_map<C: ConnectionTrait>(db: &C, connection_id: Uuid) -> AppResult<Vec<SeatState>> {
    let connection = connection::Entity::find_by_id(connection_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Connection not found".to_string()))?;

    let seats = seat::Entity::find()
        .filter(seat::Column::BusId.eq(connection.bus_id))
        .order_by_asc(seat::Column::Number)
        .all(db)
        .await?;

    let held: HashMap<Uuid, SeatAvailability> = ticket::Entity::find()
        .filter(ticket::Column::ConnectionId.eq(connection_id))
        .find_also_related(ticket_order::Entity)
        .all(db)
        .await?
        .into_iter()
        .map(|(t, order)| {
            let state = match order.map(|o| o.status) {
                Some(OrderStatus::Committed) => SeatAvailability::Taken,
                _ => SeatAvailability::Pending,
            };
            (t.seat_id, state)
        })
        .collect();

    Ok(seats
        .into_iter()
        .map(|s| SeatState {
            seat_id: s.id,
            number: s.number,
            state: held.get(&s.id).copied().unwrap_or(SeatAvailability::Free),
        })
        .collect())
}
