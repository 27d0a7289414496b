//! Settles pending orders from payment gateway callbacks.
//!
//! Every transition out of `pending` is a conditional update guarded by
//! `status = 'pending'`, so when a success and a failure callback (or the
//! expiry sweeper) race for the same order exactly one of them wins and the
//! others observe a no-op.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::stop::{StopKind, StopStatus};
use crate::entities::ticket_order::{OrderStatus, ReleaseReason};
use crate::entities::{address, passenger, payment, stop, ticket, ticket_order};
use crate::error::{AppError, AppResult};
use crate::services::ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Committed,
    Released,
    AlreadyCommitted,
    AlreadyReleased,
}

async fn find_by_session<C: ConnectionTrait>(
    db: &C,
    session_id: &str,
) -> AppResult<ticket_order::Model> {
    ticket_order::Entity::find()
        .filter(ticket_order::Column::SessionId.eq(session_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::UnknownSession(session_id.to_string()))
}

/// Commit the order behind a successful payment session.
///
/// A session whose order was already released yields
/// [`AppError::StaleSession`]; the order stays released.
pub async fn commit_order(
    db: &DatabaseConnection,
    session_id: &str,
    now: DateTime<Utc>,
) -> AppResult<Outcome> {
    let txn = db.begin().await?;
    let order = find_by_session(&txn, session_id).await?;

    match order.status {
        OrderStatus::Committed => return Ok(Outcome::AlreadyCommitted),
        OrderStatus::Released => return Err(AppError::StaleSession(session_id.to_string())),
        OrderStatus::Pending => {}
    }

    let updated = ticket_order::Entity::update_many()
        .set(ticket_order::ActiveModel {
            status: Set(OrderStatus::Committed),
            committed_at: Set(Some(now.fixed_offset())),
            ..Default::default()
        })
        .filter(ticket_order::Column::Id.eq(order.id))
        .filter(ticket_order::Column::Status.eq(OrderStatus::Pending))
        .exec(&txn)
        .await?;

    if updated.rows_affected == 0 {
        // Another callback settled the order first
        txn.rollback().await?;
        let order = find_by_session(db, session_id).await?;
        return match order.status {
            OrderStatus::Released => Err(AppError::StaleSession(session_id.to_string())),
            _ => Ok(Outcome::AlreadyCommitted),
        };
    }

    let stops = confirm_tickets(&txn, &order, now).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        session_id,
        connection_id = %order.connection_id,
        stops,
        "Order committed"
    );

    Ok(Outcome::Committed)
}

/// Stamp every ticket of the order and create its pick-up and drop-off stops.
/// Returns the number of stops created.
async fn confirm_tickets(
    txn: &DatabaseTransaction,
    order: &ticket_order::Model,
    now: DateTime<Utc>,
) -> AppResult<usize> {
    let now = now.fixed_offset();

    ticket::Entity::update_many()
        .set(ticket::ActiveModel {
            confirmed_at: Set(Some(now)),
            ..Default::default()
        })
        .filter(ticket::Column::OrderId.eq(order.id))
        .exec(txn)
        .await?;

    let tickets = ticket::Entity::find()
        .filter(ticket::Column::OrderId.eq(order.id))
        .all(txn)
        .await?;

    let stops: Vec<stop::ActiveModel> = tickets
        .iter()
        .flat_map(|t| {
            [
                (StopKind::PickUp, t.pick_up_address_id),
                (StopKind::DropOff, t.drop_off_address_id),
            ]
            .map(|(kind, address_id)| stop::ActiveModel {
                id: Set(Uuid::new_v4()),
                ticket_id: Set(t.id),
                connection_id: Set(t.connection_id),
                address_id: Set(address_id),
                kind: Set(kind),
                status: Set(StopStatus::Confirmed),
                created_at: Set(now),
            })
        })
        .collect();

    let count = stops.len();
    if count > 0 {
        stop::Entity::insert_many(stops)
            .exec_without_returning(txn)
            .await?;
    }

    Ok(count)
}

/// Release the order behind a payment session.
/// Committed orders are left untouched.
pub async fn release_order(
    db: &DatabaseConnection,
    session_id: &str,
    reason: ReleaseReason,
    now: DateTime<Utc>,
) -> AppResult<Outcome> {
    let txn = db.begin().await?;
    let order = find_by_session(&txn, session_id).await?;

    match order.status {
        OrderStatus::Committed => return Ok(Outcome::AlreadyCommitted),
        OrderStatus::Released => return Ok(Outcome::AlreadyReleased),
        OrderStatus::Pending => {}
    }

    if !release_pending(&txn, order.id, reason, now).await? {
        txn.rollback().await?;
        let order = find_by_session(db, session_id).await?;
        return Ok(match order.status {
            OrderStatus::Committed => Outcome::AlreadyCommitted,
            _ => Outcome::AlreadyReleased,
        });
    }

    txn.commit().await?;

    tracing::info!(order_id = %order.id, session_id, ?reason, "Order released");

    Ok(Outcome::Released)
}

/// Move a pending order to `released` and purge what it held: payment,
/// tickets (freeing the seats), passengers and addresses. The order row is
/// kept as a tombstone so late callbacks still resolve.
///
/// Returns `false` without touching anything if the order is no longer
/// pending.
pub async fn release_pending(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    reason: ReleaseReason,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let updated = ticket_order::Entity::update_many()
        .set(ticket_order::ActiveModel {
            status: Set(OrderStatus::Released),
            release_reason: Set(Some(reason)),
            released_at: Set(Some(now.fixed_offset())),
            ..Default::default()
        })
        .filter(ticket_order::Column::Id.eq(order_id))
        .filter(ticket_order::Column::Status.eq(OrderStatus::Pending))
        .exec(txn)
        .await?;

    if updated.rows_affected == 0 {
        return Ok(false);
    }

    let tickets = ticket::Entity::find()
        .filter(ticket::Column::OrderId.eq(order_id))
        .all(txn)
        .await?;

    let passenger_ids: HashSet<Uuid> = tickets.iter().map(|t| t.passenger_id).collect();
    let address_ids: HashSet<Uuid> = tickets
        .iter()
        .flat_map(|t| [t.pick_up_address_id, t.drop_off_address_id])
        .collect();

    payment::Entity::delete_many()
        .filter(payment::Column::OrderId.eq(order_id))
        .exec(txn)
        .await?;

    let seats = ledger::release_seats(txn, order_id).await?;

    passenger::Entity::delete_many()
        .filter(passenger::Column::Id.is_in(passenger_ids))
        .exec(txn)
        .await?;

    address::Entity::delete_many()
        .filter(address::Column::Id.is_in(address_ids))
        .exec(txn)
        .await?;

    tracing::debug!(%order_id, seats, "Seats released");

    Ok(true)
}
