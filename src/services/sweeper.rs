use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, TransactionTrait};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::entities::ticket_order::{self, OrderStatus, ReleaseReason};
use crate::error::AppResult;
use crate::services::booking::BookingService;
use crate::services::reconciliation::release_pending;

/// Release every order still pending after `ttl`. Returns how many were
/// released. Each order is released in its own transaction; a failure on
/// one is logged and does not stop the others.
pub async fn sweep_expired(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
    ttl: Duration,
) -> AppResult<usize> {
    let cutoff = (now - ttl).fixed_offset();

    let expired: Vec<Uuid> = ticket_order::Entity::find()
        .select_only()
        .column(ticket_order::Column::Id)
        .filter(ticket_order::Column::Status.eq(OrderStatus::Pending))
        .filter(ticket_order::Column::CreatedAt.lt(cutoff))
        .into_tuple()
        .all(db)
        .await?;

    let mut released = 0;
    for order_id in expired {
        match release_expired(db, order_id, now).await {
            Ok(true) => released += 1,
            Ok(false) => {
                tracing::debug!(%order_id, "Order settled before expiry sweep");
            }
            Err(e) => {
                tracing::error!(%order_id, error = %e, "Failed to release expired order");
            }
        }
    }

    if released > 0 {
        tracing::info!(released, "Expired pending orders released");
    }

    Ok(released)
}

async fn release_expired(
    db: &DatabaseConnection,
    order_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let txn = db.begin().await?;
    let released = release_pending(&txn, order_id, ReleaseReason::Expired, now).await?;
    txn.commit().await?;
    Ok(released)
}

/// Lower bound for the sweep period; `tokio::time::interval` panics on zero
pub const MIN_SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(1);

/// Run the sweep on the configured interval for the lifetime of the process
pub fn spawn(booking: BookingService) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = booking.config().sweep_interval.max(MIN_SWEEP_INTERVAL);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let Err(e) = booking.sweep_expired(Utc::now()).await {
                tracing::warn!(error = %e, "Pending order sweep failed");
            }
        }
    })
}
