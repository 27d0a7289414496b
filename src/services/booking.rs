use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use crate::config::BookingConfig;
use crate::entities::payment::PaymentMethod;
use crate::entities::ticket_order::{OrderStatus, ReleaseReason};
use crate::entities::{connection, passenger, payment, seat, ticket, ticket_order};
use crate::error::{AppError, AppResult, InvalidParam};
use crate::services::assembler::{self, AssembledOrder, PurchaseRequest};
use crate::services::ledger::{self, SeatState};
use crate::services::payment::PaymentGateway;
use crate::services::reconciliation::{self, Outcome};
use crate::services::sweeper;

pub const MAX_PAGE_SIZE: u64 = 50;

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub order_id: Uuid,
    pub session_id: String,
    pub redirect_url: String,
    pub total_price: i64,
}

#[derive(Debug, Serialize)]
pub struct ConnectionSummary {
    pub id: Uuid,
    pub line: i32,
    pub departure_country: String,
    pub destination_country: String,
    pub departure_time: DateTime<chrono::FixedOffset>,
    pub arrival_time: DateTime<chrono::FixedOffset>,
    pub estimated_duration_minutes: i64,
}

impl From<&connection::Model> for ConnectionSummary {
    fn from(c: &connection::Model) -> Self {
        Self {
            id: c.id,
            line: c.line,
            departure_country: c.departure_country.clone(),
            destination_country: c.destination_country.clone(),
            departure_time: c.departure_time,
            arrival_time: c.arrival_time,
            estimated_duration_minutes: c.estimated_duration_minutes(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PassengerSummary {
    pub name: String,
    pub surname: String,
    pub date_of_birth: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct TicketView {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub seat_number: Option<i32>,
    pub passenger: Option<PassengerSummary>,
    pub connection: Option<ConnectionSummary>,
    pub created_at: DateTime<chrono::FixedOffset>,
}

#[derive(Debug, Serialize)]
pub struct TicketPage {
    pub items: Vec<TicketView>,
    pub page: u64,
    pub size: u64,
    pub total: u64,
}

/// Purchases and settles seat reservations.
///
/// Stateless apart from its handles: every coordination point between
/// concurrent requests lives in the database.
#[derive(Clone)]
pub struct BookingService {
    db: DatabaseConnection,
    gateway: Arc<dyn PaymentGateway>,
    config: BookingConfig,
}

impl BookingService {
    pub fn new(db: DatabaseConnection, gateway: Arc<dyn PaymentGateway>, config: BookingConfig) -> Self {
        Self { db, gateway, config }
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    async fn with_deadline<T>(&self, fut: impl Future<Output = AppResult<T>>) -> AppResult<T> {
        tokio::time::timeout(self.config.request_timeout, fut)
            .await
            .map_err(|_| AppError::Timeout)?
    }

    /// Reserve the requested seats and open a payment session for them.
    ///
    /// On success exactly one pending order exists holding the seats, and
    /// the returned session id resolves to it. On any failure nothing is
    /// persisted.
    pub async fn purchase(&self, user_id: Uuid, request: PurchaseRequest) -> AppResult<PurchaseReceipt> {
        self.with_deadline(async {
            let now = Utc::now();
            let connection_id = request.connection_id;

            let assembled = assembler::assemble(&self.db, user_id, request, now).await?;
            let seat_ids: Vec<Uuid> = assembled.claims.iter().map(|c| c.seat_id).collect();
            ledger::ensure_free(&self.db, connection_id, &seat_ids).await?;

            let txn = self.db.begin().await?;
            match self.reserve(&txn, assembled, now).await {
                Ok(receipt) => {
                    txn.commit().await?;
                    tracing::info!(
                        order_id = %receipt.order_id,
                        session_id = %receipt.session_id,
                        %user_id,
                        %connection_id,
                        total_price = receipt.total_price,
                        "Seats reserved, awaiting payment"
                    );
                    Ok(receipt)
                }
                Err(e) => {
                    txn.rollback().await?;
                    Err(e)
                }
            }
        })
        .await
    }

    async fn reserve(
        &self,
        txn: &DatabaseTransaction,
        assembled: AssembledOrder,
        now: DateTime<Utc>,
    ) -> AppResult<PurchaseReceipt> {
        let total_price = assembled.total_price;
        let (order, claims) = assembled.persist(txn).await?;

        ledger::claim_seats(txn, &order, &claims, now).await?;

        let session = self.gateway.create_session(total_price).await.map_err(|e| {
            tracing::warn!(order_id = %order.id, error = %e, "Payment session could not be created");
            AppError::PaymentGatewayUnavailable(e.to_string())
        })?;

        let order_id = order.id;
        let mut order: ticket_order::ActiveModel = order.into();
        order.session_id = Set(Some(session.session_id.clone()));
        order.update(txn).await?;

        payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            price: Set(total_price),
            method: Set(PaymentMethod::Card),
            session_id: Set(session.session_id.clone()),
            created_at: Set(now.fixed_offset()),
        }
        .insert(txn)
        .await?;

        Ok(PurchaseReceipt {
            order_id,
            session_id: session.session_id,
            redirect_url: session.redirect_url,
            total_price,
        })
    }

    /// Payment succeeded callback
    pub async fn succeeded(&self, session_id: &str) -> AppResult<Outcome> {
        self.with_deadline(reconciliation::commit_order(&self.db, session_id, Utc::now()))
            .await
    }

    /// Payment failed or cancelled callback
    pub async fn failed(&self, session_id: &str) -> AppResult<Outcome> {
        self.with_deadline(reconciliation::release_order(
            &self.db,
            session_id,
            ReleaseReason::PaymentFailed,
            Utc::now(),
        ))
        .await
    }

    /// Release pending orders older than the configured TTL. Bounded by the
    /// request deadline like every other entry point.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<usize> {
        self.with_deadline(sweeper::sweep_expired(&self.db, now, self.config.pending_order_ttl))
            .await
    }

    pub async fn seat_map(&self, connection_id: Uuid) -> AppResult<Vec<SeatState>> {
        self.with_deadline(ledger::seat_map(&self.db, connection_id)).await
    }

    /// The user's live tickets, newest first. `page` is 1-based.
    pub async fn tickets(&self, user_id: Uuid, page: u64, size: u64) -> AppResult<TicketPage> {
        let mut params = Vec::new();
        if page == 0 {
            params.push(InvalidParam::new("page", "Must be at least 1."));
        }
        if size == 0 || size > MAX_PAGE_SIZE {
            params.push(InvalidParam::new(
                "size",
                format!("Must be between 1 and {MAX_PAGE_SIZE}."),
            ));
        }
        if !params.is_empty() {
            return Err(AppError::Validation(params));
        }

        self.with_deadline(self.load_tickets(user_id, page, size)).await
    }

    async fn load_tickets(&self, user_id: Uuid, page: u64, size: u64) -> AppResult<TicketPage> {
        let paginator = ticket::Entity::find()
            .filter(ticket::Column::UserId.eq(user_id))
            .order_by_desc(ticket::Column::CreatedAt)
            .order_by_asc(ticket::Column::Id)
            .paginate(&self.db, size);

        let total = paginator.num_items().await?;
        let tickets = paginator.fetch_page(page - 1).await?;

        let orders: HashMap<Uuid, ticket_order::Model> = ticket_order::Entity::find()
            .filter(ticket_order::Column::Id.is_in(tickets.iter().map(|t| t.order_id)))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|o| (o.id, o))
            .collect();

        let connections: HashMap<Uuid, connection::Model> = connection::Entity::find()
            .filter(connection::Column::Id.is_in(tickets.iter().map(|t| t.connection_id)))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let seats: HashMap<Uuid, i32> = seat::Entity::find()
            .filter(seat::Column::Id.is_in(tickets.iter().map(|t| t.seat_id)))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|s| (s.id, s.number))
            .collect();

        let passengers: HashMap<Uuid, passenger::Model> = passenger::Entity::find()
            .filter(passenger::Column::Id.is_in(tickets.iter().map(|t| t.passenger_id)))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let items = tickets
            .into_iter()
            .map(|t| TicketView {
                id: t.id,
                order_id: t.order_id,
                status: orders
                    .get(&t.order_id)
                    .map(|o| o.status)
                    .unwrap_or(OrderStatus::Pending),
                seat_number: seats.get(&t.seat_id).copied(),
                passenger: passengers.get(&t.passenger_id).map(|p| PassengerSummary {
                    name: p.name.clone(),
                    surname: p.surname.clone(),
                    date_of_birth: p.date_of_birth,
                }),
                connection: connections.get(&t.connection_id).map(ConnectionSummary::from),
                created_at: t.created_at,
            })
            .collect();

        Ok(TicketPage {
            items,
            page,
            size,
            total,
        })
    }
}
