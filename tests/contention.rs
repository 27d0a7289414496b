mod common;

use std::collections::HashSet;
use std::time::Duration;

use sea_orm::{ColumnTrait, ConnectOptions, Database, EntityTrait, PaginatorTrait, QueryFilter, TransactionTrait};
use uuid::Uuid;

use bus_ticketing_backend::config::BookingConfig;
use bus_ticketing_backend::entities::{address, passenger, payment, ticket, ticket_order};
use bus_ticketing_backend::error::{AppError, AppResult};
use bus_ticketing_backend::services::booking::PurchaseReceipt;
use bus_ticketing_backend::services::ledger::{self, SeatAvailability};
use bus_ticketing_backend::services::BookingService;

use common::{setup, setup_file, setup_on, ScriptedGateway, TestEnv};

async fn row_counts(db: &sea_orm::DatabaseConnection) -> [u64; 5] {
    [
        ticket_order::Entity::find().count(db).await.unwrap(),
        ticket::Entity::find().count(db).await.unwrap(),
        payment::Entity::find().count(db).await.unwrap(),
        passenger::Entity::find().count(db).await.unwrap(),
        address::Entity::find().count(db).await.unwrap(),
    ]
}

/// Exactly one of two overlapping purchases wins; the loser reports a seat
/// from the overlap. Returns the winning receipt.
fn single_winner(
    a: AppResult<PurchaseReceipt>,
    b: AppResult<PurchaseReceipt>,
    overlap: &HashSet<Uuid>,
) -> PurchaseReceipt {
    let (receipt, err) = match (a, b) {
        (Ok(receipt), Err(err)) | (Err(err), Ok(receipt)) => (receipt, err),
        (a, b) => panic!("expected exactly one winner, got {a:?} and {b:?}"),
    };

    match err {
        AppError::SeatAlreadyTaken(seat_id) => assert!(overlap.contains(&seat_id)),
        other => panic!("expected SeatAlreadyTaken, got {other:?}"),
    }

    receipt
}

fn seat_set(env: &TestEnv, numbers: &[i32]) -> HashSet<Uuid> {
    numbers.iter().map(|n| env.seat(*n)).collect()
}

#[tokio::test]
async fn test_same_order_overlap_across_connections() {
    let (env, _db) = setup_file(BookingConfig::default()).await;
    env.gateway.delay_sessions(Duration::from_millis(200));

    let (a, b) = tokio::join!(
        env.booking.purchase(env.customer, env.request(&[1, 2, 3])),
        env.booking.purchase(env.customer, env.request(&[2, 3, 4])),
    );

    let receipt = single_winner(a, b, &seat_set(&env, &[2, 3]));
    assert_eq!(receipt.total_price, 7500);
    assert_eq!(env.gateway.calls(), 1);
    assert_eq!(row_counts(&env.db).await, [1, 3, 1, 3, 2]);

    let winner: HashSet<Uuid> = ticket::Entity::find()
        .filter(ticket::Column::OrderId.eq(receipt.order_id))
        .all(&env.db)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.seat_id)
        .collect();
    assert_eq!(winner.len(), 3);
    assert_eq!(ledger::taken_seats(&env.db, env.connection.id).await.unwrap(), winner);
}

#[tokio::test]
async fn test_reversed_order_overlap_across_connections() {
    let (env, _db) = setup_file(BookingConfig::default()).await;
    env.gateway.delay_sessions(Duration::from_millis(200));

    let (a, b) = tokio::join!(
        env.booking.purchase(env.customer, env.request(&[1, 2, 3, 4])),
        env.booking.purchase(env.customer, env.request(&[4, 3, 2, 1])),
    );

    let receipt = single_winner(a, b, &seat_set(&env, &[1, 2, 3, 4]));
    assert_eq!(env.gateway.calls(), 1);
    assert_eq!(row_counts(&env.db).await, [1, 4, 1, 4, 2]);

    let seats = ledger::seat_map(&env.db, env.connection.id).await.unwrap();
    assert!(seats.iter().all(|s| s.state == SeatAvailability::Pending));

    let order = ticket_order::Entity::find_by_id(receipt.order_id)
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.session_id.as_deref(), Some(receipt.session_id.as_str()));
}

#[tokio::test]
async fn test_disjoint_purchases_across_connections() {
    let (env, _db) = setup_file(BookingConfig::default()).await;
    env.gateway.delay_sessions(Duration::from_millis(100));

    let (a, b) = tokio::join!(
        env.booking.purchase(env.customer, env.request(&[1, 3])),
        env.booking.purchase(env.customer, env.request(&[4, 2])),
    );

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(env.gateway.calls(), 2);
    assert_eq!(
        ledger::taken_seats(&env.db, env.connection.id).await.unwrap(),
        seat_set(&env, &[1, 2, 3, 4])
    );
}

#[tokio::test]
async fn test_purchase_past_deadline_persists_nothing() {
    let env = setup().await;
    env.gateway.delay_sessions(Duration::from_secs(2));

    let config = BookingConfig {
        request_timeout: Duration::from_millis(200),
        ..BookingConfig::default()
    };
    let hurried = BookingService::new(env.db.clone(), env.gateway.clone(), config);

    let err = hurried
        .purchase(env.customer, env.request(&[1, 2]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Timeout));
    assert!(err.is_retryable());
    assert_eq!(env.gateway.calls(), 1);
    assert_eq!(row_counts(&env.db).await, [0, 0, 0, 0, 0]);
    assert!(ledger::taken_seats(&env.db, env.connection.id).await.unwrap().is_empty());

    env.gateway.delay_sessions(Duration::ZERO);
    let receipt = env.booking.purchase(env.customer, env.request(&[1, 2])).await.unwrap();
    assert_eq!(receipt.session_id, "cs_test_2");
    assert_eq!(row_counts(&env.db).await, [1, 2, 1, 2, 2]);
}

#[tokio::test]
async fn test_sweep_is_bounded_by_the_deadline() {
    let env = setup().await;

    let config = BookingConfig {
        request_timeout: Duration::from_millis(100),
        ..BookingConfig::default()
    };
    let hurried = BookingService::new(env.db.clone(), env.gateway.clone(), config);

    // Holds the pool's only connection
    let txn = env.db.begin().await.unwrap();

    let err = hurried.sweep_expired(chrono::Utc::now()).await.unwrap_err();
    assert!(matches!(err, AppError::Timeout));

    txn.rollback().await.unwrap();
    assert_eq!(hurried.sweep_expired(chrono::Utc::now()).await.unwrap(), 0);
}

// Postgres takes row locks on the claim index, so reversed seat orders are
// where a deadlock would surface.
#[tokio::test]
#[ignore] // Requires Postgres - run with: TEST_DATABASE_URL=postgres://... cargo test --test contention -- --ignored
async fn test_reversed_order_overlap_on_postgres() {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let mut options = ConnectOptions::new(url);
    options.max_connections(8).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();

    let prefix = format!("cs_{}", Uuid::new_v4().simple());
    let env = setup_on(db, ScriptedGateway::with_prefix(&prefix), BookingConfig::default()).await;
    env.gateway.delay_sessions(Duration::from_millis(100));

    for _ in 0..10 {
        let (a, b) = tokio::join!(
            env.booking.purchase(env.customer, env.request(&[1, 2, 3, 4])),
            env.booking.purchase(env.customer, env.request(&[4, 3, 2, 1])),
        );
        let receipt = single_winner(a, b, &seat_set(&env, &[1, 2, 3, 4]));

        let held = ticket::Entity::find()
            .filter(ticket::Column::ConnectionId.eq(env.connection.id))
            .count(&env.db)
            .await
            .unwrap();
        assert_eq!(held, 4);

        env.booking.failed(&receipt.session_id).await.unwrap();
        assert!(ledger::taken_seats(&env.db, env.connection.id).await.unwrap().is_empty());
    }
}
