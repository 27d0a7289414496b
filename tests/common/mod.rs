#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use bus_ticketing_backend::config::BookingConfig;
use bus_ticketing_backend::entities::user::UserRole;
use bus_ticketing_backend::entities::{bus, connection, seat, user};
use bus_ticketing_backend::services::assembler::{NewAddress, NewPassenger, PurchaseRequest};
use bus_ticketing_backend::services::payment::{CheckoutSession, GatewayError, PaymentGateway};
use bus_ticketing_backend::services::BookingService;

/// Payment gateway double: hands out sequential session ids, or fails on
/// demand. An optional delay keeps the purchase transaction open while a
/// session is "created".
pub struct ScriptedGateway {
    prefix: String,
    fail: AtomicBool,
    delay_ms: AtomicU64,
    calls: AtomicUsize,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::with_prefix("cs_test")
    }
}

impl ScriptedGateway {
    /// Session ids become `{prefix}_{n}`
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            fail: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_sessions(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn delay_sessions(&self, delay: StdDuration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_session(&self, amount: i64) -> Result<CheckoutSession, GatewayError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(StdDuration::from_millis(delay)).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 503,
                message: "provider unavailable".to_string(),
            });
        }

        Ok(CheckoutSession {
            redirect_url: format!("https://pay.example.com/c/{}_{n}?amount={amount}", self.prefix),
            session_id: format!("{}_{n}", self.prefix),
        })
    }
}

pub struct TestEnv {
    pub db: DatabaseConnection,
    pub booking: BookingService,
    pub gateway: Arc<ScriptedGateway>,
    pub customer: Uuid,
    pub connection: connection::Model,
    pub seats: Vec<seat::Model>,
}

impl TestEnv {
    pub fn seat(&self, number: i32) -> Uuid {
        self.seats
            .iter()
            .find(|s| s.number == number)
            .map(|s| s.id)
            .unwrap()
    }

    pub fn request(&self, seat_numbers: &[i32]) -> PurchaseRequest {
        purchase_request(
            self.connection.id,
            seat_numbers.iter().map(|n| self.seat(*n)).collect(),
        )
    }
}

/// In-memory database behind a single connection
pub async fn setup() -> TestEnv {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    setup_on(db, ScriptedGateway::default(), BookingConfig::default()).await
}

/// On-disk SQLite database with a multi-connection pool, so concurrent
/// purchases run on separate connections and contend for the write lock.
/// The file is removed when the returned guard drops.
pub async fn setup_file(config: BookingConfig) -> (TestEnv, TempDb) {
    let temp = TempDb(std::env::temp_dir().join(format!("bus-ticketing-{}.db", Uuid::new_v4())));

    let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", temp.0.display()));
    options.max_connections(8).sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    db.execute_unprepared("PRAGMA journal_mode=WAL").await.unwrap();

    let env = setup_on(db, ScriptedGateway::default(), config).await;
    (env, temp)
}

pub struct TempDb(PathBuf);

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.0.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Migrate `db` and seed one customer, a four-seat bus and a connection.
/// Seed keys are unique so a shared database can be reused across runs.
pub async fn setup_on(
    db: DatabaseConnection,
    gateway: ScriptedGateway,
    config: BookingConfig,
) -> TestEnv {
    migration::Migrator::up(&db, None).await.unwrap();

    let now = Utc::now().fixed_offset();
    let tag = Uuid::new_v4().simple().to_string();

    let customer = create_user(&db, &format!("customer-{tag}@example.com"), UserRole::Customer).await;

    let bus = bus::ActiveModel {
        id: Set(Uuid::new_v4()),
        registration: Set(format!("LV {}", &tag[..8])),
        created_at: Set(now),
    }
    .insert(&db)
    .await
    .unwrap();

    let mut seats = Vec::new();
    for number in 1..=4 {
        let seat = seat::ActiveModel {
            id: Set(Uuid::new_v4()),
            bus_id: Set(bus.id),
            number: Set(number),
        }
        .insert(&db)
        .await
        .unwrap();
        seats.push(seat);
    }

    let departure = Utc::now() + Duration::days(3);
    let connection = connection::ActiveModel {
        id: Set(Uuid::new_v4()),
        line: Set(7),
        departure_country: Set("Ukraine".to_string()),
        destination_country: Set("Poland".to_string()),
        departure_time: Set(departure.fixed_offset()),
        arrival_time: Set((departure + Duration::hours(10)).fixed_offset()),
        price: Set(2500),
        bus_id: Set(bus.id),
        created_at: Set(now),
    }
    .insert(&db)
    .await
    .unwrap();

    let gateway = Arc::new(gateway);
    let booking = BookingService::new(db.clone(), gateway.clone(), config);

    TestEnv {
        db,
        booking,
        gateway,
        customer,
        connection,
        seats,
    }
}

pub async fn create_user(db: &DatabaseConnection, email: &str, role: UserRole) -> Uuid {
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        name: Set("Olena".to_string()),
        role: Set(role),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await
    .unwrap()
    .id
}

pub fn purchase_request(connection_id: Uuid, seat_ids: Vec<Uuid>) -> PurchaseRequest {
    let passengers = (0..seat_ids.len())
        .map(|i| NewPassenger {
            name: format!("Passenger{i}"),
            surname: "Shevchenko".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1988, 3, 9).unwrap(),
        })
        .collect();

    PurchaseRequest {
        connection_id,
        seat_ids,
        passengers,
        pick_up_address: NewAddress {
            country: "Ukraine".to_string(),
            city: "Lviv".to_string(),
            street: "Horodotska".to_string(),
            house_number: 15,
            apartment_number: None,
            map_link: "https://maps.app.goo.gl/pickup".to_string(),
        },
        drop_off_address: NewAddress {
            country: "Poland".to_string(),
            city: "Krakow".to_string(),
            street: "Pawia".to_string(),
            house_number: 5,
            apartment_number: Some(2),
            map_link: "https://www.google.com/maps/place/Krakow".to_string(),
        },
        email: "customer@example.com".to_string(),
        phone_number: "+380 67 123 4567".to_string(),
    }
}
