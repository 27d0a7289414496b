pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_users;
mod m20261001_000002_create_fleet;
mod m20261001_000003_create_connections;
mod m20261001_000004_create_passengers_and_addresses;
mod m20261001_000005_create_orders;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_users::Migration),
            Box::new(m20261001_000002_create_fleet::Migration),
            Box::new(m20261001_000003_create_connections::Migration),
            Box::new(m20261001_000004_create_passengers_and_addresses::Migration),
            Box::new(m20261001_000005_create_orders::Migration),
        ]
    }
}
