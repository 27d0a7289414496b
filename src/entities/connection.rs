use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A scheduled departure. Its seats are the seats of the assigned bus.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "connection")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub line: i32,
    pub departure_country: String,
    pub destination_country: String,
    pub departure_time: DateTimeWithTimeZone,
    pub arrival_time: DateTimeWithTimeZone,
    /// Price of one seat in minor currency units
    pub price: i64,
    pub bus_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bus::Entity",
        from = "Column::BusId",
        to = "super::bus::Column::Id"
    )]
    Bus,
    #[sea_orm(has_many = "super::ticket::Entity")]
    Tickets,
}

impl Related<super::bus::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bus.def()
    }
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn has_departed(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.departure_time.with_timezone(&chrono::Utc) <= now
    }

    pub fn estimated_duration_minutes(&self) -> i64 {
        (self.arrival_time - self.departure_time).num_minutes()
    }
}
