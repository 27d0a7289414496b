use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    Set,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::{address, connection, passenger, seat, ticket_order};
use crate::entities::ticket_order::OrderStatus;
use crate::error::{AppError, AppResult, InvalidParam};
use crate::utils::validation::{
    validate_address, validate_email, validate_passenger, validate_phone_number,
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewPassenger {
    pub name: String,
    pub surname: String,
    pub date_of_birth: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAddress {
    pub country: String,
    pub city: String,
    pub street: String,
    pub house_number: i32,
    pub apartment_number: Option<i32>,
    pub map_link: String,
}

/// Raw purchase request: `seat_ids[i]` is assigned to `passengers[i]`.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    pub connection_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub passengers: Vec<NewPassenger>,
    pub pick_up_address: NewAddress,
    pub drop_off_address: NewAddress,
    pub email: String,
    pub phone_number: String,
}

/// A ticket to be inserted for one seat of the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatClaim {
    pub ticket_id: Uuid,
    pub seat_id: Uuid,
    pub passenger_id: Uuid,
    pub pick_up_address_id: Uuid,
    pub drop_off_address_id: Uuid,
}

/// A validated order whose records have not been written yet.
#[derive(Debug)]
pub struct AssembledOrder {
    pub order_id: Uuid,
    pub connection_id: Uuid,
    pub total_price: i64,
    pub claims: Vec<SeatClaim>,
    order: ticket_order::ActiveModel,
    passengers: Vec<passenger::ActiveModel>,
    addresses: Vec<address::ActiveModel>,
}

impl AssembledOrder {
    /// Write passengers, addresses and the pending order row.
    /// Seats are claimed separately, in the same transaction.
    pub async fn persist(
        self,
        txn: &DatabaseTransaction,
    ) -> AppResult<(ticket_order::Model, Vec<SeatClaim>)> {
        passenger::Entity::insert_many(self.passengers)
            .exec_without_returning(txn)
            .await?;

        address::Entity::insert_many(self.addresses)
            .exec_without_returning(txn)
            .await?;

        let order = self.order.insert(txn).await?;

        Ok((order, self.claims))
    }
}

/// Validate a purchase request and build its records.
///
/// Every problem found is reported at once as [`AppError::Validation`];
/// nothing is written to the database.
pub async fn assemble<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    mut request: PurchaseRequest,
    now: DateTime<Utc>,
) -> AppResult<AssembledOrder> {
    let mut params = Vec::new();

    if request.seat_ids.len() != request.passengers.len() {
        params.push(InvalidParam::new(
            "seat_ids",
            "The seats number and the passengers number have to be equal.",
        ));
    }

    if request.seat_ids.is_empty() {
        params.push(InvalidParam::new("seat_ids", "At least one seat is required."));
    }

    let mut seen = HashSet::new();
    for (i, seat_id) in request.seat_ids.iter().enumerate() {
        if !seen.insert(*seat_id) {
            params.push(InvalidParam::new(
                format!("seat_ids[{i}]"),
                format!("Seat {seat_id} is requested more than once."),
            ));
        }
    }

    let today = now.date_naive();
    for (i, p) in request.passengers.iter().enumerate() {
        params.extend(validate_passenger(p, today, &format!("passengers[{i}]")));
    }

    params.extend(validate_address(&request.pick_up_address, "pick_up_address"));
    params.extend(validate_address(&request.drop_off_address, "drop_off_address"));

    if let Err(reason) = validate_email(&request.email) {
        params.push(InvalidParam::new("email", reason));
    }
    match validate_phone_number(&request.phone_number) {
        Ok(normalized) => request.phone_number = normalized,
        Err(reason) => params.push(InvalidParam::new("phone_number", reason)),
    }

    let connection = connection::Entity::find_by_id(request.connection_id)
        .one(db)
        .await?;

    match &connection {
        None => params.push(InvalidParam::new(
            "connection_id",
            "Connection does not exist.",
        )),
        Some(c) => {
            if c.has_departed(now) {
                params.push(InvalidParam::new(
                    "connection_id",
                    "Connection has already departed.",
                ));
            }

            let known: HashSet<Uuid> = seat::Entity::find()
                .filter(seat::Column::BusId.eq(c.bus_id))
                .filter(seat::Column::Id.is_in(seen.iter().copied()))
                .all(db)
                .await?
                .into_iter()
                .map(|s| s.id)
                .collect();

            for (i, seat_id) in request.seat_ids.iter().enumerate() {
                if !known.contains(seat_id) {
                    params.push(InvalidParam::new(
                        format!("seat_ids[{i}]"),
                        format!("Seat {seat_id} does not exist on this connection."),
                    ));
                }
            }
        }
    }

    let connection = match connection {
        Some(c) if params.is_empty() => c,
        _ => return Err(AppError::Validation(params)),
    };

    Ok(build(user_id, &connection, request, now))
}

fn build(
    user_id: Uuid,
    connection: &connection::Model,
    request: PurchaseRequest,
    now: DateTime<Utc>,
) -> AssembledOrder {
    let created_at = now.fixed_offset();
    let order_id = Uuid::new_v4();

    let new_address = |a: NewAddress| {
        let id = Uuid::new_v4();
        let model = address::ActiveModel {
            id: Set(id),
            user_id: Set(user_id),
            country: Set(a.country.trim().to_string()),
            city: Set(a.city.trim().to_string()),
            street: Set(a.street.trim().to_string()),
            house_number: Set(a.house_number),
            apartment_number: Set(a.apartment_number),
            map_link: Set(a.map_link.trim().to_string()),
            created_at: Set(created_at),
        };
        (id, model)
    };

    let (pick_up_address_id, pick_up) = new_address(request.pick_up_address);
    let (drop_off_address_id, drop_off) = new_address(request.drop_off_address);

    let mut passengers = Vec::with_capacity(request.passengers.len());
    let mut claims = Vec::with_capacity(request.seat_ids.len());

    for (seat_id, p) in request.seat_ids.into_iter().zip(request.passengers) {
        let passenger_id = Uuid::new_v4();
        passengers.push(passenger::ActiveModel {
            id: Set(passenger_id),
            user_id: Set(user_id),
            name: Set(p.name.trim().to_string()),
            surname: Set(p.surname.trim().to_string()),
            date_of_birth: Set(p.date_of_birth),
            created_at: Set(created_at),
        });
        claims.push(SeatClaim {
            ticket_id: Uuid::new_v4(),
            seat_id,
            passenger_id,
            pick_up_address_id,
            drop_off_address_id,
        });
    }

    let total_price = connection.price * claims.len() as i64;

    let order = ticket_order::ActiveModel {
        id: Set(order_id),
        user_id: Set(user_id),
        connection_id: Set(connection.id),
        status: Set(OrderStatus::Pending),
        release_reason: Set(None),
        session_id: Set(None),
        total_price: Set(total_price),
        email: Set(request.email.trim().to_string()),
        phone_number: Set(request.phone_number),
        created_at: Set(created_at),
        committed_at: Set(None),
        released_at: Set(None),
    };

    AssembledOrder {
        order_id,
        connection_id: connection.id,
        total_price,
        claims,
        order,
        passengers,
        addresses: vec![pick_up, drop_off],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(seats: usize) -> PurchaseRequest {
        PurchaseRequest {
            connection_id: Uuid::new_v4(),
            seat_ids: (0..seats).map(|_| Uuid::new_v4()).collect(),
            passengers: (0..seats)
                .map(|i| NewPassenger {
                    name: format!("Passenger {i}"),
                    surname: "Nowak".to_string(),
                    date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
                })
                .collect(),
            pick_up_address: NewAddress {
                country: "Ukraine".to_string(),
                city: " Lviv ".to_string(),
                street: "Shevchenka".to_string(),
                house_number: 3,
                apartment_number: Some(7),
                map_link: "https://maps.app.goo.gl/lviv".to_string(),
            },
            drop_off_address: NewAddress {
                country: "Poland".to_string(),
                city: "Warsaw".to_string(),
                street: "Marszalkowska".to_string(),
                house_number: 100,
                apartment_number: None,
                map_link: "https://maps.app.goo.gl/warsaw".to_string(),
            },
            email: "buyer@example.com".to_string(),
            phone_number: "+380501112233".to_string(),
        }
    }

    fn connection_model(price: i64) -> connection::Model {
        let now = Utc::now();
        connection::Model {
            id: Uuid::new_v4(),
            line: 4,
            departure_country: "Ukraine".to_string(),
            destination_country: "Poland".to_string(),
            departure_time: (now + Duration::days(2)).fixed_offset(),
            arrival_time: (now + Duration::days(2) + Duration::hours(9)).fixed_offset(),
            price,
            bus_id: Uuid::new_v4(),
            created_at: now.fixed_offset(),
        }
    }

    #[test]
    fn test_build_pairs_each_seat_with_a_new_passenger() {
        let req = request(3);
        let seat_ids = req.seat_ids.clone();
        let conn = connection_model(2500);

        let order = build(Uuid::new_v4(), &conn, req, Utc::now());

        assert_eq!(order.total_price, 7500);
        assert_eq!(order.connection_id, conn.id);
        assert_eq!(order.passengers.len(), 3);
        assert_eq!(order.addresses.len(), 2);

        let claimed: Vec<Uuid> = order.claims.iter().map(|c| c.seat_id).collect();
        assert_eq!(claimed, seat_ids);

        let passengers: HashSet<Uuid> = order.claims.iter().map(|c| c.passenger_id).collect();
        assert_eq!(passengers.len(), 3);

        // All tickets of one order share the same pick-up and drop-off
        assert!(order
            .claims
            .windows(2)
            .all(|w| w[0].pick_up_address_id == w[1].pick_up_address_id
                && w[0].drop_off_address_id == w[1].drop_off_address_id));
    }

    #[test]
    fn test_build_trims_user_input() {
        let conn = connection_model(1000);
        let order = build(Uuid::new_v4(), &conn, request(1), Utc::now());

        assert_eq!(order.addresses[0].city, Set("Lviv".to_string()));
        assert_eq!(order.order.status, Set(OrderStatus::Pending));
    }
}
