pub mod address;
pub mod bus;
pub mod connection;
pub mod passenger;
pub mod payment;
pub mod seat;
pub mod stop;
pub mod ticket;
pub mod ticket_order;
pub mod user;
