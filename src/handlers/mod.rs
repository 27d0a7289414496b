pub mod connections;
pub mod tickets;
