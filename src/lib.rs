pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{AppError, AppResult};

use services::BookingService;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub booking: BookingService,
}
