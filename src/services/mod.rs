pub mod assembler;
pub mod booking;
pub mod ledger;
pub mod payment;
pub mod reconciliation;
pub mod sweeper;

pub use booking::BookingService;
pub use payment::{PaymentGateway, StripeCheckout};
