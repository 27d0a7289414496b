use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::{connections, tickets};
use crate::middleware::auth::{auth_middleware, require_customer};
use crate::middleware::rate_limit::create_public_governor;
use crate::middleware::role_rate_limit::create_customer_governor;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let public_governor = create_public_governor();
    let customer_governor = create_customer_governor();

    // Payment provider redirects and seat availability (rate limited per IP)
    let public_routes = Router::new()
        .route(
            "/connection/purchase-ticket/succeeded/{session_id}",
            get(tickets::purchase_succeeded),
        )
        .route(
            "/connection/purchase-ticket/failed/{session_id}",
            get(tickets::purchase_failed),
        )
        .route("/connections/{id}/seats", get(connections::seat_map))
        .layer(public_governor);

    // Customer routes (requires auth + customer role, rate limited per user)
    let customer_routes = Router::new()
        .route("/connection/purchase-ticket", post(tickets::purchase_ticket))
        .route("/connection/tickets", get(tickets::my_tickets))
        .layer(customer_governor)
        .layer(middleware::from_fn(require_customer))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(customer_routes)
        .with_state(state)
}
