use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::services::assembler::PurchaseRequest;
use crate::services::booking::TicketPage;
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub message: String,
    pub redirect_url: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_size")]
    pub size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_size() -> u64 {
    10
}

/// Reserve seats and start payment
pub async fn purchase_ticket(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PurchaseRequest>,
) -> AppResult<Json<PurchaseResponse>> {
    let receipt = state.booking.purchase(claims.sub, payload).await?;

    Ok(Json(PurchaseResponse {
        message: "Redirect the customer to the payment page to finish the purchase".to_string(),
        redirect_url: receipt.redirect_url,
    }))
}

/// Payment provider redirect after a successful payment.
/// The customer is always sent back to the frontend; problems are only logged.
pub async fn purchase_succeeded(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.booking.succeeded(&session_id).await {
        Ok(outcome) => tracing::info!(%session_id, ?outcome, "Payment success callback handled"),
        Err(AppError::StaleSession(_)) => tracing::error!(
            %session_id,
            "Payment succeeded for an order that was already released, manual refund required"
        ),
        Err(e) => tracing::warn!(%session_id, error = %e, "Payment success callback failed"),
    }

    found(format!("{}/profile/tickets", state.config.frontend_url))
}

/// Payment provider redirect after a failed or cancelled payment
pub async fn purchase_failed(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.booking.failed(&session_id).await {
        Ok(outcome) => tracing::info!(%session_id, ?outcome, "Payment failure callback handled"),
        Err(e) => tracing::warn!(%session_id, error = %e, "Payment failure callback failed"),
    }

    found(format!("{}/connections", state.config.frontend_url))
}

fn found(location: String) -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, location)])
}

/// Tickets of the authenticated customer
pub async fn my_tickets(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<TicketPage>> {
    let page = state.booking.tickets(claims.sub, query.page, query.size).await?;
    Ok(Json(page))
}
