use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::ledger::SeatState;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SeatMapResponse {
    pub connection_id: Uuid,
    pub seats: Vec<SeatState>,
}

/// Availability of every seat on a connection
pub async fn seat_map(
    State(state): State<AppState>,
    Path(connection_id): Path<Uuid>,
) -> AppResult<Json<SeatMapResponse>> {
    let seats = state.booking.seat_map(connection_id).await?;
    Ok(Json(SeatMapResponse { connection_id, seats }))
}
