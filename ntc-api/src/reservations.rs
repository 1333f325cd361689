use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use ntc_core::{LineFilter, Requester, Reservation, SeatLine, Ticket};
use ntc_shared::{SeatEvent, SeatsReservedEvent, TicketCancelledEvent};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReserveSeatsRequest {
    pub bus_id: Uuid,
    pub seat_numbers: Vec<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ReservationQuery {
    pub ticket_id: Option<Uuid>,
    pub user_id: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reservations", post(reserve_seats).get(list_reservations))
        .route("/v1/reservations/mine", get(my_reservations))
        .route(
            "/v1/reservations/{ticket_id}",
            get(get_ticket).delete(cancel_ticket),
        )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/reservations
/// Book every requested seat under one new ticket, or none of them.
async fn reserve_seats(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    ApiJson(req): ApiJson<ReserveSeatsRequest>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    let reservation = state
        .engine
        .reserve(&requester, req.bus_id, &req.seat_numbers)
        .await?;

    state.events.publish(SeatEvent::SeatsReserved(SeatsReservedEvent {
        ticket_id: reservation.ticket_id,
        bus_id: reservation.bus_id,
        seat_numbers: reservation.seat_numbers.clone(),
        total_fare: reservation.total_fare,
        reserved_at: Utc::now().timestamp(),
    }));

    Ok((StatusCode::CREATED, Json(reservation)))
}

/// GET /v1/reservations?ticket_id=&user_id=
/// Admin listing of seat lines.
async fn list_reservations(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    ApiQuery(query): ApiQuery<ReservationQuery>,
) -> Result<Json<Vec<SeatLine>>, AppError> {
    let filter = LineFilter {
        ticket_id: query.ticket_id,
        user_id: query.user_id,
    };
    let lines = state.engine.reservations(&requester, &filter).await?;
    Ok(Json(lines))
}

/// GET /v1/reservations/mine
async fn my_reservations(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
) -> Result<Json<Vec<SeatLine>>, AppError> {
    let lines = state.engine.my_reservations(&requester).await?;
    Ok(Json(lines))
}

/// GET /v1/reservations/{ticket_id}
async fn get_ticket(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    ApiPath(ticket_id): ApiPath<Uuid>,
) -> Result<Json<Ticket>, AppError> {
    let ticket = state.engine.ticket(&requester, ticket_id).await?;
    Ok(Json(ticket))
}

/// DELETE /v1/reservations/{ticket_id}
/// Cancel every booked seat of the ticket. Owner or admin only.
async fn cancel_ticket(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    ApiPath(ticket_id): ApiPath<Uuid>,
) -> Result<Json<Ticket>, AppError> {
    let ticket = state.engine.cancel(&requester, ticket_id).await?;

    state.events.publish(SeatEvent::TicketCancelled(TicketCancelledEvent {
        ticket_id: ticket.ticket_id,
        bus_id: ticket.bus_id,
        seat_numbers: ticket.seat_numbers.clone(),
        cancelled_at: Utc::now().timestamp(),
    }));

    Ok(Json(ticket))
}
