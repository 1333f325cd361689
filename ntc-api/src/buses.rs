use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use ntc_ledger::Availability;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{error::AppError, extract::ApiPath, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/buses/{bus_id}/availability", get(get_availability))
        .route("/v1/buses/{bus_id}/stream", get(stream_seat_events))
}

/// GET /v1/buses/{bus_id}/availability
async fn get_availability(
    State(state): State<AppState>,
    ApiPath(bus_id): ApiPath<Uuid>,
) -> Result<Json<Availability>, AppError> {
    let availability = state.engine.availability(bus_id).await?;
    Ok(Json(availability))
}

/// GET /v1/buses/{bus_id}/stream
/// Server-sent seat and schedule events for one bus.
async fn stream_seat_events(
    State(state): State<AppState>,
    ApiPath(bus_id): ApiPath<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // 404 for unknown buses instead of an idle stream.
    state.engine.availability(bus_id).await?;

    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.bus_id() == bus_id => Event::default()
                .event(event.topic())
                .json_data(&event)
                .ok()
                .map(Ok),
            // Lagged receivers skip what they missed.
            _ => None,
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
