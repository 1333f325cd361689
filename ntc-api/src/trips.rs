use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::NaiveDate;
use ntc_booking::{CreateTrip, TripAvailability};
use ntc_core::{Requester, Trip, TripPatch};
use ntc_shared::{SeatEvent, TripScheduledEvent};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub start_point: String,
    #[serde(default)]
    pub end_point: String,
    pub date: NaiveDate,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips", get(list_trips).post(create_trip))
        .route("/v1/trips/search", get(search_trips))
        .route(
            "/v1/trips/{trip_id}",
            get(get_trip).patch(update_trip).delete(delete_trip),
        )
}

/// POST /v1/trips
/// Schedule a trip. Rejected when the bus already runs an overlapping trip.
async fn create_trip(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    ApiJson(req): ApiJson<CreateTrip>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let trip = state.engine.create_trip(&requester, req).await?;

    state.events.publish(SeatEvent::TripScheduled(TripScheduledEvent {
        trip_id: trip.id,
        bus_id: trip.bus_id,
        route_id: trip.route_id,
        departure_time: trip.departure_time,
        arrival_time: trip.arrival_time,
    }));

    Ok((StatusCode::CREATED, Json(trip)))
}

/// GET /v1/trips
async fn list_trips(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
) -> Result<Json<Vec<Trip>>, AppError> {
    let trips = state.engine.list_trips(&requester).await?;
    Ok(Json(trips))
}

/// GET /v1/trips/search?start_point=&end_point=&date=YYYY-MM-DD
async fn search_trips(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<Vec<TripAvailability>>, AppError> {
    let results = state
        .engine
        .search_trips(&query.start_point, &query.end_point, query.date)
        .await?;
    Ok(Json(results))
}

/// GET /v1/trips/{trip_id}
async fn get_trip(
    State(state): State<AppState>,
    ApiPath(trip_id): ApiPath<Uuid>,
) -> Result<Json<Trip>, AppError> {
    let trip = state.engine.trip(trip_id).await?;
    Ok(Json(trip))
}

/// PATCH /v1/trips/{trip_id}
/// Absent fields are left unchanged; `"stops": []` clears the stops.
async fn update_trip(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    ApiPath(trip_id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<TripPatch>,
) -> Result<Json<Trip>, AppError> {
    let trip = state.engine.update_trip(&requester, trip_id, patch).await?;
    Ok(Json(trip))
}

/// DELETE /v1/trips/{trip_id}
async fn delete_trip(
    State(state): State<AppState>,
    Extension(requester): Extension<Requester>,
    ApiPath(trip_id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    state.engine.delete_trip(&requester, trip_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
