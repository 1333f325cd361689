use chrono::{Duration, NaiveDate, TimeZone, Utc};
use ntc_core::{
    Bus, BusDirectory, CoreError, CoreResult, LineFilter, Requester, Reservation, ReserveRequest,
    Route, RouteDirectory, SeatLine, SeatSelection, Ticket, Trip, TripPatch,
};
use ntc_ledger::{available, Availability, SeatLedger};
use ntc_schedule::TripRegistry;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{CreateTrip, TripAvailability};

/// Front door for every reservation and scheduling request.
pub struct BookingEngine {
    buses: Arc<dyn BusDirectory>,
    routes: Arc<dyn RouteDirectory>,
    ledger: Arc<dyn SeatLedger>,
    trips: Arc<dyn TripRegistry>,
}

impl BookingEngine {
    pub fn new(
        buses: Arc<dyn BusDirectory>,
        routes: Arc<dyn RouteDirectory>,
        ledger: Arc<dyn SeatLedger>,
        trips: Arc<dyn TripRegistry>,
    ) -> Self {
        Self {
            buses,
            routes,
            ledger,
            trips,
        }
    }

    async fn resolve_bus(&self, bus_id: Uuid) -> CoreResult<Bus> {
        self.buses
            .bus(bus_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Bus {} not found", bus_id)))
    }

    async fn resolve_route(&self, route_id: Uuid) -> CoreResult<Route> {
        self.routes
            .route(route_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Route {} not found", route_id)))
    }

    // ---------------------------------------------------------------------
    // Reservations
    // ---------------------------------------------------------------------

    /// Books `seat_numbers` on the bus under a freshly generated ticket id.
    pub async fn reserve(
        &self,
        requester: &Requester,
        bus_id: Uuid,
        seat_numbers: &[u32],
    ) -> CoreResult<Reservation> {
        if seat_numbers.is_empty() {
            return Err(CoreError::ValidationError(
                "At least one seat number is required".to_string(),
            ));
        }

        let bus = self.resolve_bus(bus_id).await?;
        let route = self.resolve_route(bus.route_id).await?;
        let seats = SeatSelection::new(seat_numbers, bus.capacity)?;

        let request = ReserveRequest::new(
            bus.id,
            seats,
            Uuid::new_v4(),
            requester.user_id.clone(),
            route.fare_per_seat,
        )?;

        let reservation = self.ledger.reserve(request).await?;
        info!(
            "User {} reserved {} seat(s) on bus {} (ticket {}, fare {})",
            requester.user_id,
            reservation.seat_numbers.len(),
            bus.id,
            reservation.ticket_id,
            reservation.total_fare
        );
        Ok(reservation)
    }

    pub async fn cancel(&self, requester: &Requester, ticket_id: Uuid) -> CoreResult<Ticket> {
        self.ledger.cancel(ticket_id, requester).await
    }

    /// Ticket view, visible to its owner and to admins.
    pub async fn ticket(&self, requester: &Requester, ticket_id: Uuid) -> CoreResult<Ticket> {
        let ticket = self
            .ledger
            .ticket(ticket_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Ticket {} not found", ticket_id)))?;

        if !requester.may_act_for(&ticket.user_id) {
            return Err(CoreError::Forbidden("Access denied".to_string()));
        }
        Ok(ticket)
    }

    pub async fn reservations(
        &self,
        requester: &Requester,
        filter: &LineFilter,
    ) -> CoreResult<Vec<SeatLine>> {
        requester.require_admin()?;
        self.ledger.lines(filter).await
    }

    pub async fn my_reservations(&self, requester: &Requester) -> CoreResult<Vec<SeatLine>> {
        self.ledger
            .lines(&LineFilter::for_user(requester.user_id.clone()))
            .await
    }

    pub async fn availability(&self, bus_id: Uuid) -> CoreResult<Availability> {
        let bus = self.resolve_bus(bus_id).await?;
        available(self.ledger.as_ref(), &bus).await
    }

    // ---------------------------------------------------------------------
    // Trips
    // ---------------------------------------------------------------------

    pub async fn create_trip(&self, requester: &Requester, input: CreateTrip) -> CoreResult<Trip> {
        requester.require_scheduler()?;
        let new_trip = input.validate()?;
        self.resolve_bus(new_trip.bus_id).await?;
        self.resolve_route(new_trip.route_id).await?;

        self.trips.create(new_trip).await
    }

    pub async fn update_trip(
        &self,
        requester: &Requester,
        trip_id: Uuid,
        patch: TripPatch,
    ) -> CoreResult<Trip> {
        requester.require_scheduler()?;
        if patch.is_empty() {
            return Err(CoreError::ValidationError(
                "No trip fields to update".to_string(),
            ));
        }
        if let Some(bus_id) = patch.bus_id {
            self.resolve_bus(bus_id).await?;
        }
        if let Some(route_id) = patch.route_id {
            self.resolve_route(route_id).await?;
        }

        self.trips.update(trip_id, patch).await
    }

    pub async fn delete_trip(&self, requester: &Requester, trip_id: Uuid) -> CoreResult<Trip> {
        requester.require_scheduler()?;
        self.trips.delete(trip_id).await
    }

    pub async fn list_trips(&self, requester: &Requester) -> CoreResult<Vec<Trip>> {
        requester.require_scheduler()?;
        self.trips.list().await
    }

    pub async fn trip(&self, trip_id: Uuid) -> CoreResult<Trip> {
        self.trips
            .get(trip_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Trip {} not found", trip_id)))
    }

    /// Trips between two points departing on `date` (UTC), each with the
    /// bus's current free-seat estimate.
    pub async fn search_trips(
        &self,
        start_point: &str,
        end_point: &str,
        date: NaiveDate,
    ) -> CoreResult<Vec<TripAvailability>> {
        if start_point.trim().is_empty() || end_point.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Start point and end point are required".to_string(),
            ));
        }

        let routes = self.routes.routes_between(start_point, end_point).await?;
        if routes.is_empty() {
            return Err(CoreError::NotFound(
                "No routes match the search criteria".to_string(),
            ));
        }
        let route_ids: Vec<Uuid> = routes.iter().map(|r| r.id).collect();

        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| CoreError::ValidationError(format!("Invalid date {}", date)))?;
        let day_start = Utc.from_utc_datetime(&midnight);
        let day_end = day_start + Duration::days(1);

        let trips = self
            .trips
            .departing_between(&route_ids, day_start, day_end)
            .await?;

        let mut results = Vec::with_capacity(trips.len());
        for trip in trips {
            let bus = match self.buses.bus(trip.bus_id).await? {
                Some(bus) => bus,
                None => {
                    warn!("Trip {} references missing bus {}", trip.id, trip.bus_id);
                    continue;
                }
            };
            let availability = available(self.ledger.as_ref(), &bus).await?;
            results.push(TripAvailability::new(trip, availability));
        }
        Ok(results)
    }
}
