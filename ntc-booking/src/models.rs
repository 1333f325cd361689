use chrono::{DateTime, Utc};
use ntc_core::{CoreResult, NewTrip, Trip, TripWindow};
use ntc_ledger::Availability;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trip scheduling request as received from a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTrip {
    pub bus_id: Uuid,
    pub route_id: Uuid,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    #[serde(default)]
    pub stops: Vec<String>,
}

impl CreateTrip {
    pub fn validate(self) -> CoreResult<NewTrip> {
        Ok(NewTrip {
            window: TripWindow::new(self.departure_time, self.arrival_time)?,
            bus_id: self.bus_id,
            route_id: self.route_id,
            stops: self.stops,
        })
    }
}

/// A search hit: the trip plus the bus's current free-seat estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripAvailability {
    #[serde(flatten)]
    pub trip: Trip,
    pub capacity: u32,
    pub available_seats: u32,
}

impl TripAvailability {
    pub fn new(trip: Trip, availability: Availability) -> Self {
        Self {
            trip,
            capacity: availability.capacity,
            available_seats: availability.available,
        }
    }
}
