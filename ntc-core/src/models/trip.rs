use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// A validated half-open `[departure, arrival)` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripWindow {
    departure: DateTime<Utc>,
    arrival: DateTime<Utc>,
}

impl TripWindow {
    pub fn new(departure: DateTime<Utc>, arrival: DateTime<Utc>) -> CoreResult<Self> {
        if departure >= arrival {
            return Err(CoreError::InvalidWindow { departure, arrival });
        }
        Ok(Self { departure, arrival })
    }

    pub fn departure(&self) -> DateTime<Utc> {
        self.departure
    }

    pub fn arrival(&self) -> DateTime<Utc> {
        self.arrival
    }

    pub fn duration(&self) -> Duration {
        self.arrival - self.departure
    }

    /// `[d1, a1)` and `[d2, a2)` overlap iff `d1 < a2 && d2 < a1`, so a trip
    /// may depart at the exact instant the previous one arrives.
    pub fn overlaps(&self, other: &TripWindow) -> bool {
        self.departure < other.arrival && other.departure < self.arrival
    }
}

/// Input for scheduling a trip.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrip {
    pub bus_id: Uuid,
    pub route_id: Uuid,
    pub window: TripWindow,
    pub stops: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub bus_id: Uuid,
    pub route_id: Uuid,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub stops: Vec<String>,
}

impl Trip {
    pub fn new(new_trip: NewTrip) -> Self {
        Self::with_id(Uuid::new_v4(), new_trip)
    }

    pub fn with_id(id: Uuid, new_trip: NewTrip) -> Self {
        Self {
            id,
            bus_id: new_trip.bus_id,
            route_id: new_trip.route_id,
            departure_time: new_trip.window.departure(),
            arrival_time: new_trip.window.arrival(),
            stops: new_trip.stops,
        }
    }

    pub fn window(&self) -> CoreResult<TripWindow> {
        TripWindow::new(self.departure_time, self.arrival_time)
    }
}

/// Explicit trip update: `None` leaves a field as it is, `Some` replaces it.
/// `stops: Some(vec![])` clears the stop list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripPatch {
    #[serde(default)]
    pub bus_id: Option<Uuid>,
    #[serde(default)]
    pub route_id: Option<Uuid>,
    #[serde(default)]
    pub departure_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub arrival_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stops: Option<Vec<String>>,
}

impl TripPatch {
    pub fn is_empty(&self) -> bool {
        self.bus_id.is_none()
            && self.route_id.is_none()
            && self.departure_time.is_none()
            && self.arrival_time.is_none()
            && self.stops.is_none()
    }

    /// Returns the trip as it would look after the patch, with the resulting
    /// window re-validated. The input trip is left untouched.
    pub fn apply(&self, trip: &Trip) -> CoreResult<Trip> {
        let departure = self.departure_time.unwrap_or(trip.departure_time);
        let arrival = self.arrival_time.unwrap_or(trip.arrival_time);
        let window = TripWindow::new(departure, arrival)?;

        Ok(Trip::with_id(
            trip.id,
            NewTrip {
                bus_id: self.bus_id.unwrap_or(trip.bus_id),
                route_id: self.route_id.unwrap_or(trip.route_id),
                window,
                stops: self.stops.clone().unwrap_or_else(|| trip.stops.clone()),
            },
        ))
    }
}
