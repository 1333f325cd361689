use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod identity;
pub mod locks;
pub mod models;
pub mod repository;

pub use identity::{Requester, Role};
pub use locks::KeyedLocks;
pub use models::{
    Bus, LineFilter, NewTrip, Reservation, ReserveRequest, Route, SeatLine, SeatSelection,
    SeatStatus, Ticket, Trip, TripPatch, TripWindow,
};
pub use repository::{BusDirectory, MemoryDirectory, RouteDirectory};

/// Every outcome the engine can hand back to a caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Invalid trip window: departure {departure} must be before arrival {arrival}")]
    InvalidWindow {
        departure: DateTime<Utc>,
        arrival: DateTime<Utc>,
    },
    #[error("Seats already booked: {seats:?}")]
    SeatsUnavailable { seats: Vec<u32> },
    #[error("Bus is already assigned to trip {trip_id} during this time")]
    ScheduleConflict { trip_id: Uuid },
    #[error("No active reservations found for ticket {0}")]
    TicketNotFound(Uuid),
    #[error("Access denied: {0}")]
    Forbidden(String),
    #[error("Resource busy: {0}")]
    Busy(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    /// Only contention is worth retrying with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Busy(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
