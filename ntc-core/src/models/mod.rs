pub mod fleet;
pub mod seat;
pub mod trip;

pub use fleet::{Bus, Route};
pub use seat::{LineFilter, Reservation, ReserveRequest, SeatLine, SeatSelection, SeatStatus, Ticket};
pub use trip::{NewTrip, Trip, TripPatch, TripWindow};
