pub mod models;

pub use models::events::{SeatEvent, SeatsReservedEvent, TicketCancelledEvent, TripScheduledEvent};
