pub mod engine;
pub mod models;

pub use engine::BookingEngine;
pub use models::{CreateTrip, TripAvailability};
