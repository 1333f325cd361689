use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference data for a route. Fares are integer minor currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub start_point: String,
    pub end_point: String,
    pub distance_km: f64,
    pub fare_per_seat: i64,
}

impl Route {
    pub fn connects(&self, start_point: &str, end_point: &str) -> bool {
        self.start_point == start_point && self.end_point == end_point
    }
}

/// A physical bus. Seat numbers run from 1 to `capacity` and are shared by
/// every trip the bus runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bus {
    pub id: Uuid,
    pub bus_number: String,
    pub capacity: u32,
    pub route_id: Uuid,
    pub owner_id: String,
}
