use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ntc_core::{CoreResult, NewTrip, Trip, TripPatch};
use uuid::Uuid;

pub mod conflict;
pub mod memory;

pub use conflict::find_conflict;
pub use memory::MemoryTripRegistry;

/// Sole writer of trip records. `create` and `update` must run the overlap
/// check and the write as one step per bus.
#[async_trait]
pub trait TripRegistry: Send + Sync {
    async fn create(&self, new_trip: NewTrip) -> CoreResult<Trip>;

    async fn update(&self, trip_id: Uuid, patch: TripPatch) -> CoreResult<Trip>;

    /// Removes the trip. Seat lines of its bus are left alone.
    async fn delete(&self, trip_id: Uuid) -> CoreResult<Trip>;

    async fn get(&self, trip_id: Uuid) -> CoreResult<Option<Trip>>;

    async fn list(&self) -> CoreResult<Vec<Trip>>;

    /// Trips on any of `route_ids` departing within `[from, to)`.
    async fn departing_between(
        &self,
        route_ids: &[Uuid],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<Trip>>;
}
