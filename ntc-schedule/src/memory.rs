use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ntc_core::{CoreError, CoreResult, KeyedLocks, NewTrip, Trip, TripPatch, TripWindow};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{find_conflict, TripRegistry};

const WRITE_ATTEMPTS: usize = 3;

/// In-process registry. Writers hold the per-bus section for the overlap
/// check and the insert; readers go straight to the map.
pub struct MemoryTripRegistry {
    trips: DashMap<Uuid, Trip>,
    bus_locks: KeyedLocks<Uuid>,
}

impl MemoryTripRegistry {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            trips: DashMap::new(),
            bus_locks: KeyedLocks::new(lock_timeout),
        }
    }

    fn trips_of(&self, bus_id: Uuid) -> Vec<Trip> {
        self.trips
            .iter()
            .filter(|t| t.bus_id == bus_id)
            .map(|t| t.value().clone())
            .collect()
    }

    fn snapshot(&self, trip_id: Uuid) -> CoreResult<Trip> {
        self.trips
            .get(&trip_id)
            .map(|t| t.value().clone())
            .ok_or_else(|| CoreError::NotFound(format!("Trip {} not found", trip_id)))
    }

    fn check_overlap(&self, bus_id: Uuid, window: &TripWindow, exclude: Option<Uuid>) -> CoreResult<()> {
        let same_bus = self.trips_of(bus_id);
        match find_conflict(&same_bus, bus_id, window, exclude) {
            Some(existing) => {
                warn!(
                    "Bus {} already runs trip {} between {} and {}",
                    bus_id, existing.id, existing.departure_time, existing.arrival_time
                );
                Err(CoreError::ScheduleConflict { trip_id: existing.id })
            }
            None => Ok(()),
        }
    }
}

impl Default for MemoryTripRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl TripRegistry for MemoryTripRegistry {
    async fn create(&self, new_trip: NewTrip) -> CoreResult<Trip> {
        let _guard = self.bus_locks.acquire(&new_trip.bus_id).await?;
        self.check_overlap(new_trip.bus_id, &new_trip.window, None)?;

        let trip = Trip::new(new_trip);
        self.trips.insert(trip.id, trip.clone());
        info!("Trip {} scheduled for bus {}", trip.id, trip.bus_id);
        Ok(trip)
    }

    async fn update(&self, trip_id: Uuid, patch: TripPatch) -> CoreResult<Trip> {
        for _ in 0..WRITE_ATTEMPTS {
            let seen = self.snapshot(trip_id)?;
            let target_bus = patch.bus_id.unwrap_or(seen.bus_id);
            let _guards = self.bus_locks.acquire_all(&[seen.bus_id, target_bus]).await?;

            // Another writer may have moved the trip while we waited.
            let current = self.snapshot(trip_id)?;
            if current.bus_id != seen.bus_id {
                continue;
            }

            let updated = patch.apply(&current)?;
            self.check_overlap(updated.bus_id, &updated.window()?, Some(trip_id))?;

            // Write in place only; a trip deleted meanwhile stays deleted.
            let mut entry = self
                .trips
                .get_mut(&trip_id)
                .ok_or_else(|| CoreError::NotFound(format!("Trip {} not found", trip_id)))?;
            *entry = updated.clone();
            info!("Trip {} updated", trip_id);
            return Ok(updated);
        }

        Err(CoreError::Busy(format!("trip {} kept changing during update", trip_id)))
    }

    async fn delete(&self, trip_id: Uuid) -> CoreResult<Trip> {
        for _ in 0..WRITE_ATTEMPTS {
            let seen = self.snapshot(trip_id)?;
            let _guard = self.bus_locks.acquire(&seen.bus_id).await?;

            let trip = match self.trips.remove_if(&trip_id, |_, t| t.bus_id == seen.bus_id) {
                Some((_, trip)) => trip,
                None => {
                    // Moved to another bus while we waited, or already gone.
                    self.snapshot(trip_id)?;
                    continue;
                }
            };
            info!("Trip {} deleted", trip_id);
            return Ok(trip);
        }

        Err(CoreError::Busy(format!("trip {} kept changing during delete", trip_id)))
    }

    async fn get(&self, trip_id: Uuid) -> CoreResult<Option<Trip>> {
        Ok(self.trips.get(&trip_id).map(|t| t.value().clone()))
    }

    async fn list(&self) -> CoreResult<Vec<Trip>> {
        let mut trips: Vec<Trip> = self.trips.iter().map(|t| t.value().clone()).collect();
        trips.sort_by_key(|t| (t.departure_time, t.id));
        Ok(trips)
    }

    async fn departing_between(
        &self,
        route_ids: &[Uuid],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<Trip>> {
        let mut trips: Vec<Trip> = self
            .trips
            .iter()
            .filter(|t| {
                route_ids.contains(&t.route_id) && t.departure_time >= from && t.departure_time < to
            })
            .map(|t| t.value().clone())
            .collect();
        trips.sort_by_key(|t| (t.departure_time, t.id));
        Ok(trips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 25, hour, 0, 0).unwrap()
    }

    fn new_trip(bus_id: Uuid, from: u32, to: u32) -> NewTrip {
        NewTrip {
            bus_id,
            route_id: Uuid::new_v4(),
            window: TripWindow::new(at(from), at(to)).unwrap(),
            stops: vec!["Kegalle".into()],
        }
    }

    #[tokio::test]
    async fn test_overlap_rejected_and_boundary_admitted() {
        let registry = MemoryTripRegistry::default();
        let bus_x = Uuid::new_v4();

        let a = registry.create(new_trip(bus_x, 8, 12)).await.unwrap();
        let b = registry.create(new_trip(bus_x, 11, 14)).await;
        assert_eq!(b, Err(CoreError::ScheduleConflict { trip_id: a.id }));

        let c = registry.create(new_trip(bus_x, 12, 15)).await;
        assert!(c.is_ok());
        assert_eq!(registry.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_other_bus_is_unaffected() {
        let registry = MemoryTripRegistry::default();
        registry.create(new_trip(Uuid::new_v4(), 8, 12)).await.unwrap();
        assert!(registry.create(new_trip(Uuid::new_v4(), 8, 12)).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_excludes_itself_but_not_neighbours() {
        let registry = MemoryTripRegistry::default();
        let bus = Uuid::new_v4();
        let morning = registry.create(new_trip(bus, 8, 12)).await.unwrap();
        let evening = registry.create(new_trip(bus, 16, 20)).await.unwrap();

        // Sliding within its own old window is fine.
        let slid = registry
            .update(
                morning.id,
                TripPatch {
                    departure_time: Some(at(9)),
                    arrival_time: Some(at(13)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(slid.departure_time, at(9));
        assert_eq!(slid.stops, morning.stops);

        // Stretching into the evening trip is not.
        let stretched = registry
            .update(
                morning.id,
                TripPatch {
                    arrival_time: Some(at(17)),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(stretched, Err(CoreError::ScheduleConflict { trip_id: evening.id }));
        assert_eq!(registry.get(morning.id).await.unwrap().unwrap().arrival_time, at(13));
    }

    #[tokio::test]
    async fn test_update_moving_bus_checks_the_new_bus() {
        let registry = MemoryTripRegistry::default();
        let (bus_x, bus_y) = (Uuid::new_v4(), Uuid::new_v4());
        let on_x = registry.create(new_trip(bus_x, 8, 12)).await.unwrap();
        let on_y = registry.create(new_trip(bus_y, 10, 11)).await.unwrap();

        let moved = registry
            .update(
                on_x.id,
                TripPatch {
                    bus_id: Some(bus_y),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(moved, Err(CoreError::ScheduleConflict { trip_id: on_y.id }));

        let moved = registry
            .update(
                on_x.id,
                TripPatch {
                    bus_id: Some(bus_y),
                    departure_time: Some(at(12)),
                    arrival_time: Some(at(15)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.bus_id, bus_y);
        // Bus X is free again.
        assert!(registry.create(new_trip(bus_x, 8, 12)).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_window_and_unknown_trip() {
        let registry = MemoryTripRegistry::default();
        let trip = registry.create(new_trip(Uuid::new_v4(), 8, 12)).await.unwrap();

        let inverted = registry
            .update(
                trip.id,
                TripPatch {
                    departure_time: Some(at(12)),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(inverted, Err(CoreError::InvalidWindow { .. })));

        let missing = registry.update(Uuid::new_v4(), TripPatch::default()).await;
        assert!(matches!(missing, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_frees_the_window() {
        let registry = MemoryTripRegistry::default();
        let bus = Uuid::new_v4();
        let trip = registry.create(new_trip(bus, 8, 12)).await.unwrap();

        registry.delete(trip.id).await.unwrap();
        assert!(registry.get(trip.id).await.unwrap().is_none());
        assert!(matches!(registry.delete(trip.id).await, Err(CoreError::NotFound(_))));
        assert!(registry.create(new_trip(bus, 9, 10)).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_waits_for_the_bus_section_and_stays_deleted() {
        let registry = Arc::new(MemoryTripRegistry::default());
        let bus = Uuid::new_v4();
        let trip = registry.create(new_trip(bus, 8, 12)).await.unwrap();

        // Stand in for an update that is midway through its critical section.
        let held = registry.bus_locks.acquire(&bus).await.unwrap();
        let deleting = tokio::spawn({
            let registry = registry.clone();
            async move { registry.delete(trip.id).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!deleting.is_finished());
        assert!(registry.get(trip.id).await.unwrap().is_some());

        drop(held);
        assert_eq!(deleting.await.unwrap().unwrap().id, trip.id);

        let late = registry
            .update(
                trip.id,
                TripPatch {
                    arrival_time: Some(at(13)),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(late, Err(CoreError::NotFound(_))));
        assert!(registry.get(trip.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_busy_while_the_bus_is_locked() {
        let registry = MemoryTripRegistry::new(Duration::from_millis(20));
        let bus = Uuid::new_v4();
        let trip = registry.create(new_trip(bus, 8, 12)).await.unwrap();

        let _held = registry.bus_locks.acquire(&bus).await.unwrap();
        assert!(matches!(registry.delete(trip.id).await, Err(CoreError::Busy(_))));
        assert!(registry.get(trip.id).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_update_and_delete_never_resurrect() {
        for _ in 0..200 {
            let registry = Arc::new(MemoryTripRegistry::default());
            let trip = registry.create(new_trip(Uuid::new_v4(), 8, 12)).await.unwrap();

            let (updated, deleted) = tokio::join!(
                tokio::spawn({
                    let registry = registry.clone();
                    async move {
                        registry
                            .update(
                                trip.id,
                                TripPatch {
                                    arrival_time: Some(at(13)),
                                    ..Default::default()
                                },
                            )
                            .await
                    }
                }),
                tokio::spawn({
                    let registry = registry.clone();
                    async move { registry.delete(trip.id).await }
                }),
            );

            assert!(deleted.unwrap().is_ok());
            let updated = updated.unwrap();
            assert!(updated.is_ok() || matches!(updated, Err(CoreError::NotFound(_))));
            assert!(registry.get(trip.id).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_departing_between_filters_route_and_day() {
        let registry = MemoryTripRegistry::default();
        let first = registry.create(new_trip(Uuid::new_v4(), 8, 12)).await.unwrap();
        let mut other = new_trip(Uuid::new_v4(), 9, 10);
        other.route_id = first.route_id;
        let second = registry.create(other).await.unwrap();
        registry.create(new_trip(Uuid::new_v4(), 8, 9)).await.unwrap();

        let found = registry
            .departing_between(&[first.route_id], at(0), at(9))
            .await
            .unwrap();
        assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![first.id]);

        let found = registry
            .departing_between(&[first.route_id], at(0), at(23))
            .await
            .unwrap();
        assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![first.id, second.id]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overlapping_creates_admit_one() {
        for _ in 0..50 {
            let registry = Arc::new(MemoryTripRegistry::default());
            let bus = Uuid::new_v4();

            let (first, second) = tokio::join!(
                tokio::spawn({
                    let registry = registry.clone();
                    async move { registry.create(new_trip(bus, 8, 12)).await }
                }),
                tokio::spawn({
                    let registry = registry.clone();
                    async move { registry.create(new_trip(bus, 11, 14)).await }
                }),
            );
            let (first, second) = (first.unwrap(), second.unwrap());

            assert!(first.is_ok() ^ second.is_ok());
            let loser = if first.is_ok() { second } else { first };
            assert!(matches!(loser, Err(CoreError::ScheduleConflict { .. })));
            assert_eq!(registry.list().await.unwrap().len(), 1);
        }
    }
}
