use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ntc_core::{CoreError, CoreResult, NewTrip, Trip, TripPatch, TripWindow};
use ntc_schedule::TripRegistry;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{begin_bounded, lock_bus, map_db_error, TRIP_LOCK_NAMESPACE};

const TRIP_COLUMNS: &str = "id, bus_id, route_id, departure_time, arrival_time, stops";

pub struct PgTripRegistry {
    pool: PgPool,
    lock_timeout: Duration,
}

#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    bus_id: Uuid,
    route_id: Uuid,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    stops: Vec<String>,
}

impl From<TripRow> for Trip {
    fn from(row: TripRow) -> Self {
        Trip {
            id: row.id,
            bus_id: row.bus_id,
            route_id: row.route_id,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            stops: row.stops,
        }
    }
}

impl PgTripRegistry {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Must run while the bus's advisory lock is held.
    async fn check_overlap(
        tx: &mut Transaction<'static, Postgres>,
        bus_id: Uuid,
        window: &TripWindow,
        exclude: Option<Uuid>,
    ) -> CoreResult<()> {
        let conflicting: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM trips \
             WHERE bus_id = $1 AND departure_time < $2 AND $3 < arrival_time \
             AND ($4::uuid IS NULL OR id <> $4) \
             ORDER BY departure_time LIMIT 1",
        )
        .bind(bus_id)
        .bind(window.arrival())
        .bind(window.departure())
        .bind(exclude)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_db_error)?;

        match conflicting {
            Some(trip_id) => {
                warn!("Bus {} already runs trip {} in that window", bus_id, trip_id);
                Err(CoreError::ScheduleConflict { trip_id })
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TripRegistry for PgTripRegistry {
    async fn create(&self, new_trip: NewTrip) -> CoreResult<Trip> {
        let mut tx = begin_bounded(&self.pool, self.lock_timeout).await?;
        lock_bus(&mut tx, TRIP_LOCK_NAMESPACE, new_trip.bus_id).await?;
        Self::check_overlap(&mut tx, new_trip.bus_id, &new_trip.window, None).await?;

        let trip = Trip::new(new_trip);
        sqlx::query(
            "INSERT INTO trips (id, bus_id, route_id, departure_time, arrival_time, stops) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(trip.id)
        .bind(trip.bus_id)
        .bind(trip.route_id)
        .bind(trip.departure_time)
        .bind(trip.arrival_time)
        .bind(&trip.stops)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        info!("Trip {} scheduled for bus {}", trip.id, trip.bus_id);
        Ok(trip)
    }

    async fn update(&self, trip_id: Uuid, patch: TripPatch) -> CoreResult<Trip> {
        let mut tx = begin_bounded(&self.pool, self.lock_timeout).await?;

        // The row lock pins the trip's current bus for the rest of the transaction.
        let query = format!("SELECT {} FROM trips WHERE id = $1 FOR UPDATE", TRIP_COLUMNS);
        let current: Trip = sqlx::query_as::<_, TripRow>(&query)
            .bind(trip_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_db_error)?
            .map(Trip::from)
            .ok_or_else(|| CoreError::NotFound(format!("Trip {} not found", trip_id)))?;

        let updated = patch.apply(&current)?;

        let mut buses = vec![current.bus_id, updated.bus_id];
        buses.sort();
        buses.dedup();
        for bus_id in buses {
            lock_bus(&mut tx, TRIP_LOCK_NAMESPACE, bus_id).await?;
        }

        Self::check_overlap(&mut tx, updated.bus_id, &updated.window()?, Some(trip_id)).await?;

        sqlx::query(
            "UPDATE trips SET bus_id = $2, route_id = $3, departure_time = $4, arrival_time = $5, \
             stops = $6, updated_at = now() WHERE id = $1",
        )
        .bind(trip_id)
        .bind(updated.bus_id)
        .bind(updated.route_id)
        .bind(updated.departure_time)
        .bind(updated.arrival_time)
        .bind(&updated.stops)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        info!("Trip {} updated", trip_id);
        Ok(updated)
    }

    async fn delete(&self, trip_id: Uuid) -> CoreResult<Trip> {
        let query = format!("DELETE FROM trips WHERE id = $1 RETURNING {}", TRIP_COLUMNS);
        let trip = sqlx::query_as::<_, TripRow>(&query)
            .bind(trip_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .map(Trip::from)
            .ok_or_else(|| CoreError::NotFound(format!("Trip {} not found", trip_id)))?;

        info!("Trip {} deleted", trip_id);
        Ok(trip)
    }

    async fn get(&self, trip_id: Uuid) -> CoreResult<Option<Trip>> {
        let query = format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS);
        let row = sqlx::query_as::<_, TripRow>(&query)
            .bind(trip_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(Trip::from))
    }

    async fn list(&self) -> CoreResult<Vec<Trip>> {
        let query = format!("SELECT {} FROM trips ORDER BY departure_time, id", TRIP_COLUMNS);
        let rows = sqlx::query_as::<_, TripRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Trip::from).collect())
    }

    async fn departing_between(
        &self,
        route_ids: &[Uuid],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<Trip>> {
        let query = format!(
            "SELECT {} FROM trips \
             WHERE route_id = ANY($1) AND departure_time >= $2 AND departure_time < $3 \
             ORDER BY departure_time, id",
            TRIP_COLUMNS
        );
        let rows = sqlx::query_as::<_, TripRow>(&query)
            .bind(route_ids)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Trip::from).collect())
    }
}
