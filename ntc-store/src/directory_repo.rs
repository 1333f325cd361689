use async_trait::async_trait;
use ntc_core::repository::{BusDirectory, RouteDirectory};
use ntc_core::{Bus, CoreError, CoreResult, Route};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::map_db_error;

/// Bus and route reference data. Owned by the fleet tooling; the engine only
/// reads it, apart from seeding at startup.
pub struct PgDirectory {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct BusRow {
    id: Uuid,
    bus_number: String,
    capacity: i32,
    route_id: Uuid,
    owner_id: String,
}

impl TryFrom<BusRow> for Bus {
    type Error = CoreError;

    fn try_from(row: BusRow) -> Result<Self, Self::Error> {
        let capacity = u32::try_from(row.capacity).map_err(|_| {
            CoreError::InternalError(format!("Bus {} has negative capacity", row.id))
        })?;
        Ok(Bus {
            id: row.id,
            bus_number: row.bus_number,
            capacity,
            route_id: row.route_id,
            owner_id: row.owner_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    start_point: String,
    end_point: String,
    distance_km: f64,
    fare_per_seat: i64,
}

impl From<RouteRow> for Route {
    fn from(row: RouteRow) -> Self {
        Route {
            id: row.id,
            start_point: row.start_point,
            end_point: row.end_point,
            distance_km: row.distance_km,
            fare_per_seat: row.fare_per_seat,
        }
    }
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert_route(&self, route: &Route) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO routes (id, start_point, end_point, distance_km, fare_per_seat) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET start_point = EXCLUDED.start_point, \
             end_point = EXCLUDED.end_point, distance_km = EXCLUDED.distance_km, \
             fare_per_seat = EXCLUDED.fare_per_seat",
        )
        .bind(route.id)
        .bind(&route.start_point)
        .bind(&route.end_point)
        .bind(route.distance_km)
        .bind(route.fare_per_seat)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        info!("Route {} {} -> {} loaded", route.id, route.start_point, route.end_point);
        Ok(())
    }

    pub async fn upsert_bus(&self, bus: &Bus) -> CoreResult<()> {
        let capacity = i32::try_from(bus.capacity).map_err(|_| {
            CoreError::ValidationError(format!("Bus {} capacity is too large", bus.id))
        })?;
        sqlx::query(
            "INSERT INTO buses (id, bus_number, capacity, route_id, owner_id) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET bus_number = EXCLUDED.bus_number, \
             capacity = EXCLUDED.capacity, route_id = EXCLUDED.route_id, owner_id = EXCLUDED.owner_id",
        )
        .bind(bus.id)
        .bind(&bus.bus_number)
        .bind(capacity)
        .bind(bus.route_id)
        .bind(&bus.owner_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        info!("Bus {} ({}) loaded", bus.bus_number, bus.id);
        Ok(())
    }
}

#[async_trait]
impl BusDirectory for PgDirectory {
    async fn bus(&self, id: Uuid) -> CoreResult<Option<Bus>> {
        let row = sqlx::query_as::<_, BusRow>(
            "SELECT id, bus_number, capacity, route_id, owner_id FROM buses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        row.map(Bus::try_from).transpose()
    }
}

#[async_trait]
impl RouteDirectory for PgDirectory {
    async fn route(&self, id: Uuid) -> CoreResult<Option<Route>> {
        let row = sqlx::query_as::<_, RouteRow>(
            "SELECT id, start_point, end_point, distance_km, fare_per_seat FROM routes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Route::from))
    }

    async fn routes_between(&self, start_point: &str, end_point: &str) -> CoreResult<Vec<Route>> {
        let rows = sqlx::query_as::<_, RouteRow>(
            "SELECT id, start_point, end_point, distance_km, fare_per_seat FROM routes \
             WHERE start_point = $1 AND end_point = $2 ORDER BY id",
        )
        .bind(start_point)
        .bind(end_point)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Route::from).collect())
    }
}
