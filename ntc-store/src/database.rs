use ntc_core::CoreError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, Transaction};
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

/// Advisory lock namespaces. Seat writes and schedule writes on the same bus
/// never contend with each other.
pub(crate) const SEAT_LOCK_NAMESPACE: i32 = 0x5345_4154;
pub(crate) const TRIP_LOCK_NAMESPACE: i32 = 0x5452_4950;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Opens a transaction whose lock waits give up after `lock_timeout`.
pub(crate) async fn begin_bounded(
    pool: &Pool<Postgres>,
    lock_timeout: Duration,
) -> Result<Transaction<'static, Postgres>, CoreError> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;
    // SET does not take bind parameters; the value is a plain integer.
    let statement = format!("SET LOCAL lock_timeout = '{}ms'", lock_timeout.as_millis());
    sqlx::query(&statement)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;
    Ok(tx)
}

/// Takes the transaction-scoped advisory lock for one bus.
pub(crate) async fn lock_bus(
    tx: &mut Transaction<'static, Postgres>,
    namespace: i32,
    bus_id: Uuid,
) -> Result<(), CoreError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(namespace)
        .bind(advisory_key(bus_id))
        .execute(&mut **tx)
        .await
        .map_err(map_db_error)?;
    Ok(())
}

/// Folds a bus id into the 32-bit key of the two-key advisory lock form.
/// Collisions only serialize unrelated buses.
pub(crate) fn advisory_key(bus_id: Uuid) -> i32 {
    let bits = bus_id.as_u128();
    let folded = (bits as u32) ^ ((bits >> 32) as u32) ^ ((bits >> 64) as u32) ^ ((bits >> 96) as u32);
    folded as i32
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

pub(crate) fn map_db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            // lock_not_available, serialization_failure, deadlock_detected
            Some("55P03") | Some("40001") | Some("40P01") => {
                return CoreError::Busy(format!("database lock not granted: {}", db.message()));
            }
            _ => {}
        }
    }
    if matches!(err, sqlx::Error::PoolTimedOut) {
        return CoreError::Busy("no database connection available".into());
    }

    error!("Database error: {}", err);
    CoreError::InternalError(err.to_string())
}
