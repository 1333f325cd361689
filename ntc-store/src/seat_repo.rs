use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ntc_core::{
    CoreError, CoreResult, LineFilter, Requester, Reservation, ReserveRequest, SeatLine, SeatStatus,
    Ticket,
};
use ntc_ledger::SeatLedger;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{begin_bounded, is_unique_violation, lock_bus, map_db_error, SEAT_LOCK_NAMESPACE};

/// A lost race against the partial unique index is retried; the next attempt
/// sees the winner's lines and reports them as unavailable.
const RESERVE_ATTEMPTS: usize = 3;

const LINE_COLUMNS: &str =
    "id, ticket_id, bus_id, seat_number, status, total_fare, user_id, created_at, updated_at";

pub struct PgSeatLedger {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgSeatLedger {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    async fn reserve_once(&self, request: &ReserveRequest) -> Result<Reservation, ReserveFailure> {
        let mut tx = begin_bounded(&self.pool, self.lock_timeout).await?;
        lock_bus(&mut tx, SEAT_LOCK_NAMESPACE, request.bus_id).await?;

        let reused: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM seat_lines WHERE ticket_id = $1)")
                .bind(request.ticket_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_db_error)?;
        if reused {
            return Err(CoreError::ValidationError(format!(
                "Ticket {} already exists",
                request.ticket_id
            ))
            .into());
        }

        let wanted: Vec<i32> = request.seats.seats().iter().map(|&s| s as i32).collect();
        let taken: Vec<i32> = sqlx::query_scalar(
            "SELECT seat_number FROM seat_lines \
             WHERE bus_id = $1 AND status = 'BOOKED' AND seat_number = ANY($2) \
             ORDER BY seat_number",
        )
        .bind(request.bus_id)
        .bind(&wanted)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if !taken.is_empty() {
            let seats: Vec<u32> = taken.into_iter().map(|s| s as u32).collect();
            warn!("Seats {:?} on bus {} already booked", seats, request.bus_id);
            return Err(CoreError::SeatsUnavailable { seats }.into());
        }

        for line in request.lines() {
            sqlx::query(
                "INSERT INTO seat_lines \
                 (id, ticket_id, bus_id, seat_number, status, total_fare, user_id, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(line.id)
            .bind(line.ticket_id)
            .bind(line.bus_id)
            .bind(line.seat_number as i32)
            .bind(line.status.as_str())
            .bind(line.total_fare)
            .bind(&line.user_id)
            .bind(line.created_at)
            .bind(line.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(ReserveFailure::from_insert)?;
        }

        tx.commit().await.map_err(map_db_error)?;

        Ok(Reservation {
            ticket_id: request.ticket_id,
            bus_id: request.bus_id,
            seat_numbers: request.seats.seats().to_vec(),
            total_fare: request.total_fare(),
        })
    }

    async fn ticket_lines(&self, ticket_id: Uuid) -> CoreResult<Vec<SeatLine>> {
        let query = format!(
            "SELECT {} FROM seat_lines WHERE ticket_id = $1 ORDER BY seat_number",
            LINE_COLUMNS
        );
        let rows: Vec<SeatLineRow> = sqlx::query_as(&query)
            .bind(ticket_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        rows.into_iter().map(SeatLine::try_from).collect()
    }
}

enum ReserveFailure {
    UniqueViolation,
    Core(CoreError),
}

impl ReserveFailure {
    fn from_insert(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            ReserveFailure::UniqueViolation
        } else {
            ReserveFailure::Core(map_db_error(err))
        }
    }
}

impl From<CoreError> for ReserveFailure {
    fn from(err: CoreError) -> Self {
        ReserveFailure::Core(err)
    }
}

#[derive(sqlx::FromRow)]
struct SeatLineRow {
    id: Uuid,
    ticket_id: Uuid,
    bus_id: Uuid,
    seat_number: i32,
    status: String,
    total_fare: i64,
    user_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SeatLineRow> for SeatLine {
    type Error = CoreError;

    fn try_from(row: SeatLineRow) -> Result<Self, Self::Error> {
        let seat_number = u32::try_from(row.seat_number).map_err(|_| {
            CoreError::InternalError(format!("Stored seat number {} is negative", row.seat_number))
        })?;
        Ok(SeatLine {
            id: row.id,
            ticket_id: row.ticket_id,
            bus_id: row.bus_id,
            seat_number,
            status: row.status.parse::<SeatStatus>()?,
            total_fare: row.total_fare,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl SeatLedger for PgSeatLedger {
    async fn reserve(&self, request: ReserveRequest) -> CoreResult<Reservation> {
        for attempt in 1..=RESERVE_ATTEMPTS {
            match self.reserve_once(&request).await {
                Ok(reservation) => {
                    info!(
                        "Ticket {} booked seats {:?} on bus {}",
                        reservation.ticket_id, reservation.seat_numbers, reservation.bus_id
                    );
                    return Ok(reservation);
                }
                Err(ReserveFailure::Core(err)) => return Err(err),
                Err(ReserveFailure::UniqueViolation) => {
                    warn!(
                        "Seat index rejected ticket {} (attempt {}/{})",
                        request.ticket_id, attempt, RESERVE_ATTEMPTS
                    );
                }
            }
        }

        Err(CoreError::Busy(format!(
            "bus {} seats kept changing during reservation",
            request.bus_id
        )))
    }

    async fn cancel(&self, ticket_id: Uuid, requester: &Requester) -> CoreResult<Ticket> {
        let mut tx = begin_bounded(&self.pool, self.lock_timeout).await?;

        // Row locks serialize concurrent cancels; the loser re-reads no booked rows.
        let query = format!(
            "SELECT {} FROM seat_lines WHERE ticket_id = $1 AND status = 'BOOKED' FOR UPDATE",
            LINE_COLUMNS
        );
        let booked: Vec<SeatLineRow> = sqlx::query_as(&query)
            .bind(ticket_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(map_db_error)?;

        let owner = booked
            .first()
            .map(|row| row.user_id.clone())
            .ok_or(CoreError::TicketNotFound(ticket_id))?;

        if !requester.may_act_for(&owner) {
            warn!("User {} tried to cancel ticket {} owned by {}", requester.user_id, ticket_id, owner);
            return Err(CoreError::Forbidden(
                "You can only cancel your own tickets".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE seat_lines SET status = 'CANCELLED', updated_at = now() \
             WHERE ticket_id = $1 AND status = 'BOOKED'",
        )
        .bind(ticket_id)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        info!("Ticket {} cancelled", ticket_id);

        let lines = self.ticket_lines(ticket_id).await?;
        Ticket::from_lines(&lines).ok_or(CoreError::TicketNotFound(ticket_id))
    }

    async fn booked_count(&self, bus_id: Uuid) -> CoreResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM seat_lines WHERE bus_id = $1 AND status = 'BOOKED'",
        )
        .bind(bus_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        u32::try_from(count).map_err(|_| CoreError::InternalError(format!("Booked count {} out of range", count)))
    }

    async fn ticket(&self, ticket_id: Uuid) -> CoreResult<Option<Ticket>> {
        let lines = self.ticket_lines(ticket_id).await?;
        Ok(Ticket::from_lines(&lines))
    }

    async fn lines(&self, filter: &LineFilter) -> CoreResult<Vec<SeatLine>> {
        let query = format!(
            "SELECT {} FROM seat_lines \
             WHERE ($1::uuid IS NULL OR ticket_id = $1) AND ($2::text IS NULL OR user_id = $2) \
             ORDER BY created_at, ticket_id, seat_number",
            LINE_COLUMNS
        );
        let rows: Vec<SeatLineRow> = sqlx::query_as(&query)
            .bind(filter.ticket_id)
            .bind(filter.user_id.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        rows.into_iter().map(SeatLine::try_from).collect()
    }
}
