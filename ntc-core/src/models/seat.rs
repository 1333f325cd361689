use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Booked,
    Cancelled,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Booked => "BOOKED",
            SeatStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BOOKED" => Ok(SeatStatus::Booked),
            "CANCELLED" => Ok(SeatStatus::Cancelled),
            other => Err(CoreError::InternalError(format!("Unknown seat status: {}", other))),
        }
    }
}

/// One seat's booking record. Lines are never deleted, only cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatLine {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub bus_id: Uuid,
    pub seat_number: u32,
    pub status: SeatStatus,
    /// The ticket's total fare, repeated on every line of the ticket.
    pub total_fare: i64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SeatLine {
    pub fn booked(request: &ReserveRequest, seat_number: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            ticket_id: request.ticket_id,
            bus_id: request.bus_id,
            seat_number,
            status: SeatStatus::Booked,
            total_fare: request.total_fare(),
            user_id: request.user_id.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_booked(&self) -> bool {
        self.status == SeatStatus::Booked
    }

    pub fn cancel(&mut self) {
        self.status = SeatStatus::Cancelled;
        self.updated_at = Utc::now();
    }
}

/// A non-empty set of distinct seat numbers, each within `1..=capacity`,
/// kept in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatSelection {
    seats: Vec<u32>,
}

impl SeatSelection {
    pub fn new(seat_numbers: &[u32], capacity: u32) -> CoreResult<Self> {
        if seat_numbers.is_empty() {
            return Err(CoreError::ValidationError(
                "At least one seat number is required".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for &seat in seat_numbers {
            if seat == 0 {
                return Err(CoreError::ValidationError(
                    "Seat numbers must be positive".to_string(),
                ));
            }
            if seat > capacity {
                return Err(CoreError::ValidationError(format!(
                    "Seat {} exceeds bus capacity of {}",
                    seat, capacity
                )));
            }
            if !seen.insert(seat) {
                return Err(CoreError::ValidationError(format!(
                    "Seat {} requested more than once",
                    seat
                )));
            }
        }

        Ok(Self {
            seats: seen.into_iter().collect(),
        })
    }

    pub fn seats(&self) -> &[u32] {
        &self.seats
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }
}

/// Everything the ledger needs to book one ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct ReserveRequest {
    pub bus_id: Uuid,
    pub seats: SeatSelection,
    pub ticket_id: Uuid,
    pub user_id: String,
    pub fare_per_seat: i64,
}

impl ReserveRequest {
    /// Rejects fares whose ticket total does not fit in an `i64`.
    pub fn new(
        bus_id: Uuid,
        seats: SeatSelection,
        ticket_id: Uuid,
        user_id: impl Into<String>,
        fare_per_seat: i64,
    ) -> CoreResult<Self> {
        if fare_per_seat.checked_mul(seats.len() as i64).is_none() {
            return Err(CoreError::InternalError(format!(
                "Fare {} for {} seat(s) overflows the ticket total",
                fare_per_seat,
                seats.len()
            )));
        }

        Ok(Self {
            bus_id,
            seats,
            ticket_id,
            user_id: user_id.into(),
            fare_per_seat,
        })
    }

    pub fn total_fare(&self) -> i64 {
        self.fare_per_seat.saturating_mul(self.seats.len() as i64)
    }

    pub fn lines(&self) -> Vec<SeatLine> {
        self.seats
            .seats()
            .iter()
            .map(|&seat| SeatLine::booked(self, seat))
            .collect()
    }
}

/// Result of a successful reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub ticket_id: Uuid,
    pub bus_id: Uuid,
    pub seat_numbers: Vec<u32>,
    pub total_fare: i64,
}

/// Read view over all lines sharing a ticket id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: Uuid,
    pub bus_id: Uuid,
    pub user_id: String,
    pub seat_numbers: Vec<u32>,
    pub total_fare: i64,
    pub status: SeatStatus,
}

impl Ticket {
    /// Builds the view from one ticket's lines; `None` when there are none.
    pub fn from_lines(lines: &[SeatLine]) -> Option<Self> {
        let first = lines.first()?;
        let mut seat_numbers: Vec<u32> = lines.iter().map(|l| l.seat_number).collect();
        seat_numbers.sort_unstable();

        let status = if lines.iter().any(SeatLine::is_booked) {
            SeatStatus::Booked
        } else {
            SeatStatus::Cancelled
        };

        Some(Self {
            ticket_id: first.ticket_id,
            bus_id: first.bus_id,
            user_id: first.user_id.clone(),
            seat_numbers,
            total_fare: first.total_fare,
            status,
        })
    }
}

/// Selects seat lines for listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineFilter {
    pub ticket_id: Option<Uuid>,
    pub user_id: Option<String>,
}

impl LineFilter {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            ticket_id: None,
            user_id: Some(user_id.into()),
        }
    }

    pub fn matches(&self, line: &SeatLine) -> bool {
        self.ticket_id.map_or(true, |t| t == line.ticket_id)
            && self.user_id.as_deref().map_or(true, |u| u == line.user_id)
    }
}
