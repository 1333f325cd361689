use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ntc_core::{
    CoreError, CoreResult, LineFilter, Requester, Reservation, ReserveRequest, SeatLine, Ticket,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::SeatLedger;

/// Seat state of one bus. Every mutation happens under the bus's write lock.
#[derive(Debug, Default)]
struct BusSeats {
    lines: Vec<SeatLine>,
    /// seat number -> ticket currently holding it
    booked: HashMap<u32, Uuid>,
    /// ticket -> positions in `lines`
    tickets: HashMap<Uuid, Vec<usize>>,
}

impl BusSeats {
    fn ticket_lines(&self, ticket_id: &Uuid) -> Vec<SeatLine> {
        self.tickets
            .get(ticket_id)
            .map(|idx| idx.iter().map(|&i| self.lines[i].clone()).collect())
            .unwrap_or_default()
    }
}

/// In-process ledger. Each bus has its own `RwLock`: reserve and cancel hold
/// it exclusively for the whole check-and-write, reads share it.
pub struct MemorySeatLedger {
    buses: DashMap<Uuid, Arc<RwLock<BusSeats>>>,
    /// ticket -> bus, so cancel can find the right lock
    ticket_bus: DashMap<Uuid, Uuid>,
    lock_timeout: Duration,
}

impl MemorySeatLedger {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            buses: DashMap::new(),
            ticket_bus: DashMap::new(),
            lock_timeout,
        }
    }

    fn slot(&self, bus_id: Uuid) -> Arc<RwLock<BusSeats>> {
        Arc::clone(&self.buses.entry(bus_id).or_default())
    }

    async fn write_seats(&self, bus_id: Uuid) -> CoreResult<OwnedRwLockWriteGuard<BusSeats>> {
        let slot = self.slot(bus_id);
        tokio::time::timeout(self.lock_timeout, slot.write_owned())
            .await
            .map_err(|_| {
                warn!("Seat ledger lock for bus {} not acquired in {:?}", bus_id, self.lock_timeout);
                CoreError::Busy(format!("seat ledger for bus {} is busy", bus_id))
            })
    }

    fn all_slots(&self) -> Vec<Arc<RwLock<BusSeats>>> {
        self.buses.iter().map(|e| Arc::clone(e.value())).collect()
    }
}

impl Default for MemorySeatLedger {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl SeatLedger for MemorySeatLedger {
    async fn reserve(&self, request: ReserveRequest) -> CoreResult<Reservation> {
        let mut seats = self.write_seats(request.bus_id).await?;

        let taken: Vec<u32> = request
            .seats
            .seats()
            .iter()
            .copied()
            .filter(|seat| seats.booked.contains_key(seat))
            .collect();
        if !taken.is_empty() {
            warn!("Seats {:?} on bus {} are already booked", taken, request.bus_id);
            return Err(CoreError::SeatsUnavailable { seats: taken });
        }

        match self.ticket_bus.entry(request.ticket_id) {
            Entry::Occupied(_) => {
                return Err(CoreError::ValidationError(format!(
                    "Ticket id {} is already in use",
                    request.ticket_id
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(request.bus_id);
            }
        }

        let start = seats.lines.len();
        let lines = request.lines();
        let positions: Vec<usize> = (start..start + lines.len()).collect();
        for line in &lines {
            seats.booked.insert(line.seat_number, line.ticket_id);
        }
        seats.lines.extend(lines);
        seats.tickets.insert(request.ticket_id, positions);

        info!(
            "Ticket {} booked seats {:?} on bus {}",
            request.ticket_id,
            request.seats.seats(),
            request.bus_id
        );

        Ok(Reservation {
            ticket_id: request.ticket_id,
            bus_id: request.bus_id,
            seat_numbers: request.seats.seats().to_vec(),
            total_fare: request.total_fare(),
        })
    }

    async fn cancel(&self, ticket_id: Uuid, requester: &Requester) -> CoreResult<Ticket> {
        let bus_id = match self.ticket_bus.get(&ticket_id) {
            Some(entry) => *entry.value(),
            None => return Err(CoreError::TicketNotFound(ticket_id)),
        };

        let mut guard = self.write_seats(bus_id).await?;
        let seats = &mut *guard;
        let positions = seats.tickets.get(&ticket_id).cloned().unwrap_or_default();

        let owner = positions
            .iter()
            .map(|&i| &seats.lines[i])
            .find(|line| line.is_booked())
            .map(|line| line.user_id.clone())
            .ok_or(CoreError::TicketNotFound(ticket_id))?;

        if !requester.may_act_for(&owner) {
            warn!("User {} tried to cancel ticket {} owned by {}", requester.user_id, ticket_id, owner);
            return Err(CoreError::Forbidden(
                "You can only cancel your own tickets".to_string(),
            ));
        }

        for &i in &positions {
            let line = &mut seats.lines[i];
            if line.is_booked() {
                line.cancel();
                seats.booked.remove(&line.seat_number);
            }
        }

        info!("Ticket {} cancelled on bus {}", ticket_id, bus_id);

        Ticket::from_lines(&seats.ticket_lines(&ticket_id))
            .ok_or(CoreError::TicketNotFound(ticket_id))
    }

    async fn booked_count(&self, bus_id: Uuid) -> CoreResult<u32> {
        let slot = match self.buses.get(&bus_id) {
            Some(entry) => Arc::clone(entry.value()),
            None => return Ok(0),
        };
        let seats = slot.read().await;
        Ok(seats.booked.len() as u32)
    }

    async fn ticket(&self, ticket_id: Uuid) -> CoreResult<Option<Ticket>> {
        let bus_id = match self.ticket_bus.get(&ticket_id) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        let slot = self.slot(bus_id);
        let seats = slot.read().await;
        Ok(Ticket::from_lines(&seats.ticket_lines(&ticket_id)))
    }

    async fn lines(&self, filter: &LineFilter) -> CoreResult<Vec<SeatLine>> {
        let slots = match filter.ticket_id {
            Some(ticket_id) => match self.ticket_bus.get(&ticket_id) {
                Some(entry) => vec![self.slot(*entry.value())],
                None => return Ok(Vec::new()),
            },
            None => self.all_slots(),
        };

        let mut lines = Vec::new();
        for slot in slots {
            let seats = slot.read().await;
            lines.extend(seats.lines.iter().filter(|l| filter.matches(l)).cloned());
        }
        lines.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.ticket_id.cmp(&b.ticket_id))
                .then_with(|| a.seat_number.cmp(&b.seat_number))
        });
        Ok(lines)
    }
}
