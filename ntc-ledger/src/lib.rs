use async_trait::async_trait;
use ntc_core::{CoreResult, LineFilter, Requester, Reservation, ReserveRequest, SeatLine, Ticket};
use uuid::Uuid;

pub mod availability;
pub mod memory;

pub use availability::{available, Availability};
pub use memory::MemorySeatLedger;

/// Booked/cancelled state of every seat line. Implementations must make
/// `reserve` and `cancel` atomic per bus: a request either lands all of its
/// lines or none, and readers never observe a half-cancelled ticket.
#[async_trait]
pub trait SeatLedger: Send + Sync {
    /// Books every seat of the request under one ticket, or fails with
    /// `SeatsUnavailable` listing the seats that are already booked.
    async fn reserve(&self, request: ReserveRequest) -> CoreResult<Reservation>;

    /// Cancels every booked line of the ticket. Fails with `TicketNotFound`
    /// when nothing is booked under it and `Forbidden` when the requester is
    /// neither the owner nor an admin.
    async fn cancel(&self, ticket_id: Uuid, requester: &Requester) -> CoreResult<Ticket>;

    /// Booked lines for the bus across all of its trips.
    async fn booked_count(&self, bus_id: Uuid) -> CoreResult<u32>;

    async fn ticket(&self, ticket_id: Uuid) -> CoreResult<Option<Ticket>>;

    async fn lines(&self, filter: &LineFilter) -> CoreResult<Vec<SeatLine>>;
}
