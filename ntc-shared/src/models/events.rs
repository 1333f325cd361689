use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct SeatsReservedEvent {
    pub ticket_id: Uuid,
    pub bus_id: Uuid,
    pub seat_numbers: Vec<u32>,
    pub total_fare: i64,
    pub reserved_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct TicketCancelledEvent {
    pub ticket_id: Uuid,
    pub bus_id: Uuid,
    pub seat_numbers: Vec<u32>,
    pub cancelled_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct TripScheduledEvent {
    pub trip_id: Uuid,
    pub bus_id: Uuid,
    pub route_id: Uuid,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
}

/// Everything published on the engine's event channel.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeatEvent {
    SeatsReserved(SeatsReservedEvent),
    TicketCancelled(TicketCancelledEvent),
    TripScheduled(TripScheduledEvent),
}

impl SeatEvent {
    /// The bus whose seat or schedule state changed.
    pub fn bus_id(&self) -> Uuid {
        match self {
            SeatEvent::SeatsReserved(e) => e.bus_id,
            SeatEvent::TicketCancelled(e) => e.bus_id,
            SeatEvent::TripScheduled(e) => e.bus_id,
        }
    }

    /// Topic name, kept stable for downstream consumers.
    pub fn topic(&self) -> &'static str {
        match self {
            SeatEvent::SeatsReserved(_) => "seats.reserved",
            SeatEvent::TicketCancelled(_) => "tickets.cancelled",
            SeatEvent::TripScheduled(_) => "trips.scheduled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_tagged_on_the_wire() {
        let event = SeatEvent::TicketCancelled(TicketCancelledEvent {
            ticket_id: Uuid::new_v4(),
            bus_id: Uuid::new_v4(),
            seat_numbers: vec![3, 5],
            cancelled_at: 0,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ticket_cancelled");
        assert_eq!(json["seat_numbers"], serde_json::json!([3, 5]));
        assert_eq!(event.topic(), "tickets.cancelled");
    }
}
