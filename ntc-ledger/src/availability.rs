use ntc_core::{Bus, CoreResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SeatLedger;

/// Free seats on a bus at the time of the read. Only an estimate: the
/// authoritative check happens inside `SeatLedger::reserve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub bus_id: Uuid,
    pub capacity: u32,
    pub booked: u32,
    pub available: u32,
}

impl Availability {
    /// Saturates at zero if a capacity correction left more seats booked
    /// than the bus now holds.
    pub fn compute(bus: &Bus, booked: u32) -> Self {
        Self {
            bus_id: bus.id,
            capacity: bus.capacity,
            booked,
            available: bus.capacity.saturating_sub(booked),
        }
    }
}

pub async fn available<L>(ledger: &L, bus: &Bus) -> CoreResult<Availability>
where
    L: SeatLedger + ?Sized,
{
    let booked = ledger.booked_count(bus.id).await?;
    Ok(Availability::compute(bus, booked))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus(capacity: u32) -> Bus {
        Bus {
            id: Uuid::new_v4(),
            bus_number: "NC-0001".into(),
            capacity,
            route_id: Uuid::new_v4(),
            owner_id: "op".into(),
        }
    }

    #[test]
    fn test_compute() {
        let a = Availability::compute(&bus(50), 3);
        assert_eq!(a.available, 47);
        assert_eq!(a.booked, 3);
    }

    #[test]
    fn test_compute_saturates_after_capacity_correction() {
        assert_eq!(Availability::compute(&bus(10), 12).available, 0);
    }
}
