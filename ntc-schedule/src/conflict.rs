use ntc_core::{Trip, TripWindow};
use uuid::Uuid;

/// First trip of `bus_id` whose `[departure, arrival)` overlaps `window`,
/// ignoring the trip `exclude` (the one being updated).
pub fn find_conflict<'a, I>(
    trips: I,
    bus_id: Uuid,
    window: &TripWindow,
    exclude: Option<Uuid>,
) -> Option<&'a Trip>
where
    I: IntoIterator<Item = &'a Trip>,
{
    trips.into_iter().find(|trip| {
        trip.bus_id == bus_id
            && Some(trip.id) != exclude
            && trip.departure_time < window.arrival()
            && window.departure() < trip.arrival_time
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use ntc_core::NewTrip;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    fn trip(bus_id: Uuid, from: u32, to: u32) -> Trip {
        Trip::new(NewTrip {
            bus_id,
            route_id: Uuid::new_v4(),
            window: TripWindow::new(at(from), at(to)).unwrap(),
            stops: vec![],
        })
    }

    #[test]
    fn test_conflict_is_per_bus_and_half_open() {
        let bus_x = Uuid::new_v4();
        let bus_y = Uuid::new_v4();
        let existing = vec![trip(bus_x, 8, 12), trip(bus_y, 11, 14)];

        let late_morning = TripWindow::new(at(11), at(14)).unwrap();
        let noon = TripWindow::new(at(12), at(15)).unwrap();

        assert_eq!(
            find_conflict(&existing, bus_x, &late_morning, None).map(|t| t.id),
            Some(existing[0].id)
        );
        assert!(find_conflict(&existing, bus_x, &noon, None).is_none());
        assert!(find_conflict(&existing, Uuid::new_v4(), &late_morning, None).is_none());
    }

    #[test]
    fn test_excluded_trip_is_ignored() {
        let bus = Uuid::new_v4();
        let existing = vec![trip(bus, 8, 12)];
        let shifted = TripWindow::new(at(9), at(13)).unwrap();

        assert!(find_conflict(&existing, bus, &shifted, Some(existing[0].id)).is_none());
        assert!(find_conflict(&existing, bus, &shifted, None).is_some());
    }
}
