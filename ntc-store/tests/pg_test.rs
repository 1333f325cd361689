//! Runs against a live Postgres. Set `DATABASE_URL` and use
//! `cargo test -p ntc-store -- --ignored`.

use chrono::{DateTime, TimeZone, Utc};
use ntc_core::{
    Bus, CoreError, NewTrip, Requester, ReserveRequest, Role, Route, SeatSelection, TripWindow,
};
use ntc_ledger::SeatLedger;
use ntc_schedule::TripRegistry;
use ntc_store::{DbClient, PgDirectory, PgSeatLedger, PgTripRegistry};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const LOCK_TIMEOUT: Duration = Duration::from_secs(2);

async fn connect() -> DbClient {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for Postgres tests");
    let db = DbClient::new(&url, 5).await.unwrap();
    db.migrate().await.unwrap();
    db
}

/// Seeds a fresh route and bus so runs never see each other's rows.
async fn seed_bus(db: &DbClient, capacity: u32) -> (Route, Bus) {
    let directory = PgDirectory::new(db.pool.clone());
    let route = Route {
        id: Uuid::new_v4(),
        start_point: "Colombo".into(),
        end_point: "Kandy".into(),
        distance_km: 115.0,
        fare_per_seat: 600,
    };
    let bus = Bus {
        id: Uuid::new_v4(),
        bus_number: format!("PG-{}", &Uuid::new_v4().simple().to_string()[..8]),
        capacity,
        route_id: route.id,
        owner_id: "operator-1".into(),
    };
    directory.upsert_route(&route).await.unwrap();
    directory.upsert_bus(&bus).await.unwrap();
    (route, bus)
}

fn request(bus: &Bus, seats: &[u32], user: &str) -> ReserveRequest {
    ReserveRequest::new(
        bus.id,
        SeatSelection::new(seats, bus.capacity).unwrap(),
        Uuid::new_v4(),
        user,
        600,
    )
    .unwrap()
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 25, hour, 0, 0).unwrap()
}

#[tokio::test]
#[ignore]
async fn test_concurrent_requests_on_a_two_seat_bus() {
    let db = connect().await;
    let (_, bus) = seed_bus(&db, 2).await;
    let ledger = Arc::new(PgSeatLedger::new(db.pool.clone(), LOCK_TIMEOUT));

    ledger.reserve(request(&bus, &[1], "t1")).await.unwrap();

    let (taken, free) = tokio::join!(
        tokio::spawn({
            let ledger = ledger.clone();
            let req = request(&bus, &[1], "t2");
            async move { ledger.reserve(req).await }
        }),
        tokio::spawn({
            let ledger = ledger.clone();
            let req = request(&bus, &[2], "t3");
            async move { ledger.reserve(req).await }
        }),
    );

    assert_eq!(taken.unwrap(), Err(CoreError::SeatsUnavailable { seats: vec![1] }));
    assert_eq!(free.unwrap().unwrap().seat_numbers, vec![2]);
    assert_eq!(ledger.booked_count(bus.id).await.unwrap(), 2);
}

#[tokio::test]
#[ignore]
async fn test_cancel_frees_seats_and_checks_owner() {
    let db = connect().await;
    let (_, bus) = seed_bus(&db, 10).await;
    let ledger = PgSeatLedger::new(db.pool.clone(), LOCK_TIMEOUT);

    let reservation = ledger.reserve(request(&bus, &[3, 5, 7], "alice")).await.unwrap();
    assert_eq!(reservation.total_fare, 1800);

    let stranger = Requester::new("mallory", Role::Commuter);
    assert!(matches!(
        ledger.cancel(reservation.ticket_id, &stranger).await,
        Err(CoreError::Forbidden(_))
    ));

    let owner = Requester::new("alice", Role::Commuter);
    ledger.cancel(reservation.ticket_id, &owner).await.unwrap();
    assert_eq!(ledger.booked_count(bus.id).await.unwrap(), 0);
    assert_eq!(
        ledger.cancel(reservation.ticket_id, &owner).await,
        Err(CoreError::TicketNotFound(reservation.ticket_id))
    );

    // Cancelled seats are bookable again.
    assert!(ledger.reserve(request(&bus, &[3], "bob")).await.is_ok());
}

#[tokio::test]
#[ignore]
async fn test_overlapping_trips_are_rejected_and_boundaries_admitted() {
    let db = connect().await;
    let (route, bus) = seed_bus(&db, 50).await;
    let registry = PgTripRegistry::new(db.pool.clone(), LOCK_TIMEOUT);

    let trip = |from: u32, to: u32| NewTrip {
        bus_id: bus.id,
        route_id: route.id,
        window: TripWindow::new(at(from), at(to)).unwrap(),
        stops: vec!["Kegalle".into()],
    };

    let morning = registry.create(trip(8, 12)).await.unwrap();
    assert_eq!(
        registry.create(trip(11, 14)).await,
        Err(CoreError::ScheduleConflict { trip_id: morning.id })
    );
    let afternoon = registry.create(trip(12, 15)).await.unwrap();

    registry.delete(morning.id).await.unwrap();
    assert!(registry.get(morning.id).await.unwrap().is_none());
    assert!(registry.create(trip(9, 11)).await.is_ok());
    registry.delete(afternoon.id).await.unwrap();
}
