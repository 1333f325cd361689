use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::{Bus, Route};
use crate::CoreResult;

/// Read-only bus lookups supplied by the fleet service.
#[async_trait]
pub trait BusDirectory: Send + Sync {
    async fn bus(&self, id: Uuid) -> CoreResult<Option<Bus>>;
}

/// Read-only route lookups supplied by the route service.
#[async_trait]
pub trait RouteDirectory: Send + Sync {
    async fn route(&self, id: Uuid) -> CoreResult<Option<Route>>;

    async fn routes_between(&self, start_point: &str, end_point: &str) -> CoreResult<Vec<Route>>;
}

/// In-memory directory used when no database is configured, and by tests.
#[derive(Default)]
pub struct MemoryDirectory {
    buses: DashMap<Uuid, Bus>,
    routes: DashMap<Uuid, Route>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_route(&self, route: Route) {
        self.routes.insert(route.id, route);
    }

    pub fn insert_bus(&self, bus: Bus) {
        self.buses.insert(bus.id, bus);
    }
}

#[async_trait]
impl BusDirectory for MemoryDirectory {
    async fn bus(&self, id: Uuid) -> CoreResult<Option<Bus>> {
        Ok(self.buses.get(&id).map(|b| b.value().clone()))
    }
}

#[async_trait]
impl RouteDirectory for MemoryDirectory {
    async fn route(&self, id: Uuid) -> CoreResult<Option<Route>> {
        Ok(self.routes.get(&id).map(|r| r.value().clone()))
    }

    async fn routes_between(&self, start_point: &str, end_point: &str) -> CoreResult<Vec<Route>> {
        Ok(self
            .routes
            .iter()
            .filter(|r| r.connects(start_point, end_point))
            .map(|r| r.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_directory_lookups() {
        let directory = MemoryDirectory::new();
        let route = Route {
            id: Uuid::new_v4(),
            start_point: "Colombo".into(),
            end_point: "Kandy".into(),
            distance_km: 115.0,
            fare_per_seat: 600,
        };
        let bus = Bus {
            id: Uuid::new_v4(),
            bus_number: "NB-1234".into(),
            capacity: 50,
            route_id: route.id,
            owner_id: "operator-1".into(),
        };
        directory.insert_route(route.clone());
        directory.insert_bus(bus.clone());

        assert_eq!(directory.bus(bus.id).await.unwrap(), Some(bus));
        assert_eq!(directory.route(route.id).await.unwrap(), Some(route.clone()));
        assert_eq!(directory.routes_between("Colombo", "Kandy").await.unwrap(), vec![route]);
        assert!(directory.routes_between("Kandy", "Colombo").await.unwrap().is_empty());
        assert!(directory.bus(Uuid::new_v4()).await.unwrap().is_none());
    }
}
