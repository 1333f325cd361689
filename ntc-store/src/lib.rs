pub mod app_config;
pub mod database;
pub mod directory_repo;
pub mod events;
pub mod redis_repo;
pub mod seat_repo;
pub mod trip_repo;

pub use database::DbClient;
pub use directory_repo::PgDirectory;
pub use events::EventProducer;
pub use redis_repo::RedisClient;
pub use seat_repo::PgSeatLedger;
pub use trip_repo::PgTripRegistry;
