use ntc_booking::BookingEngine;
use ntc_store::app_config::RateLimitConfig;
use ntc_store::{EventProducer, RedisClient};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BookingEngine>,
    pub events: EventProducer,
    /// Rate limiting is only enabled when Redis is configured.
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}
