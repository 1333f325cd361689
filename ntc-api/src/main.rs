use anyhow::Context;
use ntc_api::{app, state::{AppState, AuthConfig}};
use ntc_booking::BookingEngine;
use ntc_core::MemoryDirectory;
use ntc_ledger::MemorySeatLedger;
use ntc_schedule::MemoryTripRegistry;
use ntc_store::app_config::Config;
use ntc_store::{DbClient, EventProducer, PgDirectory, PgSeatLedger, PgTripRegistry, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ntc_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting reservation API on port {}", config.server.port);

    let engine = Arc::new(build_engine(&config).await?);

    // Redis Connection (optional, rate limiting only)
    let redis = match &config.redis.url {
        Some(url) => {
            let client = RedisClient::new(url)
                .await
                .context("Failed to connect to Redis")?;
            Some(Arc::new(client))
        }
        None => {
            tracing::info!("No Redis configured, rate limiting disabled");
            None
        }
    };

    let app_state = AppState {
        engine,
        events: EventProducer::default(),
        redis,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        rate_limit: config.rate_limit.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

async fn build_engine(config: &Config) -> anyhow::Result<BookingEngine> {
    let lock_timeout = config.engine.lock_timeout();

    match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;

            let directory = Arc::new(PgDirectory::new(db.pool.clone()));
            for route in &config.seed.routes {
                directory.upsert_route(route).await?;
            }
            for bus in &config.seed.buses {
                directory.upsert_bus(bus).await?;
            }

            Ok(BookingEngine::new(
                directory.clone(),
                directory,
                Arc::new(PgSeatLedger::new(db.pool.clone(), lock_timeout)),
                Arc::new(PgTripRegistry::new(db.pool, lock_timeout)),
            ))
        }
        None => {
            tracing::info!("No database configured, using in-memory stores");
            let directory = Arc::new(MemoryDirectory::new());
            for route in config.seed.routes.iter().cloned() {
                directory.insert_route(route);
            }
            for bus in config.seed.buses.iter().cloned() {
                directory.insert_bus(bus);
            }

            Ok(BookingEngine::new(
                directory.clone(),
                directory,
                Arc::new(MemorySeatLedger::new(lock_timeout)),
                Arc::new(MemoryTripRegistry::new(lock_timeout)),
            ))
        }
    }
}
