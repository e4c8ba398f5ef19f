use std::sync::Arc;

use payment_orchestrator::bus::redis_stream::RedisStreamBus;
use payment_orchestrator::config::AppConfig;
use payment_orchestrator::outbox::pg::PgOutboxRepo;
use payment_orchestrator::service::outbox_relay::OutboxRelay;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

/// Outbox worker: drains the payment outbox to the event bus until stopped.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let outbox = Arc::new(PgOutboxRepo { pool });
    let bus = Arc::new(RedisStreamBus::new(&cfg.redis_url, &cfg.stream_key)?);

    let relay = OutboxRelay::new(outbox, bus, cfg.relay.clone());
    let handle = relay.spawn();
    tracing::info!(
        poll_interval_secs = cfg.relay.poll_interval.as_secs(),
        batch_size = cfg.relay.batch_size,
        "outbox worker started"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    handle.shutdown().await;
    Ok(())
}
