pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::watch;

use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};
use crate::services::session::{DemoVault, PgAttemptStore, SessionRegistry};

struct Runtime {
    state: AppState,
    redis: RedisHandle,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

async fn bootstrap() -> anyhow::Result<Runtime> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; continuing without rate limits");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sessions = build_sessions(&db_pool, shutdown_rx.clone());
    let state = AppState::new(settings, db_pool, redis.clone(), sessions);

    Ok(Runtime { state, redis, shutdown_tx, shutdown_rx })
}

fn build_sessions(db_pool: &PgPool, shutdown_rx: watch::Receiver<bool>) -> SessionRegistry {
    SessionRegistry::new(
        Arc::new(PgAttemptStore::new(db_pool.clone())),
        DemoVault::default(),
        shutdown_rx,
    )
}

pub async fn run() -> anyhow::Result<()> {
    let Runtime { state, redis, shutdown_tx, shutdown_rx } = bootstrap().await?;

    if let Err(err) = core::bootstrap::ensure_admin(&state).await {
        tracing::error!(error = %err, "Failed to ensure default admin");
    }

    let sweeper = tokio::spawn(tasks::scheduler::run(state.clone(), shutdown_rx));
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Rapid Steno Exam API listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(core::shutdown::shutdown_and_broadcast(shutdown_tx))
        .await;

    if let Err(err) = sweeper.await {
        tracing::error!(error = %err, "Sweeper task join failed");
    }

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}

pub async fn run_worker() -> anyhow::Result<()> {
    let Runtime { state, redis, shutdown_tx, shutdown_rx } = bootstrap().await?;

    let sweeper = tokio::spawn(tasks::scheduler::run(state, shutdown_rx));
    core::shutdown::shutdown_and_broadcast(shutdown_tx).await;

    if let Err(err) = sweeper.await {
        tracing::error!(error = %err, "Sweeper task join failed");
    }

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    Ok(())
}
