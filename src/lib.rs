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

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};
use crate::services::ai_gateway::GeminiGateway;
use crate::services::store::PgHomeworkStore;
use crate::tasks::reports::{ReportWakeup, ReportWorker};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await.context("Failed to connect to Postgres")?;
    db::run_migrations(&db_pool).await.context("Failed to run migrations")?;

    let store = PgHomeworkStore::new(db_pool);
    match store.grading_schema_ready().await {
        Ok(true) => tracing::info!("Grading schema ready"),
        Ok(false) => tracing::warn!("Grading schema is missing optional columns"),
        Err(err) => tracing::error!(error = %err, "Failed to inspect grading schema"),
    }

    let redis = RedisHandle::new(settings.redis().connection_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; continuing without rate limits");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let shutdown = CancellationToken::new();
    let store = Arc::new(store);
    let gateway = Arc::new(GeminiGateway::from_settings(&settings)?);
    let reports = ReportWakeup::new();

    // Also picks up jobs left pending by a previous run.
    let worker = ReportWorker::new(store.clone(), gateway.clone(), settings.grading().local_offset);
    let worker = tokio::spawn(worker.run(reports.clone(), shutdown.child_token()));

    let state = AppState::new(settings, store, gateway, redis.clone(), reports, shutdown.clone());
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server().addr()).await?;

    tracing::info!(
        host = %state.settings().server().host,
        port = state.settings().server().port,
        environment = %state.settings().runtime().environment.as_str(),
        report_mode = state.settings().grading().report_mode.as_str(),
        "Homework grading API listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(core::shutdown::shutdown_signal(shutdown.clone()))
        .await;

    shutdown.cancel();
    if let Err(err) = worker.await {
        tracing::error!(error = %err, "Report worker panicked");
    }

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}
