use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::services::ai_gateway::AiGateway;
use crate::services::store::HomeworkStore;
use crate::tasks::reports::ReportWakeup;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    store: Arc<dyn HomeworkStore>,
    gateway: Arc<dyn AiGateway>,
    redis: RedisHandle,
    reports: ReportWakeup,
    shutdown: CancellationToken,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        store: Arc<dyn HomeworkStore>,
        gateway: Arc<dyn AiGateway>,
        redis: RedisHandle,
        reports: ReportWakeup,
        shutdown: CancellationToken,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, store, gateway, redis, reports, shutdown }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn store(&self) -> &dyn HomeworkStore {
        self.inner.store.as_ref()
    }

    pub(crate) fn gateway(&self) -> &dyn AiGateway {
        self.inner.gateway.as_ref()
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn reports(&self) -> &ReportWakeup {
        &self.inner.reports
    }

    /// Cancelled when the server begins shutting down; per-request tokens are children.
    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }
}
