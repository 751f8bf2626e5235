use std::sync::Arc;
use std::time::Duration;

use time::UtcOffset;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::core::time as clock;
use crate::db::models::ReportJob;
use crate::db::types::ReportJobStatus;
use crate::services::ai_gateway::AiGateway;
use crate::services::progress_report::{self, ReportError};
use crate::services::store::HomeworkStore;

pub(crate) const POLL_INTERVAL: Duration = Duration::from_secs(5);
/// A running job whose claim is older than this is handed to the next claimer.
pub(crate) const CLAIM_LEASE: time::Duration = time::Duration::minutes(10);
pub(crate) const MAX_ATTEMPTS: i32 = 5;

/// Nudges the report worker after a job row was committed. Jobs live in the database;
/// a lost nudge only delays them until the next poll.
#[derive(Clone, Debug, Default)]
pub(crate) struct ReportWakeup {
    notify: Arc<Notify>,
}

impl ReportWakeup {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn notify(&self) {
        self.notify.notify_one();
    }

    async fn notified(&self) {
        self.notify.notified().await;
    }
}

pub(crate) struct ReportWorker {
    store: Arc<dyn HomeworkStore>,
    gateway: Arc<dyn AiGateway>,
    local_offset: UtcOffset,
    poll_interval: Duration,
}

impl ReportWorker {
    pub(crate) fn new(
        store: Arc<dyn HomeworkStore>,
        gateway: Arc<dyn AiGateway>,
        local_offset: UtcOffset,
    ) -> Self {
        Self { store, gateway, local_offset, poll_interval: POLL_INTERVAL }
    }

    /// Claims and processes jobs until shutdown. Unfinished jobs stay in the database
    /// for the next start.
    pub(crate) async fn run(self, wakeup: ReportWakeup, shutdown: CancellationToken) {
        tracing::info!("Report worker started");
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let processed = self.drain(&shutdown).await;
            if processed > 0 {
                tracing::debug!(processed, "Report jobs processed");
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = wakeup.notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        tracing::info!("Report worker stopped");
    }

    /// Processes claimable jobs until none are left, one fails or `shutdown` fires.
    /// Returns how many jobs were completed. A failed job waits for the next poll.
    pub(crate) async fn drain(&self, shutdown: &CancellationToken) -> usize {
        let mut completed = 0;
        while !shutdown.is_cancelled() {
            let now = self.now();
            match self.store.claim_report_job(now, now - CLAIM_LEASE).await {
                Ok(Some(job)) => {
                    if !self.process(&job, shutdown).await {
                        break;
                    }
                    completed += 1;
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::error!(error = %err, "Failed to claim report job");
                    break;
                }
            }
        }
        completed
    }

    async fn process(&self, job: &ReportJob, shutdown: &CancellationToken) -> bool {
        let cancel = shutdown.child_token();
        match progress_report::generate(
            self.store.as_ref(),
            self.gateway.as_ref(),
            job,
            self.local_offset,
            &cancel,
        )
        .await
        {
            Ok(_) => true,
            Err(err) => {
                release(self.store.as_ref(), job, &err, self.now()).await;
                false
            }
        }
    }

    fn now(&self) -> time::PrimitiveDateTime {
        clock::to_local_primitive(clock::now_utc(), self.local_offset)
    }
}

/// Returns a job whose report could not be stored so a later claim retries it.
pub(crate) async fn release(
    store: &dyn HomeworkStore,
    job: &ReportJob,
    err: &ReportError,
    now: time::PrimitiveDateTime,
) {
    if !matches!(err, ReportError::Cancelled) {
        metrics::counter!("student_reports_total", "status" => "failed").increment(1);
    }

    match store.release_report_job(job, &err.to_string(), MAX_ATTEMPTS, now).await {
        Ok(ReportJobStatus::Failed) => tracing::error!(
            job_id = %job.id,
            student_id = %job.student_id,
            submission_number = job.submission_number,
            attempts = job.attempts,
            error = %err,
            "Report job gave up"
        ),
        Ok(status) => tracing::warn!(
            job_id = %job.id,
            student_id = %job.student_id,
            submission_number = job.submission_number,
            attempts = job.attempts,
            status = status.as_str(),
            error = %err,
            "Progress report not stored, job released"
        ),
        Err(release_err) => tracing::error!(
            job_id = %job.id,
            error = %release_err,
            "Failed to release report job"
        ),
    }
}
