use time::PrimitiveDateTime;

use crate::db::models::ReportJob;
use crate::db::types::ReportJobStatus;

pub(crate) const COLUMNS: &str = "id, student_id, academy_id, submission_number, status, \
     attempts, claimed_at, created_at";

const RETURNING: &str = "student_report_jobs.id, student_report_jobs.student_id, \
     student_report_jobs.academy_id, student_report_jobs.submission_number, \
     student_report_jobs.status, student_report_jobs.attempts, student_report_jobs.claimed_at, \
     student_report_jobs.created_at";

pub(crate) struct CreateReportJob<'a> {
    pub(crate) id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) academy_id: Option<i64>,
    pub(crate) submission_number: i64,
    /// `true` inserts the job already claimed by the caller.
    pub(crate) claimed: bool,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateReportJob<'_>,
) -> Result<ReportJob, sqlx::Error> {
    let (status, attempts, claimed_at) = if params.claimed {
        (ReportJobStatus::Running, 1, Some(params.now))
    } else {
        (ReportJobStatus::Pending, 0, None)
    };

    sqlx::query_as::<_, ReportJob>(&format!(
        "INSERT INTO student_report_jobs (
            id, student_id, academy_id, submission_number, status, attempts, claimed_at,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$8)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.student_id)
    .bind(params.academy_id)
    .bind(params.submission_number)
    .bind(status)
    .bind(attempts)
    .bind(claimed_at)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

/// Claims the oldest pending job, or a running one whose claim is older than
/// `stale_before`. Concurrent workers never receive the same row.
pub(crate) async fn claim_next(
    executor: impl sqlx::PgExecutor<'_>,
    now: PrimitiveDateTime,
    stale_before: PrimitiveDateTime,
) -> Result<Option<ReportJob>, sqlx::Error> {
    sqlx::query_as::<_, ReportJob>(&format!(
        "WITH candidate AS (
            SELECT id FROM student_report_jobs
            WHERE status = $1
               OR (status = $2 AND claimed_at < $3)
            ORDER BY created_at, id
            FOR UPDATE SKIP LOCKED
            LIMIT 1
        )
        UPDATE student_report_jobs
        SET status = $2,
            attempts = student_report_jobs.attempts + 1,
            claimed_at = $4,
            updated_at = $4
        FROM candidate
        WHERE student_report_jobs.id = candidate.id
        RETURNING {RETURNING}",
    ))
    .bind(ReportJobStatus::Pending)
    .bind(ReportJobStatus::Running)
    .bind(stale_before)
    .bind(now)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn mark_done(
    executor: impl sqlx::PgExecutor<'_>,
    job_id: &str,
    report_id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE student_report_jobs
         SET status = $2, report_id = $3, last_error = NULL, updated_at = $4
         WHERE id = $1",
    )
    .bind(job_id)
    .bind(ReportJobStatus::Done)
    .bind(report_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

/// Hands a claimed job back. It becomes claimable again until `max_attempts` claims
/// have been spent, after which it is parked as failed.
pub(crate) async fn release(
    executor: impl sqlx::PgExecutor<'_>,
    job_id: &str,
    error: &str,
    max_attempts: i32,
    now: PrimitiveDateTime,
) -> Result<ReportJobStatus, sqlx::Error> {
    sqlx::query_scalar(
        "UPDATE student_report_jobs
         SET status = CASE WHEN attempts >= $3 THEN $4 ELSE $5 END,
             claimed_at = NULL,
             last_error = $2,
             updated_at = $6
         WHERE id = $1
         RETURNING status",
    )
    .bind(job_id)
    .bind(error)
    .bind(max_attempts)
    .bind(ReportJobStatus::Failed)
    .bind(ReportJobStatus::Pending)
    .bind(now)
    .fetch_one(executor)
    .await
}

#[cfg(test)]
pub(crate) async fn list_for_student(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
) -> Result<Vec<ReportJob>, sqlx::Error> {
    sqlx::query_as::<_, ReportJob>(&format!(
        "SELECT {COLUMNS} FROM student_report_jobs WHERE student_id = $1 \
         ORDER BY submission_number"
    ))
    .bind(student_id)
    .fetch_all(executor)
    .await
}
