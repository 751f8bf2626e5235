use time::PrimitiveDateTime;

/// Bumps the student's graded-submission counter and returns the new value. The first
/// call for a student returns 1.
pub(crate) async fn increment(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    now: PrimitiveDateTime,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO student_submission_counters (student_id, submission_count, updated_at)
         VALUES ($1, 1, $2)
         ON CONFLICT (student_id)
         DO UPDATE SET submission_count = student_submission_counters.submission_count + 1,
                       updated_at = EXCLUDED.updated_at
         RETURNING submission_count",
    )
    .bind(student_id)
    .bind(now)
    .fetch_one(executor)
    .await
}
