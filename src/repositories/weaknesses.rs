use time::PrimitiveDateTime;

use crate::core::ids::prefixed_id;
use crate::db::models::StudentWeakness;

pub(crate) const COLUMNS: &str = "student_id, weakness_type, count, last_updated";

/// Inserts the (student, type) row with count 1, or bumps the existing count by one.
/// Concurrent callers never lose an increment.
pub(crate) async fn increment(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    weakness_type: &str,
    now: PrimitiveDateTime,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO student_weaknesses (id, student_id, weakness_type, count, last_updated)
         VALUES ($1, $2, $3, 1, $4)
         ON CONFLICT (student_id, weakness_type)
         DO UPDATE SET count = student_weaknesses.count + 1, last_updated = EXCLUDED.last_updated
         RETURNING count",
    )
    .bind(prefixed_id("weakness"))
    .bind(student_id)
    .bind(weakness_type)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn top_for_student(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    limit: i64,
) -> Result<Vec<StudentWeakness>, sqlx::Error> {
    sqlx::query_as::<_, StudentWeakness>(&format!(
        "SELECT {COLUMNS} FROM student_weaknesses WHERE student_id = $1 \
         ORDER BY count DESC, last_updated DESC, weakness_type ASC LIMIT $2"
    ))
    .bind(student_id)
    .bind(limit)
    .fetch_all(executor)
    .await
}
