use sqlx::types::Json;
use time::PrimitiveDateTime;

use crate::db::models::{StudentReport, WeaknessSnapshot};

pub(crate) const COLUMNS: &str = "id, student_id, academy_id, report_type, summary, weaknesses, \
     suggestions, average_score, submission_number, ai_generated, created_at";

pub(crate) struct CreateReport<'a> {
    pub(crate) id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) academy_id: Option<i64>,
    pub(crate) report_type: &'a str,
    pub(crate) summary: &'a str,
    pub(crate) weaknesses: &'a [WeaknessSnapshot],
    pub(crate) suggestions: &'a str,
    pub(crate) average_score: f64,
    pub(crate) submission_number: i64,
    pub(crate) ai_generated: bool,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateReport<'_>,
) -> Result<StudentReport, sqlx::Error> {
    sqlx::query_as::<_, StudentReport>(&format!(
        "INSERT INTO student_reports (
            id, student_id, academy_id, report_type, summary, weaknesses, suggestions,
            average_score, submission_number, ai_generated, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.student_id)
    .bind(params.academy_id)
    .bind(params.report_type)
    .bind(params.summary)
    .bind(Json(params.weaknesses))
    .bind(params.suggestions)
    .bind(params.average_score)
    .bind(params.submission_number)
    .bind(params.ai_generated)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_for_student(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    limit: i64,
) -> Result<Vec<StudentReport>, sqlx::Error> {
    sqlx::query_as::<_, StudentReport>(&format!(
        "SELECT {COLUMNS} FROM student_reports WHERE student_id = $1 \
         ORDER BY created_at DESC, id DESC LIMIT $2"
    ))
    .bind(student_id)
    .bind(limit)
    .fetch_all(executor)
    .await
}
