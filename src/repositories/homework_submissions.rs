use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::{HomeworkResultRow, ImageRef};
use crate::db::types::HomeworkStatus;

pub(crate) struct CreateSubmission<'a> {
    pub(crate) id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) code: Option<&'a str>,
    pub(crate) image_refs: &'a [ImageRef],
    pub(crate) files_hash: &'a str,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) status: HomeworkStatus,
    pub(crate) academy_id: Option<i64>,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateSubmission<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO homework_submissions (
            id, student_id, code, image_refs, files_hash, submitted_at, status, academy_id
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
    )
    .bind(params.id)
    .bind(params.student_id)
    .bind(params.code)
    .bind(Json(params.image_refs))
    .bind(params.files_hash)
    .bind(params.submitted_at)
    .bind(params.status)
    .bind(params.academy_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn mark_graded(
    executor: impl sqlx::PgExecutor<'_>,
    submission_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE homework_submissions SET status = $2 WHERE id = $1 AND status = $3")
        .bind(submission_id)
        .bind(HomeworkStatus::Graded)
        .bind(HomeworkStatus::Submitted)
        .execute(executor)
        .await?;
    Ok(())
}

/// Half-open window over `submitted_at` in local wall-clock time.
pub(crate) struct ResultWindow {
    pub(crate) from: PrimitiveDateTime,
    pub(crate) until: PrimitiveDateTime,
    pub(crate) academy_id: Option<i64>,
}

const RESULT_COLUMNS: &str = "s.id AS submission_id, s.student_id, u.name AS student_name, \
     COALESCE(s.academy_id, u.academy_id) AS academy_id, s.code, s.image_refs, s.submitted_at, \
     g.id AS grading_id, g.score, g.feedback, g.strengths, g.suggestions, g.subject, \
     g.completion, g.page_count, g.graded_at, g.total_questions, g.correct_answers, \
     g.problem_analysis, g.weakness_types, g.detailed_analysis, g.study_direction, \
     g.grading_outcome";

pub(crate) async fn list_results(
    executor: impl sqlx::PgExecutor<'_>,
    window: &ResultWindow,
) -> Result<Vec<HomeworkResultRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {RESULT_COLUMNS} FROM homework_submissions s \
         LEFT JOIN homework_gradings g ON g.submission_id = s.id \
         LEFT JOIN users u ON u.id = s.student_id \
         WHERE s.submitted_at >= "
    ));
    builder.push_bind(window.from);
    builder.push(" AND s.submitted_at < ");
    builder.push_bind(window.until);

    if let Some(academy_id) = window.academy_id {
        builder.push(" AND COALESCE(s.academy_id, u.academy_id) = ");
        builder.push_bind(academy_id);
    }

    builder.push(" ORDER BY s.submitted_at DESC, s.id DESC");
    builder.build_query_as::<HomeworkResultRow>().fetch_all(executor).await
}
