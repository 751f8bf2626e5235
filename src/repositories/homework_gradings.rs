use sqlx::types::Json;
use time::PrimitiveDateTime;

use crate::db::models::{ProblemAnalysis, RecentGrading};
use crate::db::types::GradingOutcome;

pub(crate) struct CreateGrading<'a> {
    pub(crate) id: &'a str,
    pub(crate) submission_id: &'a str,
    pub(crate) score: f64,
    pub(crate) feedback: &'a str,
    pub(crate) strengths: &'a str,
    pub(crate) suggestions: &'a str,
    pub(crate) subject: &'a str,
    pub(crate) completion: &'a str,
    pub(crate) effort: &'a str,
    pub(crate) page_count: i32,
    pub(crate) graded_at: PrimitiveDateTime,
    pub(crate) graded_by: &'a str,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) problem_analysis: &'a [ProblemAnalysis],
    pub(crate) weakness_types: &'a [String],
    pub(crate) detailed_analysis: &'a str,
    pub(crate) study_direction: &'a str,
    pub(crate) grade: i32,
    pub(crate) outcome: GradingOutcome,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateGrading<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO homework_gradings (
            id, submission_id, score, feedback, strengths, suggestions, subject,
            completion, effort, page_count, graded_at, graded_by, total_questions,
            correct_answers, problem_analysis, weakness_types, detailed_analysis,
            study_direction, grade, grading_outcome
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20)",
    )
    .bind(params.id)
    .bind(params.submission_id)
    .bind(params.score)
    .bind(params.feedback)
    .bind(params.strengths)
    .bind(params.suggestions)
    .bind(params.subject)
    .bind(params.completion)
    .bind(params.effort)
    .bind(params.page_count)
    .bind(params.graded_at)
    .bind(params.graded_by)
    .bind(params.total_questions)
    .bind(params.correct_answers)
    .bind(Json(params.problem_analysis))
    .bind(Json(params.weakness_types))
    .bind(params.detailed_analysis)
    .bind(params.study_direction)
    .bind(params.grade)
    .bind(params.outcome)
    .execute(executor)
    .await?;
    Ok(())
}

/// Most recent gradings for a student, newest first. Ties on `graded_at` break on id.
pub(crate) async fn recent_for_student(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    limit: i64,
) -> Result<Vec<RecentGrading>, sqlx::Error> {
    sqlx::query_as::<_, RecentGrading>(
        "SELECT g.score, g.feedback, g.total_questions, g.correct_answers, g.weakness_types, \
                g.graded_at \
         FROM homework_gradings g \
         JOIN homework_submissions s ON s.id = g.submission_id \
         WHERE s.student_id = $1 \
         ORDER BY g.graded_at DESC, g.id DESC \
         LIMIT $2",
    )
    .bind(student_id)
    .bind(limit)
    .fetch_all(executor)
    .await
}
