use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::core::time as clock;
use crate::db::models::Student;
use crate::schemas::homework::{
    ReportResponse, SimilarProblemsRequest, SimilarProblemsResponse, StudentListQuery,
    StudentReportsResponse, StudentWeaknessesResponse, WeaknessResponse,
};
use crate::services::similar_problems::{self, MAX_WEAKNESS_TYPES};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:student_id/weaknesses", get(list_weaknesses))
        .route("/:student_id/reports", get(list_reports))
        .route("/:student_id/similar-problems", post(similar_problems))
}

async fn list_weaknesses(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Query(params): Query<StudentListQuery>,
) -> Result<Json<StudentWeaknessesResponse>, ApiError> {
    ensure_student(&state, &student_id).await?;
    let weaknesses = state
        .store()
        .top_weaknesses(&student_id, clamp_limit(params.limit))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list student weaknesses"))?;

    let offset = state.settings().grading().local_offset;
    Ok(Json(StudentWeaknessesResponse {
        student_id,
        weaknesses: weaknesses
            .into_iter()
            .map(|weakness| WeaknessResponse::from_db(weakness, offset))
            .collect(),
    }))
}

async fn list_reports(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Query(params): Query<StudentListQuery>,
) -> Result<Json<StudentReportsResponse>, ApiError> {
    ensure_student(&state, &student_id).await?;
    let reports = state
        .store()
        .list_reports(&student_id, clamp_limit(params.limit))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list student reports"))?;

    let offset = state.settings().grading().local_offset;
    Ok(Json(StudentReportsResponse {
        student_id,
        reports: reports.into_iter().map(|report| ReportResponse::from_db(report, offset)).collect(),
    }))
}

async fn similar_problems(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Json(payload): Json<SimilarProblemsRequest>,
) -> Result<Json<SimilarProblemsResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let student = ensure_student(&state, &student_id).await?;

    let mut weakness_types = payload.weakness_types.unwrap_or_default();
    if weakness_types.iter().all(|weakness| weakness.trim().is_empty()) {
        weakness_types = state
            .store()
            .top_weaknesses(&student_id, MAX_WEAKNESS_TYPES as i64)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list student weaknesses"))?
            .into_iter()
            .map(|weakness| weakness.weakness_type)
            .collect();
    }

    let cancel = state.shutdown_token().child_token();
    let problem_sets =
        similar_problems::generate(state.gateway(), &student.name, &weakness_types, &cancel)
            .await?;

    let offset = state.settings().grading().local_offset;
    Ok(Json(SimilarProblemsResponse {
        success: true,
        student_id,
        student_name: student.name,
        weakness_types: problem_sets.iter().map(|set| set.weakness_type.clone()).collect(),
        problem_sets,
        generated_at: clock::format_local(clock::to_local_primitive(clock::now_utc(), offset), offset),
    }))
}

async fn ensure_student(state: &AppState, student_id: &str) -> Result<Student, ApiError> {
    state
        .store()
        .find_student(student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch student"))?
        .ok_or_else(|| ApiError::NotFound(format!("Student {student_id} not found")))
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}
