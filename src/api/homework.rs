use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::redis::Quota;
use crate::core::state::AppState;
use crate::core::time as clock;
use crate::schemas::homework::{
    GradeHomeworkRequest, GradeHomeworkResponse, HomeworkResultsResponse, ResultsQuery,
};
use crate::services::grading_pipeline::{GradingPipeline, PipelineConfig};
use crate::services::homework_results;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/grade", post(grade_homework))
        .route("/results", get(list_results))
}

async fn grade_homework(
    State(state): State<AppState>,
    Json(payload): Json<GradeHomeworkRequest>,
) -> Result<Json<GradeHomeworkResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let input = payload.into_input();

    let per_minute = state.settings().grading().rate_limit_per_minute;
    if let Some(student_id) = input.student_id.as_deref().filter(|_| per_minute > 0) {
        let quota = state.redis().grade_quota(student_id, per_minute).await.unwrap_or_else(|err| {
            tracing::error!(error = %err, "Failed to check grading quota");
            Quota::Unchecked
        });
        if !quota.allows() {
            return Err(ApiError::TooManyRequests("Too many homework submissions, try again later"));
        }
    }

    let config = PipelineConfig::from_settings(state.settings());
    let offset = config.local_offset;
    let cancel = state.shutdown_token().child_token();
    let graded = GradingPipeline::new(state.store(), state.gateway(), state.reports(), config)
        .run(input, &cancel)
        .await?;

    Ok(Json(GradeHomeworkResponse::from_graded(graded, offset)))
}

async fn list_results(
    State(state): State<AppState>,
    Query(params): Query<ResultsQuery>,
) -> Result<Json<HomeworkResultsResponse>, ApiError> {
    let offset = state.settings().grading().local_offset;
    let today = clock::local_today(offset);
    let range = homework_results::resolve_range(
        params.date.as_deref(),
        params.start_date.as_deref(),
        params.end_date.as_deref(),
        today,
    )
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let rows = state
        .store()
        .list_results(&range.filter(params.academy_id))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list homework results"))?;

    tracing::debug!(
        start = %range.start,
        end = %range.end,
        academy_id = ?params.academy_id,
        count = rows.len(),
        "Listed homework results"
    );

    Ok(Json(HomeworkResultsResponse::build(rows, range, params.academy_id, today, offset)))
}
