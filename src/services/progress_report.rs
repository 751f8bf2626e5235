use serde_json::{json, Value};
use thiserror::Error;
use time::UtcOffset;
use tokio_util::sync::CancellationToken;

use crate::core::{ids::prefixed_id, time as clock};
use crate::db::models::{RecentGrading, ReportJob, StudentReport, WeaknessSnapshot};
use crate::services::ai_gateway::{self, AiGateway, GatewayError, GatewayRequest, GatewayStage};
use crate::services::json_extract;
use crate::services::store::{HomeworkStore, NewReport};

pub(crate) const PENDING_SUMMARY: &str = "보고서 생성 중";
pub(crate) const DEFAULT_SUGGESTIONS: &str = "계속 관찰이 필요합니다";
pub(crate) const TOP_WEAKNESSES: i64 = 5;
pub(crate) const RECENT_GRADINGS: i64 = 3;

#[derive(Debug, Error)]
pub(crate) enum ReportError {
    #[error("report generation was cancelled")]
    Cancelled,
    #[error(transparent)]
    Persistence(#[from] sqlx::Error),
}

/// Builds the report for a claimed job and stores it, completing the job. AI failures
/// degrade to the pending placeholder. Cancellation stores nothing so the job can be
/// picked up again.
pub(crate) async fn generate(
    store: &dyn HomeworkStore,
    gateway: &dyn AiGateway,
    job: &ReportJob,
    offset: UtcOffset,
    cancel: &CancellationToken,
) -> Result<StudentReport, ReportError> {
    let weaknesses: Vec<WeaknessSnapshot> = store
        .top_weaknesses(&job.student_id, TOP_WEAKNESSES)
        .await?
        .into_iter()
        .map(|weakness| WeaknessSnapshot { weakness_type: weakness.weakness_type, count: weakness.count })
        .collect();
    let recent = store.recent_gradings(&job.student_id, RECENT_GRADINGS).await?;
    let average_score = average_score(&recent);

    let prompt = build_prompt(&recent, &weaknesses, offset);
    let analysis = match ai_gateway::call(
        gateway,
        GatewayRequest { stage: GatewayStage::ProgressReport, prompt: &prompt, images: &[] },
        cancel,
    )
    .await
    {
        Ok(text) => match json_extract::extract_value(&text) {
            Ok(value @ Value::Object(_)) => Some(value),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(student_id = %job.student_id, error = %err, "Report output unusable");
                None
            }
        },
        Err(GatewayError::Cancelled) => return Err(ReportError::Cancelled),
        Err(_) => None,
    };

    let (summary, suggestions, ai_generated) = match &analysis {
        Some(value) => (
            value.to_string(),
            value
                .get("suggestions")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .unwrap_or(DEFAULT_SUGGESTIONS)
                .to_string(),
            true,
        ),
        None => (PENDING_SUMMARY.to_string(), DEFAULT_SUGGESTIONS.to_string(), false),
    };

    let report = NewReport {
        id: prefixed_id("report"),
        student_id: job.student_id.clone(),
        academy_id: job.academy_id,
        summary,
        weaknesses,
        suggestions,
        average_score,
        submission_number: job.submission_number,
        ai_generated,
        created_at: clock::to_local_primitive(clock::now_utc(), offset),
    };

    let stored = store.complete_report_job(job, &report).await?;
    let status = if ai_generated { "ai_generated" } else { "placeholder" };
    metrics::counter!("student_reports_total", "status" => status).increment(1);
    tracing::info!(
        report_id = %stored.id,
        student_id = %stored.student_id,
        submission_number = stored.submission_number,
        ai_generated,
        "Progress report stored"
    );

    Ok(stored)
}

pub(crate) fn average_score(recent: &[RecentGrading]) -> f64 {
    if recent.is_empty() {
        return 0.0;
    }
    recent.iter().map(|grading| grading.score).sum::<f64>() / recent.len() as f64
}

fn build_prompt(
    recent: &[RecentGrading],
    weaknesses: &[WeaknessSnapshot],
    offset: UtcOffset,
) -> String {
    let recent_rows: Vec<Value> = recent
        .iter()
        .map(|grading| {
            json!({
                "score": grading.score,
                "feedback": grading.feedback,
                "totalQuestions": grading.total_questions,
                "correctAnswers": grading.correct_answers,
                "weaknessTypes": grading.weakness_types.as_ref().map(|types| &types.0),
                "gradedAt": clock::format_local(grading.graded_at, offset),
            })
        })
        .collect();
    let recent_json = serde_json::to_string_pretty(&recent_rows).unwrap_or_default();
    let weakness_json = serde_json::to_string_pretty(weaknesses).unwrap_or_default();

    format!(
        r#"당신은 학원의 교육 전문가입니다. 다음 학생의 최근 숙제 데이터를 분석하여 보고서를 작성해주세요.

**최근 {count}회 채점 결과:**
{recent_json}

**자주 틀리는 유형:**
{weakness_json}

**다음 형식의 JSON으로 응답해주세요:**
{{
  "summary": "학생의 전반적인 학습 상태 요약 (2-3문장)",
  "strengths": "잘하는 부분 (구체적으로)",
  "weaknesses": "보완이 필요한 부분 (구체적으로)",
  "suggestions": "학원장과 선생님을 위한 지도 방안 (구체적으로 3가지)"
}}"#,
        count = recent.len(),
    )
}
