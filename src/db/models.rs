use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{GradingOutcome, ReportJobStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Student {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) academy_id: Option<i64>,
}

/// Digest of one submitted page; the raw image bytes are not retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ImageRef {
    pub(crate) index: usize,
    pub(crate) mime_type: String,
    pub(crate) size_bytes: usize,
    pub(crate) sha256: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProblemAnalysis {
    #[serde(default)]
    pub(crate) page: Option<i64>,
    #[serde(default)]
    pub(crate) problem: String,
    #[serde(default)]
    pub(crate) answer: String,
    #[serde(default)]
    pub(crate) is_correct: bool,
    #[serde(default, rename = "type")]
    pub(crate) problem_type: String,
    #[serde(default)]
    pub(crate) concept: String,
    #[serde(default)]
    pub(crate) explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct StudentWeakness {
    pub(crate) student_id: String,
    pub(crate) weakness_type: String,
    pub(crate) count: i32,
    pub(crate) last_updated: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WeaknessSnapshot {
    pub(crate) weakness_type: String,
    pub(crate) count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct StudentReport {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) academy_id: Option<i64>,
    pub(crate) report_type: String,
    pub(crate) summary: String,
    pub(crate) weaknesses: Json<Vec<WeaknessSnapshot>>,
    pub(crate) suggestions: String,
    pub(crate) average_score: f64,
    pub(crate) submission_number: i64,
    pub(crate) ai_generated: bool,
    pub(crate) created_at: PrimitiveDateTime,
}

/// A due progress report. `attempts` counts claims, including the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub(crate) struct ReportJob {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) academy_id: Option<i64>,
    pub(crate) submission_number: i64,
    pub(crate) status: ReportJobStatus,
    pub(crate) attempts: i32,
    pub(crate) claimed_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
}

/// One grading joined to its submission, as fed to the progress report prompt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecentGrading {
    pub(crate) score: f64,
    pub(crate) feedback: Option<String>,
    pub(crate) total_questions: Option<i32>,
    pub(crate) correct_answers: Option<i32>,
    pub(crate) weakness_types: Option<Json<Vec<String>>>,
    pub(crate) graded_at: PrimitiveDateTime,
}

/// Submission joined with its grading (if any) and the owning student, for result
/// listings.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct HomeworkResultRow {
    pub(crate) submission_id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: Option<String>,
    pub(crate) academy_id: Option<i64>,
    pub(crate) code: Option<String>,
    pub(crate) image_refs: Json<Vec<ImageRef>>,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) grading_id: Option<String>,
    pub(crate) score: Option<f64>,
    pub(crate) feedback: Option<String>,
    pub(crate) strengths: Option<String>,
    pub(crate) suggestions: Option<String>,
    pub(crate) subject: Option<String>,
    pub(crate) completion: Option<String>,
    pub(crate) page_count: Option<i32>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) total_questions: Option<i32>,
    pub(crate) correct_answers: Option<i32>,
    pub(crate) problem_analysis: Option<Json<Vec<ProblemAnalysis>>>,
    pub(crate) weakness_types: Option<Json<Vec<String>>>,
    pub(crate) detailed_analysis: Option<String>,
    pub(crate) study_direction: Option<String>,
    pub(crate) grading_outcome: Option<GradingOutcome>,
}
