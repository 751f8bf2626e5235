use serde::{Deserialize, Serialize};
use time::{Date, UtcOffset};
use validator::Validate;

use crate::core::time::format_local;
use crate::db::models::{HomeworkResultRow, ProblemAnalysis, StudentReport, StudentWeakness, WeaknessSnapshot};
use crate::db::types::{GradingOutcome, HomeworkStatus};
use crate::services::grading_pipeline::GradedHomework;
use crate::services::homework_results::{self, DateRange, ResultStats};
use crate::services::intake::SubmissionInput;
use crate::services::similar_problems::ProblemSet;

const UNKNOWN_STUDENT_NAME: &str = "알 수 없음";
const DEFAULT_RESULT_SUBJECT: &str = "Homework";
const DEFAULT_RESULT_COMPLETION: &str = "pending";

/// Student ids arrive as strings from most clients and as numbers from some.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum StudentIdInput {
    Text(String),
    Number(i64),
}

impl StudentIdInput {
    fn into_string(self) -> String {
        match self {
            Self::Text(value) => value,
            Self::Number(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradeHomeworkRequest {
    #[serde(default, alias = "userId")]
    pub(crate) student_id: Option<StudentIdInput>,
    #[serde(default)]
    #[validate(length(max = 128, message = "code must be at most 128 characters"))]
    pub(crate) code: Option<String>,
    #[serde(default)]
    pub(crate) images: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) image: Option<String>,
}

impl GradeHomeworkRequest {
    pub(crate) fn into_input(self) -> SubmissionInput {
        SubmissionInput {
            student_id: self.student_id.map(StudentIdInput::into_string),
            code: self.code.map(|code| code.trim().to_string()).filter(|code| !code.is_empty()),
            images: self.images,
            image: self.image,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradeHomeworkResponse {
    pub(crate) success: bool,
    pub(crate) message: String,
    pub(crate) submission: GradedSubmissionResponse,
    pub(crate) grading: GradingResponse,
    pub(crate) report_generated: bool,
    pub(crate) submission_number: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradedSubmissionResponse {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) submitted_at: String,
    pub(crate) status: HomeworkStatus,
    pub(crate) image_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradingResponse {
    pub(crate) id: String,
    pub(crate) score: f64,
    pub(crate) subject: String,
    pub(crate) grade: i32,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) feedback: String,
    pub(crate) strengths: String,
    pub(crate) suggestions: String,
    pub(crate) completion: String,
    pub(crate) weakness_types: Vec<String>,
    pub(crate) graded_at: String,
    pub(crate) graded_by: String,
    pub(crate) outcome: GradingOutcome,
}

impl GradeHomeworkResponse {
    pub(crate) fn from_graded(graded: GradedHomework, offset: UtcOffset) -> Self {
        let image_count = graded.image_count();
        let GradedHomework { submission, grading, student_name, submission_number, report_generated } =
            graded;

        Self {
            success: true,
            message: format!("숙제 제출 및 AI 채점이 완료되었습니다 ({image_count}장)"),
            submission: GradedSubmissionResponse {
                id: submission.id,
                student_id: submission.student_id,
                student_name,
                submitted_at: format_local(submission.submitted_at, offset),
                status: HomeworkStatus::Graded,
                image_count,
            },
            grading: GradingResponse {
                id: grading.id,
                score: grading.score,
                subject: grading.subject,
                grade: grading.grade,
                total_questions: grading.total_questions,
                correct_answers: grading.correct_answers,
                feedback: grading.feedback,
                strengths: grading.strengths,
                suggestions: grading.suggestions,
                completion: grading.completion,
                weakness_types: grading.weakness_types,
                graded_at: format_local(grading.graded_at, offset),
                graded_by: grading.graded_by,
                outcome: grading.outcome,
            },
            report_generated,
            submission_number,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResultsQuery {
    #[serde(default)]
    pub(crate) date: Option<String>,
    #[serde(default)]
    pub(crate) start_date: Option<String>,
    #[serde(default)]
    pub(crate) end_date: Option<String>,
    #[serde(default)]
    pub(crate) academy_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HomeworkResultsResponse {
    pub(crate) success: bool,
    pub(crate) submissions: Vec<HomeworkResultItem>,
    pub(crate) stats: ResultStatsResponse,
    pub(crate) query: ResultsQueryEcho,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResultStatsResponse {
    pub(crate) total_submissions: usize,
    pub(crate) average_score: f64,
    pub(crate) today_submissions: usize,
    pub(crate) pending_review: usize,
}

impl From<ResultStats> for ResultStatsResponse {
    fn from(stats: ResultStats) -> Self {
        Self {
            total_submissions: stats.total_submissions,
            average_score: stats.average_score,
            today_submissions: stats.today_submissions,
            pending_review: stats.pending_review,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResultsQueryEcho {
    pub(crate) start_date: String,
    pub(crate) end_date: String,
    pub(crate) academy_id: Option<i64>,
}

impl ResultsQueryEcho {
    pub(crate) fn new(range: DateRange, academy_id: Option<i64>) -> Self {
        Self { start_date: range.start.to_string(), end_date: range.end.to_string(), academy_id }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HomeworkResultItem {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) academy_id: Option<i64>,
    pub(crate) code: Option<String>,
    pub(crate) image_count: usize,
    pub(crate) status: HomeworkStatus,
    pub(crate) score: f64,
    pub(crate) feedback: String,
    pub(crate) strengths: String,
    pub(crate) suggestions: String,
    pub(crate) suggestions_list: Vec<String>,
    pub(crate) subject: String,
    pub(crate) completion: String,
    pub(crate) page_count: i32,
    pub(crate) submitted_at: String,
    pub(crate) graded_at: Option<String>,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) problem_analysis: Vec<ProblemAnalysis>,
    pub(crate) weakness_types: Vec<String>,
    pub(crate) detailed_analysis: String,
    pub(crate) concepts_needed: Vec<String>,
    pub(crate) mistakes: Vec<String>,
    pub(crate) study_direction: String,
    pub(crate) outcome: Option<GradingOutcome>,
}

impl HomeworkResultItem {
    pub(crate) fn from_row(row: HomeworkResultRow, offset: UtcOffset) -> Self {
        let score = row.score.unwrap_or(0.0);
        let weakness_types = row.weakness_types.map(|types| types.0).unwrap_or_default();
        let problem_analysis = row.problem_analysis.map(|problems| problems.0).unwrap_or_default();
        let feedback = row.feedback.unwrap_or_default();
        let suggestions = row.suggestions.unwrap_or_default();
        let study_direction = row
            .study_direction
            .filter(|direction| !direction.trim().is_empty())
            .unwrap_or_else(|| homework_results::fallback_study_direction(score, &weakness_types));
        let detailed_analysis = row
            .detailed_analysis
            .filter(|analysis| !analysis.trim().is_empty())
            .unwrap_or_else(|| feedback.clone());

        Self {
            id: row.submission_id,
            student_id: row.student_id,
            student_name: row.student_name.unwrap_or_else(|| UNKNOWN_STUDENT_NAME.to_string()),
            academy_id: row.academy_id,
            code: row.code,
            image_count: row.image_refs.0.len(),
            status: HomeworkStatus::from_graded(row.grading_id.is_some()),
            score,
            suggestions_list: suggestions
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            feedback,
            strengths: row.strengths.unwrap_or_default(),
            suggestions,
            subject: row.subject.unwrap_or_else(|| DEFAULT_RESULT_SUBJECT.to_string()),
            completion: row.completion.unwrap_or_else(|| DEFAULT_RESULT_COMPLETION.to_string()),
            page_count: row.page_count.unwrap_or(0),
            submitted_at: format_local(row.submitted_at, offset),
            graded_at: row.graded_at.map(|value| format_local(value, offset)),
            total_questions: row.total_questions.unwrap_or(0),
            correct_answers: row.correct_answers.unwrap_or(0),
            concepts_needed: homework_results::concepts_needed(&weakness_types),
            mistakes: homework_results::mistakes(&problem_analysis),
            problem_analysis,
            weakness_types,
            detailed_analysis,
            study_direction,
            outcome: row.grading_outcome,
        }
    }
}

impl HomeworkResultsResponse {
    pub(crate) fn build(
        rows: Vec<HomeworkResultRow>,
        range: DateRange,
        academy_id: Option<i64>,
        today: Date,
        offset: UtcOffset,
    ) -> Self {
        let stats = homework_results::stats(&rows, today).into();
        Self {
            success: true,
            submissions: rows.into_iter().map(|row| HomeworkResultItem::from_row(row, offset)).collect(),
            stats,
            query: ResultsQueryEcho::new(range, academy_id),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StudentListQuery {
    #[serde(default)]
    pub(crate) limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WeaknessResponse {
    pub(crate) weakness_type: String,
    pub(crate) count: i32,
    pub(crate) last_updated: String,
}

impl WeaknessResponse {
    pub(crate) fn from_db(weakness: StudentWeakness, offset: UtcOffset) -> Self {
        Self {
            weakness_type: weakness.weakness_type,
            count: weakness.count,
            last_updated: format_local(weakness.last_updated, offset),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentWeaknessesResponse {
    pub(crate) student_id: String,
    pub(crate) weaknesses: Vec<WeaknessResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportResponse {
    pub(crate) id: String,
    pub(crate) report_type: String,
    pub(crate) summary: String,
    pub(crate) weaknesses: Vec<WeaknessSnapshot>,
    pub(crate) suggestions: String,
    pub(crate) average_score: f64,
    pub(crate) submission_number: i64,
    pub(crate) ai_generated: bool,
    pub(crate) created_at: String,
}

impl ReportResponse {
    pub(crate) fn from_db(report: StudentReport, offset: UtcOffset) -> Self {
        Self {
            id: report.id,
            report_type: report.report_type,
            summary: report.summary,
            weaknesses: report.weaknesses.0,
            suggestions: report.suggestions,
            average_score: report.average_score,
            submission_number: report.submission_number,
            ai_generated: report.ai_generated,
            created_at: format_local(report.created_at, offset),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentReportsResponse {
    pub(crate) student_id: String,
    pub(crate) reports: Vec<ReportResponse>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SimilarProblemsRequest {
    /// Falls back to the student's most frequent weaknesses when absent or empty.
    #[serde(default)]
    #[validate(length(max = 20, message = "weaknessTypes must have at most 20 entries"))]
    pub(crate) weakness_types: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SimilarProblemsResponse {
    pub(crate) success: bool,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) weakness_types: Vec<String>,
    pub(crate) problem_sets: Vec<ProblemSet>,
    pub(crate) generated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_id_accepts_numbers_and_alias() {
        let request: GradeHomeworkRequest =
            serde_json::from_str(r#"{"userId": 42, "image": "abc", "code": "  "}"#).unwrap();
        let input = request.into_input();
        assert_eq!(input.student_id.as_deref(), Some("42"));
        assert_eq!(input.image.as_deref(), Some("abc"));
        assert_eq!(input.code, None);

        let request: GradeHomeworkRequest =
            serde_json::from_str(r#"{"studentId": "s-1", "images": ["a", "b"]}"#).unwrap();
        let input = request.into_input();
        assert_eq!(input.student_id.as_deref(), Some("s-1"));
        assert_eq!(input.images.map(|images| images.len()), Some(2));
    }

    #[test]
    fn ungraded_row_reports_submitted_status_and_defaults() {
        let row = HomeworkResultRow {
            submission_id: "homework-1".into(),
            student_id: "7".into(),
            student_name: None,
            academy_id: None,
            code: None,
            image_refs: sqlx::types::Json(Vec::new()),
            submitted_at: time::macros::datetime!(2025 - 03 - 04 10:00),
            grading_id: None,
            score: None,
            feedback: None,
            strengths: None,
            suggestions: None,
            subject: None,
            completion: None,
            page_count: None,
            graded_at: None,
            total_questions: None,
            correct_answers: None,
            problem_analysis: None,
            weakness_types: None,
            detailed_analysis: None,
            study_direction: None,
            grading_outcome: None,
        };

        let item = HomeworkResultItem::from_row(row, UtcOffset::UTC);

        assert_eq!(item.status, HomeworkStatus::Submitted);
        assert_eq!(item.student_name, UNKNOWN_STUDENT_NAME);
        assert_eq!(item.subject, DEFAULT_RESULT_SUBJECT);
        assert_eq!(item.completion, DEFAULT_RESULT_COMPLETION);
        assert_eq!(item.graded_at, None);
    }

    #[test]
    fn overlong_code_fails_validation() {
        let request = GradeHomeworkRequest {
            student_id: Some(StudentIdInput::Text("s-1".into())),
            code: Some("x".repeat(129)),
            images: None,
            image: None,
        };
        assert!(request.validate().is_err());
    }
}
