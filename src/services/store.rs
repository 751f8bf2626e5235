use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::core::ids::prefixed_id;
use crate::db::models::{
    HomeworkResultRow, ImageRef, ProblemAnalysis, RecentGrading, ReportJob, Student,
    StudentReport, StudentWeakness, WeaknessSnapshot,
};
use crate::db::schema::GRADING_OPTIONAL_COLUMNS;
use crate::db::types::{GradingOutcome, HomeworkStatus, ReportJobStatus};
use crate::repositories;
use crate::repositories::homework_gradings::CreateGrading;
use crate::repositories::homework_submissions::{CreateSubmission, ResultWindow};
use crate::repositories::report_jobs::CreateReportJob;
use crate::repositories::reports::CreateReport;

#[derive(Debug, Clone)]
pub(crate) struct NewSubmission {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) code: Option<String>,
    pub(crate) image_refs: Vec<ImageRef>,
    pub(crate) files_hash: String,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) academy_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub(crate) struct NewGrading {
    pub(crate) id: String,
    pub(crate) score: f64,
    pub(crate) feedback: String,
    pub(crate) strengths: String,
    pub(crate) suggestions: String,
    pub(crate) subject: String,
    pub(crate) grade: i32,
    pub(crate) completion: String,
    pub(crate) effort: String,
    pub(crate) page_count: i32,
    pub(crate) graded_at: PrimitiveDateTime,
    pub(crate) graded_by: String,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) problem_analysis: Vec<ProblemAnalysis>,
    pub(crate) weakness_types: Vec<String>,
    pub(crate) detailed_analysis: String,
    pub(crate) study_direction: String,
    pub(crate) outcome: GradingOutcome,
}

#[derive(Debug, Clone)]
pub(crate) struct NewReport {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) academy_id: Option<i64>,
    pub(crate) summary: String,
    pub(crate) weaknesses: Vec<WeaknessSnapshot>,
    pub(crate) suggestions: String,
    pub(crate) average_score: f64,
    pub(crate) submission_number: i64,
    pub(crate) ai_generated: bool,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) const REPORT_TYPE: &str = "homework_analysis";

/// When a graded submission makes a progress report due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReportSchedule {
    pub(crate) every_n_submissions: i64,
    /// Inline generation claims the job for the request that created it.
    pub(crate) claim_for_caller: bool,
}

impl ReportSchedule {
    pub(crate) fn is_due(self, submission_number: i64) -> bool {
        self.every_n_submissions > 0
            && submission_number > 0
            && submission_number % self.every_n_submissions == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedGrading {
    pub(crate) submission_number: i64,
    pub(crate) report_job: Option<ReportJob>,
}

/// Submissions whose local `submitted_at` falls in `[from, until)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResultFilter {
    pub(crate) from: PrimitiveDateTime,
    pub(crate) until: PrimitiveDateTime,
    pub(crate) academy_id: Option<i64>,
}

/// Persistence seam for the grading pipeline.
#[async_trait]
pub(crate) trait HomeworkStore: Send + Sync {
    async fn find_student(&self, student_id: &str) -> Result<Option<Student>, sqlx::Error>;

    /// Writes the submission, its grading, one count per distinct weakness type, the
    /// counter bump and (when due) the report job as one unit.
    async fn record_graded_submission(
        &self,
        submission: &NewSubmission,
        grading: &NewGrading,
        schedule: ReportSchedule,
    ) -> Result<RecordedGrading, sqlx::Error>;

    async fn top_weaknesses(
        &self,
        student_id: &str,
        limit: i64,
    ) -> Result<Vec<StudentWeakness>, sqlx::Error>;

    async fn recent_gradings(
        &self,
        student_id: &str,
        limit: i64,
    ) -> Result<Vec<RecentGrading>, sqlx::Error>;

    async fn claim_report_job(
        &self,
        now: PrimitiveDateTime,
        stale_before: PrimitiveDateTime,
    ) -> Result<Option<ReportJob>, sqlx::Error>;

    /// Stores the report and marks its job done atomically.
    async fn complete_report_job(
        &self,
        job: &ReportJob,
        report: &NewReport,
    ) -> Result<StudentReport, sqlx::Error>;

    async fn release_report_job(
        &self,
        job: &ReportJob,
        error: &str,
        max_attempts: i32,
        now: PrimitiveDateTime,
    ) -> Result<ReportJobStatus, sqlx::Error>;

    async fn list_reports(
        &self,
        student_id: &str,
        limit: i64,
    ) -> Result<Vec<StudentReport>, sqlx::Error>;

    async fn list_results(
        &self,
        filter: &ResultFilter,
    ) -> Result<Vec<HomeworkResultRow>, sqlx::Error>;

    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// Distinct, trimmed, non-empty weakness types in first-seen order.
pub(crate) fn distinct_weakness_types(weakness_types: &[String]) -> Vec<&str> {
    let mut distinct: Vec<&str> = Vec::with_capacity(weakness_types.len());
    for weakness in weakness_types.iter().map(|value| value.trim()) {
        if !weakness.is_empty() && !distinct.contains(&weakness) {
            distinct.push(weakness);
        }
    }
    distinct
}

#[derive(Clone)]
pub(crate) struct PgHomeworkStore {
    pool: PgPool,
}

impl PgHomeworkStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// True when every optional grading column exists.
    pub(crate) async fn grading_schema_ready(&self) -> Result<bool, sqlx::Error> {
        let columns: Vec<&str> = GRADING_OPTIONAL_COLUMNS.iter().map(|(name, _)| *name).collect();
        let present = repositories::health::grading_column_count(&self.pool, &columns).await?;
        Ok(present == columns.len() as i64)
    }
}

#[async_trait]
impl HomeworkStore for PgHomeworkStore {
    async fn find_student(&self, student_id: &str) -> Result<Option<Student>, sqlx::Error> {
        repositories::users::find_by_id(&self.pool, student_id).await
    }

    async fn record_graded_submission(
        &self,
        submission: &NewSubmission,
        grading: &NewGrading,
        schedule: ReportSchedule,
    ) -> Result<RecordedGrading, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        repositories::homework_submissions::create(
            &mut *tx,
            CreateSubmission {
                id: &submission.id,
                student_id: &submission.student_id,
                code: submission.code.as_deref(),
                image_refs: &submission.image_refs,
                files_hash: &submission.files_hash,
                submitted_at: submission.submitted_at,
                status: HomeworkStatus::Submitted,
                academy_id: submission.academy_id,
            },
        )
        .await?;

        repositories::homework_gradings::create(
            &mut *tx,
            CreateGrading {
                id: &grading.id,
                submission_id: &submission.id,
                score: grading.score,
                feedback: &grading.feedback,
                strengths: &grading.strengths,
                suggestions: &grading.suggestions,
                subject: &grading.subject,
                completion: &grading.completion,
                effort: &grading.effort,
                page_count: grading.page_count,
                graded_at: grading.graded_at,
                graded_by: &grading.graded_by,
                total_questions: grading.total_questions,
                correct_answers: grading.correct_answers,
                problem_analysis: &grading.problem_analysis,
                weakness_types: &grading.weakness_types,
                detailed_analysis: &grading.detailed_analysis,
                study_direction: &grading.study_direction,
                grade: grading.grade,
                outcome: grading.outcome,
            },
        )
        .await?;
        repositories::homework_submissions::mark_graded(&mut *tx, &submission.id).await?;

        for weakness in distinct_weakness_types(&grading.weakness_types) {
            let count = repositories::weaknesses::increment(
                &mut *tx,
                &submission.student_id,
                weakness,
                grading.graded_at,
            )
            .await?;
            tracing::debug!(student_id = %submission.student_id, weakness, count, "Weakness counted");
        }

        let submission_number = repositories::submission_counters::increment(
            &mut *tx,
            &submission.student_id,
            grading.graded_at,
        )
        .await?;

        let report_job = if schedule.is_due(submission_number) {
            let job = repositories::report_jobs::create(
                &mut *tx,
                CreateReportJob {
                    id: &prefixed_id("report-job"),
                    student_id: &submission.student_id,
                    academy_id: submission.academy_id,
                    submission_number,
                    claimed: schedule.claim_for_caller,
                    now: grading.graded_at,
                },
            )
            .await?;
            Some(job)
        } else {
            None
        };

        tx.commit().await?;
        Ok(RecordedGrading { submission_number, report_job })
    }

    async fn top_weaknesses(
        &self,
        student_id: &str,
        limit: i64,
    ) -> Result<Vec<StudentWeakness>, sqlx::Error> {
        repositories::weaknesses::top_for_student(&self.pool, student_id, limit).await
    }

    async fn recent_gradings(
        &self,
        student_id: &str,
        limit: i64,
    ) -> Result<Vec<RecentGrading>, sqlx::Error> {
        repositories::homework_gradings::recent_for_student(&self.pool, student_id, limit).await
    }

    async fn claim_report_job(
        &self,
        now: PrimitiveDateTime,
        stale_before: PrimitiveDateTime,
    ) -> Result<Option<ReportJob>, sqlx::Error> {
        repositories::report_jobs::claim_next(&self.pool, now, stale_before).await
    }

    async fn complete_report_job(
        &self,
        job: &ReportJob,
        report: &NewReport,
    ) -> Result<StudentReport, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let stored = repositories::reports::create(
            &mut *tx,
            CreateReport {
                id: &report.id,
                student_id: &report.student_id,
                academy_id: report.academy_id,
                report_type: REPORT_TYPE,
                summary: &report.summary,
                weaknesses: &report.weaknesses,
                suggestions: &report.suggestions,
                average_score: report.average_score,
                submission_number: report.submission_number,
                ai_generated: report.ai_generated,
                created_at: report.created_at,
            },
        )
        .await?;
        repositories::report_jobs::mark_done(&mut *tx, &job.id, &stored.id, report.created_at)
            .await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn release_report_job(
        &self,
        job: &ReportJob,
        error: &str,
        max_attempts: i32,
        now: PrimitiveDateTime,
    ) -> Result<ReportJobStatus, sqlx::Error> {
        repositories::report_jobs::release(&self.pool, &job.id, error, max_attempts, now).await
    }

    async fn list_reports(
        &self,
        student_id: &str,
        limit: i64,
    ) -> Result<Vec<StudentReport>, sqlx::Error> {
        repositories::reports::list_for_student(&self.pool, student_id, limit).await
    }

    async fn list_results(
        &self,
        filter: &ResultFilter,
    ) -> Result<Vec<HomeworkResultRow>, sqlx::Error> {
        let window = ResultWindow {
            from: filter.from,
            until: filter.until,
            academy_id: filter.academy_id,
        };
        repositories::homework_submissions::list_results(&self.pool, &window).await
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        repositories::health::ping(&self.pool).await
    }
}
